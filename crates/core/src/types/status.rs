//! Status and choice enums for credentials and callers.

use serde::{Deserialize, Serialize};

/// Error returned when a string is not one of an enum's recognized values.
///
/// The message matches what API clients see for an invalid choice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{0}\" is not a valid choice.")]
pub struct InvalidChoice(pub String);

/// Lifecycle status of an issued credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "credentials.credential_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    /// The credential has been awarded to the user.
    #[default]
    Awarded,
    /// The credential was withdrawn after being awarded.
    Revoked,
}

impl CredentialStatus {
    /// Wire/database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Awarded => "awarded",
            Self::Revoked => "revoked",
        }
    }
}

impl std::fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CredentialStatus {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awarded" => Ok(Self::Awarded),
            "revoked" => Ok(Self::Revoked),
            _ => Err(InvalidChoice(s.to_owned())),
        }
    }
}

/// Enrollment track a course certificate was earned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "credentials.certificate_type", rename_all = "kebab-case")
)]
#[serde(rename_all = "kebab-case")]
pub enum CertificateType {
    Honor,
    Verified,
    Professional,
    NoIdProfessional,
    Audit,
}

impl CertificateType {
    /// Wire/database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Honor => "honor",
            Self::Verified => "verified",
            Self::Professional => "professional",
            Self::NoIdProfessional => "no-id-professional",
            Self::Audit => "audit",
        }
    }
}

impl std::fmt::Display for CertificateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CertificateType {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "honor" => Ok(Self::Honor),
            "verified" => Ok(Self::Verified),
            "professional" => Ok(Self::Professional),
            "no-id-professional" => Ok(Self::NoIdProfessional),
            "audit" => Ok(Self::Audit),
            _ => Err(InvalidChoice(s.to_owned())),
        }
    }
}

/// Something an API caller may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Read single credentials and list them.
    View,
    /// Issue credentials.
    Create,
    /// Change status of an issued credential.
    Update,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::View => write!(f, "can_view"),
            Self::Create => write!(f, "can_create"),
            Self::Update => write!(f, "can_update"),
        }
    }
}

/// Role attached to an API token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    /// View, issue, and update credentials.
    Admin,
    /// View and issue credentials (e.g. the grading pipeline).
    Issuer,
    /// Read-only access.
    Viewer,
}

impl CallerRole {
    /// Whether this role grants `capability`.
    #[must_use]
    pub const fn grants(self, capability: Capability) -> bool {
        match (self, capability) {
            (Self::Admin, _)
            | (Self::Issuer, Capability::View | Capability::Create)
            | (Self::Viewer, Capability::View) => true,
            (Self::Issuer, Capability::Update) | (Self::Viewer, _) => false,
        }
    }
}

impl std::fmt::Display for CallerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Issuer => write!(f, "issuer"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

impl std::str::FromStr for CallerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "issuer" => Ok(Self::Issuer),
            "viewer" => Ok(Self::Viewer),
            _ => Err(format!("invalid caller role: {s}")),
        }
    }
}

/// An authenticated API caller.
///
/// Built by the HTTP layer and handed to services explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Role the caller's token grants.
    pub role: CallerRole,
    /// Non-secret name for the token, used in logs.
    pub label: String,
}

impl Caller {
    /// Whether the caller's role grants `capability`.
    #[must_use]
    pub const fn can(&self, capability: Capability) -> bool {
        self.role.grants(capability)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [CredentialStatus::Awarded, CredentialStatus::Revoked] {
            assert_eq!(status.as_str().parse::<CredentialStatus>().unwrap(), status);
        }
        assert_eq!(CredentialStatus::default(), CredentialStatus::Awarded);
    }

    #[test]
    fn test_status_is_case_sensitive() {
        let err = "Revoked".parse::<CredentialStatus>().unwrap_err();
        assert_eq!(err.to_string(), "\"Revoked\" is not a valid choice.");
    }

    #[test]
    fn test_certificate_type_kebab_case() {
        let parsed: CertificateType = "no-id-professional".parse().unwrap();
        assert_eq!(parsed, CertificateType::NoIdProfessional);
        assert_eq!(
            serde_json::to_value(parsed).unwrap(),
            serde_json::json!("no-id-professional")
        );
    }

    #[test]
    fn test_role_capabilities() {
        assert!(CallerRole::Admin.grants(Capability::Update));
        assert!(CallerRole::Issuer.grants(Capability::Create));
        assert!(!CallerRole::Issuer.grants(Capability::Update));
        assert!(CallerRole::Viewer.grants(Capability::View));
        assert!(!CallerRole::Viewer.grants(Capability::Create));
    }

    #[test]
    fn test_caller_uses_role_grants() {
        let caller = Caller {
            role: CallerRole::Issuer,
            label: "issuer-1".to_owned(),
        };
        assert!(caller.can(Capability::Create));
        assert!(!caller.can(Capability::Update));
    }

    #[test]
    fn test_capability_display() {
        assert_eq!(Capability::View.to_string(), "can_view");
        assert_eq!(Capability::Create.to_string(), "can_create");
        assert_eq!(Capability::Update.to_string(), "can_update");
    }
}
