//! Credential definitions and issued user credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::id::{CredentialDefinitionId, UserCredentialAttributeId, UserCredentialId};
use super::reference::CredentialReference;
use super::status::{CertificateType, CredentialStatus};
use super::username::Username;

/// A certificate awarded for completing a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramCertificate {
    pub id: CredentialDefinitionId,
    pub program_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A certificate awarded for passing a course run in a given track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseCertificate {
    pub id: CredentialDefinitionId,
    pub course_id: String,
    pub certificate_type: CertificateType,
    pub created_at: DateTime<Utc>,
}

/// A credential that can be issued. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialDefinition {
    Program(ProgramCertificate),
    Course(CourseCertificate),
}

impl CredentialDefinition {
    /// Database id of the definition.
    #[must_use]
    pub const fn id(&self) -> CredentialDefinitionId {
        match self {
            Self::Program(p) => p.id,
            Self::Course(c) => c.id,
        }
    }

    /// The natural key this definition is looked up by.
    #[must_use]
    pub fn reference(&self) -> CredentialReference {
        match self {
            Self::Program(p) => CredentialReference::Program {
                program_id: p.program_id,
            },
            Self::Course(c) => CredentialReference::Course {
                course_id: c.course_id.clone(),
                certificate_type: c.certificate_type,
            },
        }
    }

    /// When the definition was registered.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Program(p) => p.created_at,
            Self::Course(c) => c.created_at,
        }
    }
}

/// One typed fact attached to an issued credential (e.g. a grade).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentialAttribute {
    pub id: UserCredentialAttributeId,
    pub namespace: String,
    pub name: String,
    pub value: String,
}

/// One issuance of a credential to a user.
///
/// At most one exists per (username, credential definition). Only `status`
/// and `download_url` change after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredential {
    pub id: UserCredentialId,
    pub uuid: Uuid,
    pub username: Username,
    pub credential: CredentialDefinition,
    pub status: CredentialStatus,
    pub download_url: Option<String>,
    /// Attributes in insertion order.
    pub attributes: Vec<UserCredentialAttribute>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Filters for listing credentials. The username is mandatory so a list
/// request can never enumerate every issued credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialFilter {
    pub username: Username,
    pub status: Option<CredentialStatus>,
}

/// The mutable subset of a [`UserCredential`] reachable through an update.
///
/// `download_url` is fixed at issuance; clients may send it on update but it
/// is not applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPatch {
    pub status: Option<CredentialStatus>,
}

impl CredentialPatch {
    /// Whether applying the patch would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none()
    }
}
