//! Polymorphic credential references.
//!
//! A client names the credential it wants issued either by program or by
//! course run plus enrollment track. This module turns the submitted JSON
//! object into a [`CredentialReference`]; resolving the reference against the
//! catalog happens in the api crate's registry.

use serde::Serialize;
use serde_json::{Map, Value};

use super::status::{CertificateType, InvalidChoice};

/// Errors produced while reading a credential reference off the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    /// Neither identifier was supplied, or the one supplied was empty.
    #[error("Credential ID is missing.")]
    MissingCredentialId,
    /// Both `program_id` and `course_id` were supplied.
    #[error("Only one of program_id or course_id may be provided.")]
    Ambiguous,
    /// `program_id` was not an integer.
    #[error("A valid integer is required.")]
    InvalidProgramId,
    /// `course_id` was neither a string nor a number.
    #[error("Not a valid string.")]
    InvalidCourseId,
    /// `course_id` was supplied without a `certificate_type`.
    #[error("Certificate type is missing.")]
    MissingCertificateType,
    /// `certificate_type` was not a recognized track.
    #[error(transparent)]
    InvalidCertificateType(#[from] InvalidChoice),
}

/// A tagged identifier pointing at a credential definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum CredentialReference {
    /// Certificate for completing a program.
    Program {
        /// Program natural key.
        program_id: i64,
    },
    /// Certificate for passing a course run in a given track.
    Course {
        /// Course run key, e.g. `course-v1:edX+DemoX+Demo_Course`.
        course_id: String,
        /// Enrollment track.
        certificate_type: CertificateType,
    },
}

impl CredentialReference {
    /// Read a reference from the `credential` member of a request body.
    ///
    /// Exactly one of `program_id` / `course_id` must be present and
    /// non-empty. `program_id` may be a JSON integer or a numeric string.
    ///
    /// # Errors
    ///
    /// Returns a [`ReferenceError`] describing the first problem found.
    pub fn from_json(value: &Value) -> Result<Self, ReferenceError> {
        let Some(object) = value.as_object() else {
            return Err(ReferenceError::MissingCredentialId);
        };

        let program = present(object, "program_id");
        let course = present(object, "course_id");

        match (program, course) {
            (Some(_), Some(_)) => Err(ReferenceError::Ambiguous),
            (Some(program_id), None) => Ok(Self::Program {
                program_id: parse_program_id(program_id)?,
            }),
            (None, Some(course_id)) => {
                let course_id = match course_id {
                    Value::String(s) => s.trim().to_owned(),
                    Value::Number(n) => n.to_string(),
                    _ => return Err(ReferenceError::InvalidCourseId),
                };
                let certificate_type = match present(object, "certificate_type") {
                    None => return Err(ReferenceError::MissingCertificateType),
                    Some(Value::String(s)) => s.trim().parse::<CertificateType>()?,
                    Some(other) => return Err(InvalidChoice(other.to_string()).into()),
                };
                Ok(Self::Course {
                    course_id,
                    certificate_type,
                })
            }
            (None, None) => Err(ReferenceError::MissingCredentialId),
        }
    }

    /// The natural identifier used in log lines and error messages: the
    /// program id, or the course run key.
    #[must_use]
    pub fn identifier(&self) -> String {
        match self {
            Self::Program { program_id } => program_id.to_string(),
            Self::Course { course_id, .. } => course_id.clone(),
        }
    }

    /// Name of the definition kind this reference resolves to.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Program { .. } => "ProgramCertificate",
            Self::Course { .. } => "CourseCertificate",
        }
    }
}

/// A member counts as present when it is not null and not a blank string.
fn present<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    match object.get(key)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        value => Some(value),
    }
}

fn parse_program_id(value: &Value) -> Result<i64, ReferenceError> {
    match value {
        Value::Number(n) => n.as_i64().ok_or(ReferenceError::InvalidProgramId),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ReferenceError::InvalidProgramId),
        _ => Err(ReferenceError::InvalidProgramId),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_program_reference_from_integer_and_string() {
        let expected = CredentialReference::Program { program_id: 10 };
        assert_eq!(
            CredentialReference::from_json(&json!({"program_id": 10})).unwrap(),
            expected
        );
        assert_eq!(
            CredentialReference::from_json(&json!({"program_id": "10"})).unwrap(),
            expected
        );
    }

    #[test]
    fn test_missing_identifier() {
        for value in [
            json!(""),
            json!({}),
            json!({"program_id": ""}),
            json!({"course_id": ""}),
            json!({"program_id": null}),
            json!({"course_id": "   "}),
        ] {
            assert_eq!(
                CredentialReference::from_json(&value).unwrap_err(),
                ReferenceError::MissingCredentialId,
                "input: {value}"
            );
        }
    }

    #[test]
    fn test_both_identifiers_rejected() {
        let value = json!({"program_id": 1, "course_id": "course-v1:a+b+c"});
        assert_eq!(
            CredentialReference::from_json(&value).unwrap_err(),
            ReferenceError::Ambiguous
        );
    }

    #[test]
    fn test_non_integer_program_id() {
        for value in [json!({"program_id": "ten"}), json!({"program_id": 1.5})] {
            assert_eq!(
                CredentialReference::from_json(&value).unwrap_err(),
                ReferenceError::InvalidProgramId
            );
        }
    }

    #[test]
    fn test_course_id_must_be_text() {
        for course_id in [json!({"a": 1}), json!(["course-v1:a+b+c"]), json!(true)] {
            let value = json!({"course_id": course_id, "certificate_type": "verified"});
            assert_eq!(
                CredentialReference::from_json(&value).unwrap_err(),
                ReferenceError::InvalidCourseId,
                "input: {value}"
            );
        }
    }

    #[test]
    fn test_course_reference() {
        let value = json!({"course_id": "course-v1:edX+DemoX+Demo", "certificate_type": "verified"});
        assert_eq!(
            CredentialReference::from_json(&value).unwrap(),
            CredentialReference::Course {
                course_id: "course-v1:edX+DemoX+Demo".to_owned(),
                certificate_type: CertificateType::Verified,
            }
        );
    }

    #[test]
    fn test_course_reference_requires_known_type() {
        let missing = json!({"course_id": "course-v1:edX+DemoX+Demo"});
        assert_eq!(
            CredentialReference::from_json(&missing).unwrap_err(),
            ReferenceError::MissingCertificateType
        );

        let unknown = json!({"course_id": "course-v1:edX+DemoX+Demo", "certificate_type": "gold"});
        assert_eq!(
            CredentialReference::from_json(&unknown)
                .unwrap_err()
                .to_string(),
            "\"gold\" is not a valid choice."
        );
    }

    #[test]
    fn test_wire_shape() {
        let program = CredentialReference::Program { program_id: 3 };
        assert_eq!(serde_json::to_value(&program).unwrap(), json!({"program_id": 3}));

        let course = CredentialReference::Course {
            course_id: "course-v1:x+y+z".to_owned(),
            certificate_type: CertificateType::Honor,
        };
        assert_eq!(
            serde_json::to_value(&course).unwrap(),
            json!({"course_id": "course-v1:x+y+z", "certificate_type": "honor"})
        );
    }

    #[test]
    fn test_identifier_and_kind() {
        let program = CredentialReference::Program { program_id: 10 };
        assert_eq!(program.identifier(), "10");
        assert_eq!(program.kind_name(), "ProgramCertificate");
    }
}
