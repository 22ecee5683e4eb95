//! Credential catalog commands.
//!
//! Definitions are registered idempotently: adding one that already exists
//! reports the existing entry.
//!
//! # Usage
//!
//! ```bash
//! credentials-cli catalog add-program --program-id 10
//! credentials-cli catalog add-course --course-id course-v1:edX+DemoX+Demo --certificate-type verified
//! credentials-cli catalog list
//! ```

use thiserror::Error;

use credentials_api::db::{CredentialStore, PgCredentialStore, RepositoryError};
use credentials_core::{CertificateType, CredentialDefinition, CredentialReference};

use super::{CommandError, connect};

/// Errors that can occur in catalog commands.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Invalid certificate type.
    #[error(
        "Invalid certificate type: {0}. Valid types: honor, verified, professional, no-id-professional, audit"
    )]
    InvalidCertificateType(String),

    /// Invalid course id.
    #[error("Course id must not be blank")]
    BlankCourseId,
}

/// Register a program certificate.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the insert fails.
pub async fn add_program(program_id: i64) -> Result<(), CatalogError> {
    register(CredentialReference::Program { program_id }).await
}

/// Register a course certificate.
///
/// # Errors
///
/// Returns an error if the arguments are invalid, the database is unreachable,
/// or the insert fails.
pub async fn add_course(course_id: &str, certificate_type: &str) -> Result<(), CatalogError> {
    let course_id = course_id.trim();
    if course_id.is_empty() {
        return Err(CatalogError::BlankCourseId);
    }
    let certificate_type: CertificateType = certificate_type
        .parse()
        .map_err(|_| CatalogError::InvalidCertificateType(certificate_type.to_owned()))?;

    register(CredentialReference::Course {
        course_id: course_id.to_owned(),
        certificate_type,
    })
    .await
}

/// List every registered definition.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the query fails.
pub async fn list() -> Result<(), CatalogError> {
    let store = PgCredentialStore::new(connect().await?);
    let definitions = store.list_definitions().await?;

    #[allow(clippy::print_stdout)]
    {
        if definitions.is_empty() {
            println!("No credentials registered.");
        }
        for definition in &definitions {
            println!("{}", describe(definition));
        }
    }
    Ok(())
}

async fn register(reference: CredentialReference) -> Result<(), CatalogError> {
    let store = PgCredentialStore::new(connect().await?);
    let (definition, created) = store.get_or_create_definition(&reference).await?;

    if created {
        tracing::info!("Registered {}", describe(&definition));
    } else {
        tracing::info!("Already registered: {}", describe(&definition));
    }
    Ok(())
}

fn describe(definition: &CredentialDefinition) -> String {
    match definition {
        CredentialDefinition::Program(p) => {
            format!("#{} ProgramCertificate program_id={}", p.id, p.program_id)
        }
        CredentialDefinition::Course(c) => format!(
            "#{} CourseCertificate course_id={} certificate_type={}",
            c.id, c.course_id, c.certificate_type
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use credentials_core::{CourseCertificate, CredentialDefinitionId};

    use super::*;

    #[test]
    fn test_describe_course() {
        let definition = CredentialDefinition::Course(CourseCertificate {
            id: CredentialDefinitionId::new(4),
            course_id: "course-v1:edX+DemoX+Demo".to_owned(),
            certificate_type: CertificateType::Verified,
            created_at: Utc::now(),
        });
        assert_eq!(
            describe(&definition),
            "#4 CourseCertificate course_id=course-v1:edX+DemoX+Demo certificate_type=verified"
        );
    }
}
