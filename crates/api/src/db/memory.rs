//! In-memory credential store.
//!
//! Useful for tests and local experiments where persistence isn't needed.
//! All state sits behind one mutex, so find-or-create is atomic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use credentials_core::{
    CertificateType, CourseCertificate, CredentialDefinition, CredentialDefinitionId,
    CredentialFilter, CredentialPatch, CredentialReference, CredentialStatus, ProgramCertificate,
    UserCredential, UserCredentialAttribute, UserCredentialAttributeId, UserCredentialId,
};

use super::{CredentialStore, IssueOutcome, NewUserCredential, Page, PageRequest, RepositoryError};

#[derive(Debug, Default)]
struct Tables {
    definitions: Vec<CredentialDefinition>,
    credentials: Vec<UserCredential>,
    next_definition_id: i32,
    next_credential_id: i32,
    next_attribute_id: i32,
}

impl Tables {
    fn find_definition(&self, reference: &CredentialReference) -> Option<&CredentialDefinition> {
        self.definitions.iter().find(|d| &d.reference() == reference)
    }
}

/// Credential store that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

fn lock_tables(mutex: &Mutex<Tables>) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
    mutex
        .lock()
        .map_err(|e| RepositoryError::Unavailable(format!("lock poisoned: {e}")))
}

fn next_id(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

impl InMemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail as if the backend were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of issued user credentials (for testing/inspection).
    pub fn credential_count(&self) -> usize {
        lock_tables(&self.tables)
            .map(|t| t.credentials.len())
            .unwrap_or(0)
    }

    /// Total number of stored attributes across all credentials.
    pub fn attribute_count(&self) -> usize {
        lock_tables(&self.tables)
            .map(|t| t.credentials.iter().map(|c| c.attributes.len()).sum())
            .unwrap_or(0)
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "in-memory store marked unavailable".to_owned(),
            ));
        }
        lock_tables(&self.tables)
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_program_certificate(
        &self,
        program_id: i64,
    ) -> Result<Option<CredentialDefinition>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .find_definition(&CredentialReference::Program { program_id })
            .cloned())
    }

    async fn find_course_certificate(
        &self,
        course_id: &str,
        certificate_type: CertificateType,
    ) -> Result<Option<CredentialDefinition>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .find_definition(&CredentialReference::Course {
                course_id: course_id.to_owned(),
                certificate_type,
            })
            .cloned())
    }

    async fn get_or_create_definition(
        &self,
        reference: &CredentialReference,
    ) -> Result<(CredentialDefinition, bool), RepositoryError> {
        let mut tables = self.tables()?;
        if let Some(existing) = tables.find_definition(reference) {
            return Ok((existing.clone(), false));
        }

        let id = CredentialDefinitionId::new(next_id(&mut tables.next_definition_id));
        let created_at = Utc::now();
        let definition = match reference {
            CredentialReference::Program { program_id } => {
                CredentialDefinition::Program(ProgramCertificate {
                    id,
                    program_id: *program_id,
                    created_at,
                })
            }
            CredentialReference::Course {
                course_id,
                certificate_type,
            } => CredentialDefinition::Course(CourseCertificate {
                id,
                course_id: course_id.clone(),
                certificate_type: *certificate_type,
                created_at,
            }),
        };
        tables.definitions.push(definition.clone());
        Ok((definition, true))
    }

    async fn list_definitions(&self) -> Result<Vec<CredentialDefinition>, RepositoryError> {
        Ok(self.tables()?.definitions.clone())
    }

    async fn get_or_create_user_credential(
        &self,
        new: NewUserCredential,
    ) -> Result<IssueOutcome, RepositoryError> {
        let mut tables = self.tables()?;
        let definition_id = new.credential.id();

        if let Some(existing) = tables
            .credentials
            .iter()
            .find(|c| c.username == new.username && c.credential.id() == definition_id)
        {
            return Ok(IssueOutcome::Existing(existing.clone()));
        }

        let id = UserCredentialId::new(next_id(&mut tables.next_credential_id));
        let attributes = new
            .attributes
            .into_iter()
            .map(|a| UserCredentialAttribute {
                id: UserCredentialAttributeId::new(next_id(&mut tables.next_attribute_id)),
                namespace: a.namespace,
                name: a.name,
                value: a.value,
            })
            .collect();
        let now = Utc::now();
        let credential = UserCredential {
            id,
            uuid: Uuid::new_v4(),
            username: new.username,
            credential: new.credential,
            status: CredentialStatus::Awarded,
            download_url: new.download_url,
            attributes,
            created_at: now,
            modified_at: now,
        };
        tables.credentials.push(credential.clone());
        Ok(IssueOutcome::Created(credential))
    }

    async fn get_user_credential(
        &self,
        id: UserCredentialId,
    ) -> Result<Option<UserCredential>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.credentials.iter().find(|c| c.id == id).cloned())
    }

    async fn list_user_credentials(
        &self,
        filter: &CredentialFilter,
        page: PageRequest,
    ) -> Result<Page<UserCredential>, RepositoryError> {
        let tables = self.tables()?;
        let matching: Vec<&UserCredential> = tables
            .credentials
            .iter()
            .filter(|c| c.username == filter.username)
            .filter(|c| filter.status.is_none_or(|s| c.status == s))
            .collect();

        let total = i64::try_from(matching.len())
            .map_err(|e| RepositoryError::DataCorruption(format!("result set too large: {e}")))?;
        let offset = usize::try_from(page.offset).unwrap_or(0);
        let limit = usize::try_from(page.limit).unwrap_or(0);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        Ok(Page { items, total })
    }

    async fn update_user_credential(
        &self,
        id: UserCredentialId,
        patch: &CredentialPatch,
    ) -> Result<Option<UserCredential>, RepositoryError> {
        let mut tables = self.tables()?;
        let Some(credential) = tables.credentials.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };

        if let Some(status) = patch.status {
            credential.status = status;
            credential.modified_at = Utc::now();
        }
        Ok(Some(credential.clone()))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.tables().map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use credentials_core::{AttributeInput, Username, validate_attributes};

    use super::*;

    async fn program(store: &InMemoryCredentialStore, program_id: i64) -> CredentialDefinition {
        store
            .get_or_create_definition(&CredentialReference::Program { program_id })
            .await
            .unwrap()
            .0
    }

    fn new_credential(username: &str, credential: CredentialDefinition) -> NewUserCredential {
        NewUserCredential {
            username: Username::parse(username).unwrap(),
            credential,
            download_url: None,
            attributes: validate_attributes(vec![AttributeInput::new(
                "grade", "final", "0.9",
            )])
            .unwrap(),
        }
    }

    #[tokio::test]
    async fn test_definition_registration_is_idempotent() {
        let store = InMemoryCredentialStore::new();
        let reference = CredentialReference::Course {
            course_id: "course-v1:edX+DemoX+Demo".to_owned(),
            certificate_type: CertificateType::Verified,
        };

        let (first, created) = store.get_or_create_definition(&reference).await.unwrap();
        assert!(created);
        let (second, created) = store.get_or_create_definition(&reference).await.unwrap();
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(store.list_definitions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_or_create_keeps_first_record() {
        let store = InMemoryCredentialStore::new();
        let definition = program(&store, 7).await;

        let first = store
            .get_or_create_user_credential(new_credential("alice", definition.clone()))
            .await
            .unwrap();
        assert!(first.was_created());

        let second = store
            .get_or_create_user_credential(new_credential("alice", definition))
            .await
            .unwrap();
        assert!(!second.was_created());
        assert_eq!(first.into_credential(), second.into_credential());
        assert_eq!(store.credential_count(), 1);
        assert_eq!(store.attribute_count(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let store = InMemoryCredentialStore::new();
        for program_id in 1..=3 {
            let definition = program(&store, program_id).await;
            store
                .get_or_create_user_credential(new_credential("alice", definition))
                .await
                .unwrap();
        }
        let other = program(&store, 4).await;
        store
            .get_or_create_user_credential(new_credential("bob", other))
            .await
            .unwrap();

        let filter = CredentialFilter {
            username: Username::parse("alice").unwrap(),
            status: None,
        };
        let page = store
            .list_user_credentials(&filter, PageRequest { offset: 1, limit: 1 })
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, UserCredentialId::new(2));
    }

    #[tokio::test]
    async fn test_update_unknown_id_returns_none() {
        let store = InMemoryCredentialStore::new();
        let patch = CredentialPatch {
            status: Some(CredentialStatus::Revoked),
        };
        let updated = store
            .update_user_credential(UserCredentialId::new(99), &patch)
            .await
            .unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = InMemoryCredentialStore::new();
        store.set_unavailable(true);

        assert!(matches!(
            store.ping().await,
            Err(RepositoryError::Unavailable(_))
        ));
        assert!(store.find_program_certificate(1).await.is_err());
    }
}
