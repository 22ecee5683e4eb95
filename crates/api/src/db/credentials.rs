//! `PostgreSQL` credential store.
//!
//! Queries are built at runtime so the crate compiles without a live
//! database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use credentials_core::{
    CertificateType, CourseCertificate, CredentialDefinition, CredentialDefinitionId,
    CredentialFilter, CredentialPatch, CredentialReference, CredentialStatus, ProgramCertificate,
    UserCredential, UserCredentialAttribute, UserCredentialAttributeId, UserCredentialId,
    Username,
};

use super::{CredentialStore, IssueOutcome, NewUserCredential, Page, PageRequest, RepositoryError};

// =============================================================================
// Internal Row Types
// =============================================================================

const DEFINITION_COLUMNS: &str =
    "id, kind, program_id, course_id, certificate_type, created_at";

const USER_CREDENTIAL_SELECT: &str = r"
    SELECT uc.id, uc.uuid, uc.username, uc.status, uc.download_url,
           uc.created_at, uc.modified_at,
           cd.id AS definition_id, cd.kind, cd.program_id, cd.course_id,
           cd.certificate_type, cd.created_at AS definition_created_at
    FROM credentials.user_credential uc
    JOIN credentials.credential_definition cd ON cd.id = uc.credential_definition_id
";

/// Internal row type for credential definition queries.
#[derive(Debug, sqlx::FromRow)]
struct DefinitionRow {
    id: i32,
    kind: String,
    program_id: Option<i64>,
    course_id: Option<String>,
    certificate_type: Option<CertificateType>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DefinitionRow> for CredentialDefinition {
    type Error = RepositoryError;

    fn try_from(row: DefinitionRow) -> Result<Self, Self::Error> {
        build_definition(
            row.id,
            &row.kind,
            row.program_id,
            row.course_id,
            row.certificate_type,
            row.created_at,
        )
    }
}

fn build_definition(
    id: i32,
    kind: &str,
    program_id: Option<i64>,
    course_id: Option<String>,
    certificate_type: Option<CertificateType>,
    created_at: DateTime<Utc>,
) -> Result<CredentialDefinition, RepositoryError> {
    let id = CredentialDefinitionId::new(id);
    match (kind, program_id, course_id, certificate_type) {
        ("program", Some(program_id), None, None) => {
            Ok(CredentialDefinition::Program(ProgramCertificate {
                id,
                program_id,
                created_at,
            }))
        }
        ("course", None, Some(course_id), Some(certificate_type)) => {
            Ok(CredentialDefinition::Course(CourseCertificate {
                id,
                course_id,
                certificate_type,
                created_at,
            }))
        }
        _ => Err(RepositoryError::DataCorruption(format!(
            "credential definition {id} has inconsistent columns for kind '{kind}'"
        ))),
    }
}

/// Internal row type for user credential queries, joined with the definition.
#[derive(Debug, sqlx::FromRow)]
struct UserCredentialRow {
    id: i32,
    uuid: Uuid,
    username: String,
    status: CredentialStatus,
    download_url: Option<String>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    definition_id: i32,
    kind: String,
    program_id: Option<i64>,
    course_id: Option<String>,
    certificate_type: Option<CertificateType>,
    definition_created_at: DateTime<Utc>,
}

impl UserCredentialRow {
    fn into_credential(
        self,
        attributes: Vec<UserCredentialAttribute>,
    ) -> Result<UserCredential, RepositoryError> {
        let username = Username::parse(&self.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;
        let credential = build_definition(
            self.definition_id,
            &self.kind,
            self.program_id,
            self.course_id,
            self.certificate_type,
            self.definition_created_at,
        )?;

        Ok(UserCredential {
            id: UserCredentialId::new(self.id),
            uuid: self.uuid,
            username,
            credential,
            status: self.status,
            download_url: self.download_url,
            attributes,
            created_at: self.created_at,
            modified_at: self.modified_at,
        })
    }
}

/// Internal row type for attribute queries.
#[derive(Debug, sqlx::FromRow)]
struct AttributeRow {
    id: i32,
    user_credential_id: i32,
    namespace: String,
    name: String,
    value: String,
}

impl From<AttributeRow> for UserCredentialAttribute {
    fn from(row: AttributeRow) -> Self {
        Self {
            id: UserCredentialAttributeId::new(row.id),
            namespace: row.namespace,
            name: row.name,
            value: row.value,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Credential store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Attach attributes to each row, preserving row order.
async fn hydrate(
    conn: &mut PgConnection,
    rows: Vec<UserCredentialRow>,
) -> Result<Vec<UserCredential>, RepositoryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
    let attribute_rows = sqlx::query_as::<_, AttributeRow>(
        r"
        SELECT id, user_credential_id, namespace, name, value
        FROM credentials.user_credential_attribute
        WHERE user_credential_id = ANY($1)
        ORDER BY id
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_credential: HashMap<i32, Vec<UserCredentialAttribute>> = HashMap::new();
    for row in attribute_rows {
        by_credential
            .entry(row.user_credential_id)
            .or_default()
            .push(row.into());
    }

    rows.into_iter()
        .map(|row| {
            let attributes = by_credential.remove(&row.id).unwrap_or_default();
            row.into_credential(attributes)
        })
        .collect()
}

async fn load_by_id(
    conn: &mut PgConnection,
    id: i32,
) -> Result<Option<UserCredential>, RepositoryError> {
    let query = format!("{USER_CREDENTIAL_SELECT} WHERE uc.id = $1");
    let row = sqlx::query_as::<_, UserCredentialRow>(&query)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(hydrate(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

async fn load_by_pair(
    conn: &mut PgConnection,
    username: &Username,
    definition: CredentialDefinitionId,
) -> Result<Option<UserCredential>, RepositoryError> {
    let query = format!(
        "{USER_CREDENTIAL_SELECT} WHERE uc.username = $1 AND uc.credential_definition_id = $2"
    );
    let row = sqlx::query_as::<_, UserCredentialRow>(&query)
        .bind(username.as_str())
        .bind(definition)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(hydrate(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_program_certificate(
        &self,
        program_id: i64,
    ) -> Result<Option<CredentialDefinition>, RepositoryError> {
        let query = format!(
            "SELECT {DEFINITION_COLUMNS} FROM credentials.credential_definition \
             WHERE kind = 'program' AND program_id = $1"
        );
        let row = sqlx::query_as::<_, DefinitionRow>(&query)
            .bind(program_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_course_certificate(
        &self,
        course_id: &str,
        certificate_type: CertificateType,
    ) -> Result<Option<CredentialDefinition>, RepositoryError> {
        let query = format!(
            "SELECT {DEFINITION_COLUMNS} FROM credentials.credential_definition \
             WHERE kind = 'course' AND course_id = $1 AND certificate_type = $2"
        );
        let row = sqlx::query_as::<_, DefinitionRow>(&query)
            .bind(course_id)
            .bind(certificate_type)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_or_create_definition(
        &self,
        reference: &CredentialReference,
    ) -> Result<(CredentialDefinition, bool), RepositoryError> {
        let insert = format!(
            "INSERT INTO credentials.credential_definition \
             (kind, program_id, course_id, certificate_type) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT DO NOTHING \
             RETURNING {DEFINITION_COLUMNS}"
        );
        let (kind, program_id, course_id, certificate_type) = match reference {
            CredentialReference::Program { program_id } => {
                ("program", Some(*program_id), None, None)
            }
            CredentialReference::Course {
                course_id,
                certificate_type,
            } => ("course", None, Some(course_id.as_str()), Some(*certificate_type)),
        };

        let inserted = sqlx::query_as::<_, DefinitionRow>(&insert)
            .bind(kind)
            .bind(program_id)
            .bind(course_id)
            .bind(certificate_type)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = inserted {
            return Ok((row.try_into()?, true));
        }

        let existing = match reference {
            CredentialReference::Program { program_id } => {
                self.find_program_certificate(*program_id).await?
            }
            CredentialReference::Course {
                course_id,
                certificate_type,
            } => {
                self.find_course_certificate(course_id, *certificate_type)
                    .await?
            }
        };

        existing.map(|definition| (definition, false)).ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "definition insert for {} conflicted but no row was found",
                reference.identifier()
            ))
        })
    }

    async fn list_definitions(&self) -> Result<Vec<CredentialDefinition>, RepositoryError> {
        let query = format!(
            "SELECT {DEFINITION_COLUMNS} FROM credentials.credential_definition ORDER BY id"
        );
        let rows = sqlx::query_as::<_, DefinitionRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_or_create_user_credential(
        &self,
        new: NewUserCredential,
    ) -> Result<IssueOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // A concurrent insert for the same pair blocks here until it commits,
        // after which the conflict resolves to DO NOTHING.
        let inserted: Option<i32> = sqlx::query_scalar(
            r"
            INSERT INTO credentials.user_credential
                (uuid, username, credential_definition_id, status, download_url)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (username, credential_definition_id) DO NOTHING
            RETURNING id
            ",
        )
        .bind(Uuid::new_v4())
        .bind(new.username.as_str())
        .bind(new.credential.id())
        .bind(CredentialStatus::Awarded)
        .bind(new.download_url.as_deref())
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = if let Some(id) = inserted {
            for attribute in new.attributes {
                sqlx::query(
                    r"
                    INSERT INTO credentials.user_credential_attribute
                        (user_credential_id, namespace, name, value)
                    VALUES ($1, $2, $3, $4)
                    ",
                )
                .bind(id)
                .bind(&attribute.namespace)
                .bind(&attribute.name)
                .bind(&attribute.value)
                .execute(&mut *tx)
                .await?;
            }

            let credential = load_by_id(&mut *tx, id).await?.ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "user credential {id} vanished inside its creating transaction"
                ))
            })?;
            IssueOutcome::Created(credential)
        } else {
            let credential = load_by_pair(&mut *tx, &new.username, new.credential.id())
                .await?
                .ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "user credential for {} conflicted but no row was found",
                        new.username
                    ))
                })?;
            IssueOutcome::Existing(credential)
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn get_user_credential(
        &self,
        id: UserCredentialId,
    ) -> Result<Option<UserCredential>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_by_id(&mut *conn, id.as_i32()).await
    }

    async fn list_user_credentials(
        &self,
        filter: &CredentialFilter,
        page: PageRequest,
    ) -> Result<Page<UserCredential>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM credentials.user_credential
            WHERE username = $1 AND ($2::credentials.credential_status IS NULL OR status = $2)
            ",
        )
        .bind(filter.username.as_str())
        .bind(filter.status)
        .fetch_one(&mut *conn)
        .await?;

        let query = format!(
            "{USER_CREDENTIAL_SELECT} \
             WHERE uc.username = $1 \
               AND ($2::credentials.credential_status IS NULL OR uc.status = $2) \
             ORDER BY uc.id \
             LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, UserCredentialRow>(&query)
            .bind(filter.username.as_str())
            .bind(filter.status)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&mut *conn)
            .await?;

        let items = hydrate(&mut *conn, rows).await?;
        Ok(Page { items, total })
    }

    async fn update_user_credential(
        &self,
        id: UserCredentialId,
        patch: &CredentialPatch,
    ) -> Result<Option<UserCredential>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        if !patch.is_empty() {
            let updated = sqlx::query(
                r"
                UPDATE credentials.user_credential
                SET status = COALESCE($2, status), modified_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(id)
            .bind(patch.status)
            .execute(&mut *conn)
            .await?;

            if updated.rows_affected() == 0 {
                return Ok(None);
            }
        }

        load_by_id(&mut *conn, id.as_i32()).await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
