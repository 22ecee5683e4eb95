//! Wire representation of credentials.
//!
//! Request bodies are taken as raw JSON and decoded here so that every
//! problem is reported against the field it concerns, rather than as a
//! single deserialization failure.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use url::form_urlencoded;
use uuid::Uuid;

use credentials_core::validation::{ItemErrors, NOT_A_LIST, NOT_A_STRING, REQUIRED_FIELD};
use credentials_core::{
    AttributeInput, CredentialPatch, CredentialReference, CredentialStatus, FieldError,
    UserCredential, UserCredentialAttribute, ValidationErrors,
};

use crate::services::{CredentialPage, IssueRequest};

/// Path list links are built against.
pub const CREDENTIALS_PATH: &str = "/credentials";

const NULL_FIELD: &str = "This field may not be null.";
const NON_FIELD_ERRORS: &str = "non_field_errors";
const EXPECTED_OBJECT: &str = "Invalid data. Expected a dictionary.";

// =============================================================================
// Responses
// =============================================================================

/// Encoded attribute.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AttributeResponse {
    pub namespace: String,
    pub name: String,
    pub value: String,
}

impl From<UserCredentialAttribute> for AttributeResponse {
    fn from(attribute: UserCredentialAttribute) -> Self {
        Self {
            namespace: attribute.namespace,
            name: attribute.name,
            value: attribute.value,
        }
    }
}

/// Encoded user credential.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserCredentialResponse {
    pub id: i32,
    pub uuid: Uuid,
    pub username: String,
    pub credential: CredentialReference,
    pub status: CredentialStatus,
    pub download_url: Option<String>,
    pub attributes: Vec<AttributeResponse>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl From<UserCredential> for UserCredentialResponse {
    fn from(credential: UserCredential) -> Self {
        Self {
            id: credential.id.as_i32(),
            uuid: credential.uuid,
            username: credential.username.into_inner(),
            credential: credential.credential.reference(),
            status: credential.status,
            download_url: credential.download_url,
            attributes: credential
                .attributes
                .into_iter()
                .map(AttributeResponse::from)
                .collect(),
            created: credential.created_at,
            modified: credential.modified_at,
        }
    }
}

/// Paginated list envelope.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageResponse {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<UserCredentialResponse>,
}

impl From<CredentialPage> for PageResponse {
    fn from(page: CredentialPage) -> Self {
        let next = page.has_next().then(|| page_link(&page, page.page + 1));
        let previous = page
            .has_previous()
            .then(|| page_link(&page, page.page - 1));

        Self {
            count: page.count,
            next,
            previous,
            results: page
                .results
                .into_iter()
                .map(UserCredentialResponse::from)
                .collect(),
        }
    }
}

/// Relative link to `target` carrying the same filters as `page`. The first
/// page is linked without a `page` parameter.
fn page_link(page: &CredentialPage, target: u32) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("username", page.filter.username.as_str());
    if let Some(status) = page.filter.status {
        query.append_pair("status", status.as_str());
    }
    if page.page_size_requested {
        query.append_pair("page_size", &page.page_size.to_string());
    }
    if target > 1 {
        query.append_pair("page", &target.to_string());
    }
    format!("{CREDENTIALS_PATH}?{}", query.finish())
}

// =============================================================================
// Requests
// =============================================================================

/// Decode a `POST /credentials` body.
///
/// Only the shape is checked here: required members exist and have the right
/// JSON types. Members that fail are left out of the request and their
/// problems travel with it in [`IssueRequest::errors`], so issuance can report
/// them together with blank values, unknown credentials and duplicate
/// attributes in the members that did decode.
///
/// # Errors
///
/// Returns a `non_field_errors` map if the body is not a JSON object.
pub fn decode_issue_request(body: &Value) -> Result<IssueRequest, ValidationErrors> {
    let object = expect_object(body)?;
    let mut errors = ValidationErrors::new();

    let username = match object.get("username") {
        None => {
            errors.add_message("username", REQUIRED_FIELD);
            None
        }
        Some(value) => match char_field(value) {
            Ok(username) => Some(username),
            Err(message) => {
                errors.add_message("username", message);
                None
            }
        },
    };

    let credential = object.get("credential").cloned();
    if credential.is_none() {
        errors.add_message("credential", REQUIRED_FIELD);
    }

    let attributes = match object.get("attributes") {
        None => {
            errors.add_message("attributes", REQUIRED_FIELD);
            None
        }
        Some(Value::Array(items)) => match decode_attributes(items) {
            Ok(attributes) => Some(attributes),
            Err(items) => {
                errors.set("attributes", FieldError::Items(items));
                None
            }
        },
        Some(Value::Null) => {
            errors.add_message("attributes", NULL_FIELD);
            None
        }
        Some(_) => {
            errors.add_message("attributes", NOT_A_LIST);
            None
        }
    };

    let download_url = match object.get("download_url") {
        None | Some(Value::Null) => None,
        Some(value) => match char_field(value) {
            Ok(url) if url.trim().is_empty() => None,
            Ok(url) => Some(url),
            Err(message) => {
                errors.add_message("download_url", message);
                None
            }
        },
    };

    Ok(IssueRequest {
        username,
        credential,
        attributes,
        download_url,
        errors,
    })
}

/// Decode a `PATCH /credentials/{id}` body.
///
/// Only `status` takes effect; every other member, `download_url` included,
/// is accepted and ignored.
///
/// # Errors
///
/// Returns a field-keyed map if the body is not an object or `status` is not
/// a known status.
pub fn decode_patch(body: &Value) -> Result<CredentialPatch, ValidationErrors> {
    let object = expect_object(body)?;

    let status = match object.get("status") {
        None => None,
        Some(Value::Null) => return Err(ValidationErrors::single("status", NULL_FIELD)),
        Some(Value::String(raw)) => Some(
            raw.parse::<CredentialStatus>()
                .map_err(|e| ValidationErrors::single("status", e.to_string()))?,
        ),
        Some(other) => {
            return Err(ValidationErrors::single(
                "status",
                format!("\"{other}\" is not a valid choice."),
            ));
        }
    };

    Ok(CredentialPatch { status })
}

fn expect_object(body: &Value) -> Result<&Map<String, Value>, ValidationErrors> {
    body.as_object()
        .ok_or_else(|| ValidationErrors::single(NON_FIELD_ERRORS, EXPECTED_OBJECT))
}

/// Read a text field. Numbers are accepted and kept in their JSON spelling.
fn char_field(value: &Value) -> Result<String, &'static str> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Err(NULL_FIELD),
        _ => Err(NOT_A_STRING),
    }
}

/// Decode attribute elements, reporting problems per position.
fn decode_attributes(items: &[Value]) -> Result<Vec<AttributeInput>, Vec<ItemErrors>> {
    let mut decoded = Vec::with_capacity(items.len());
    let mut item_errors = Vec::with_capacity(items.len());
    let mut failed = false;

    for item in items {
        let mut errors = ItemErrors::new();

        let Some(object) = item.as_object() else {
            errors.insert(NON_FIELD_ERRORS.to_owned(), vec![EXPECTED_OBJECT.to_owned()]);
            item_errors.push(errors);
            failed = true;
            continue;
        };

        let mut field = |key: &str| match object.get(key) {
            None => {
                errors.insert(key.to_owned(), vec![REQUIRED_FIELD.to_owned()]);
                None
            }
            Some(value) => match char_field(value) {
                Ok(text) => Some(text),
                Err(message) => {
                    errors.insert(key.to_owned(), vec![message.to_owned()]);
                    None
                }
            },
        };
        let namespace = field("namespace");
        let name = field("name");
        let value = field("value");

        if let (Some(namespace), Some(name), Some(value)) = (namespace, name, value) {
            decoded.push(AttributeInput {
                namespace,
                name,
                value,
            });
        } else {
            failed = true;
        }
        item_errors.push(errors);
    }

    if failed { Err(item_errors) } else { Ok(decoded) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use credentials_core::{
        CertificateType, CourseCertificate, CredentialDefinition, CredentialDefinitionId,
        CredentialFilter, UserCredentialAttributeId, UserCredentialId, Username,
    };

    use super::*;

    fn credential() -> UserCredential {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        UserCredential {
            id: UserCredentialId::new(3),
            uuid: Uuid::nil(),
            username: Username::parse("alice").unwrap(),
            credential: CredentialDefinition::Course(CourseCertificate {
                id: CredentialDefinitionId::new(1),
                course_id: "course-v1:edX+DemoX+Demo".to_owned(),
                certificate_type: CertificateType::NoIdProfessional,
                created_at: at,
            }),
            status: CredentialStatus::Awarded,
            download_url: None,
            attributes: vec![UserCredentialAttribute {
                id: UserCredentialAttributeId::new(1),
                namespace: "grade".to_owned(),
                name: "final".to_owned(),
                value: "0.8".to_owned(),
            }],
            created_at: at,
            modified_at: at,
        }
    }

    #[test]
    fn test_encodes_course_credential() {
        let encoded = serde_json::to_value(UserCredentialResponse::from(credential())).unwrap();

        assert_eq!(
            encoded,
            json!({
                "id": 3,
                "uuid": "00000000-0000-0000-0000-000000000000",
                "username": "alice",
                "credential": {
                    "course_id": "course-v1:edX+DemoX+Demo",
                    "certificate_type": "no-id-professional"
                },
                "status": "awarded",
                "download_url": null,
                "attributes": [{"namespace": "grade", "name": "final", "value": "0.8"}],
                "created": "2024-05-01T12:00:00Z",
                "modified": "2024-05-01T12:00:00Z"
            })
        );
    }

    #[test]
    fn test_decode_requires_all_members() {
        let request = decode_issue_request(&json!({})).unwrap();
        assert!(request.username.is_none());
        assert!(request.credential.is_none());
        assert!(request.attributes.is_none());

        let errors = request.errors;
        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(fields, vec!["attributes", "credential", "username"]);
        assert_eq!(
            errors.get("username"),
            Some(&FieldError::Messages(vec![REQUIRED_FIELD.to_owned()]))
        );
    }

    #[test]
    fn test_decode_reports_attribute_shape_by_position() {
        let body = json!({
            "username": "alice",
            "credential": {"program_id": 1},
            "attributes": [
                {"namespace": "grade", "name": "final", "value": "A"},
                {"namespace": "grade", "value": true}
            ]
        });

        let request = decode_issue_request(&body).unwrap();
        assert!(request.attributes.is_none());
        let Some(FieldError::Items(items)) = request.errors.get("attributes") else {
            panic!("expected positional errors");
        };
        assert_eq!(items.len(), 2);
        assert!(items[0].is_empty());
        assert_eq!(items[1]["name"], vec![REQUIRED_FIELD.to_owned()]);
        assert_eq!(items[1]["value"], vec![NOT_A_STRING.to_owned()]);
    }

    #[test]
    fn test_decode_keeps_blank_values_for_issuance() {
        let body = json!({
            "username": "",
            "credential": "",
            "attributes": [{"namespace": "", "name": "n", "value": 7}],
            "download_url": "https://certs.example.org/abc"
        });

        let request = decode_issue_request(&body).unwrap();
        assert!(request.errors.is_empty());
        assert_eq!(request.username.as_deref(), Some(""));
        assert_eq!(request.credential, Some(json!("")));
        assert_eq!(request.attributes.unwrap()[0].value, "7");
        assert_eq!(
            request.download_url.as_deref(),
            Some("https://certs.example.org/abc")
        );
    }

    #[test]
    fn test_decode_keeps_members_that_decoded() {
        let body = json!({"username": "", "credential": {"program_id": 10}});

        let request = decode_issue_request(&body).unwrap();
        assert_eq!(request.username.as_deref(), Some(""));
        assert_eq!(request.credential, Some(json!({"program_id": 10})));
        let fields: Vec<&str> = request.errors.fields().collect();
        assert_eq!(fields, vec!["attributes"]);
    }

    #[test]
    fn test_decode_rejects_non_object_body() {
        let errors = decode_issue_request(&json!([1, 2])).unwrap_err();
        assert!(errors.get(NON_FIELD_ERRORS).is_some());
    }

    #[test]
    fn test_patch_ignores_everything_but_status() {
        let patch = decode_patch(&json!({
            "status": "revoked",
            "download_url": "elsewhere",
            "username": "mallory"
        }))
        .unwrap();
        assert_eq!(patch.status, Some(CredentialStatus::Revoked));

        let empty = decode_patch(&json!({"download_url": "elsewhere"})).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_patch_rejects_unknown_status() {
        let errors = decode_patch(&json!({"status": "lost"})).unwrap_err();
        assert_eq!(
            errors.get("status"),
            Some(&FieldError::Messages(vec![
                "\"lost\" is not a valid choice.".to_owned()
            ]))
        );
    }

    #[test]
    fn test_page_links_preserve_filters() {
        let page = CredentialPage {
            results: Vec::new(),
            count: 45,
            page: 2,
            page_size: 20,
            page_size_requested: false,
            filter: CredentialFilter {
                username: Username::parse("alice smith").unwrap(),
                status: Some(CredentialStatus::Awarded),
            },
        };

        let response = PageResponse::from(page);
        assert_eq!(
            response.next.as_deref(),
            Some("/credentials?username=alice+smith&status=awarded&page=3")
        );
        assert_eq!(
            response.previous.as_deref(),
            Some("/credentials?username=alice+smith&status=awarded")
        );
    }
}
