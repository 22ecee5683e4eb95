//! Field-keyed validation errors and the attribute validator.
//!
//! Errors are reported the way API clients expect them: a JSON object keyed
//! by field name, each value a list of messages. List fields whose elements
//! are validated individually report one object per element instead, so a
//! client can tell which element failed by its position:
//!
//! ```json
//! {"attributes": [{}, {"namespace": ["This field may not be blank."]}]}
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Message for a string field that is empty or whitespace only.
pub const BLANK_FIELD: &str = "This field may not be blank.";
/// Message for a field absent from the request body.
pub const REQUIRED_FIELD: &str = "This field is required.";
/// Message for a field that must be a string.
pub const NOT_A_STRING: &str = "Not a valid string.";
/// Message for a list field given something else.
pub const NOT_A_LIST: &str = "Expected a list of items.";
/// Sequence-level message for repeated (namespace, name) pairs.
pub const DUPLICATE_ATTRIBUTES: &str = "Attributes cannot be duplicated.";

/// Maximum length of an attribute namespace or name.
pub const MAX_ATTRIBUTE_KEY_LENGTH: usize = 255;

/// Per-field messages of one list element. Empty for elements that passed.
pub type ItemErrors = BTreeMap<String, Vec<String>>;

/// Errors attached to a single request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldError {
    /// Messages about the field as a whole.
    Messages(Vec<String>),
    /// Positional errors, one entry per list element.
    Items(Vec<ItemErrors>),
}

/// A mapping from field name to its errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, FieldError>);

impl ValidationErrors {
    /// An empty error map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map holding a single message for `field`.
    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add_message(field, message);
        errors
    }

    /// Append a message to `field`.
    ///
    /// A field that already carries positional errors is left as is; the
    /// positional report is the more specific one.
    pub fn add_message(&mut self, field: &str, message: impl Into<String>) {
        match self
            .0
            .entry(field.to_owned())
            .or_insert_with(|| FieldError::Messages(Vec::new()))
        {
            FieldError::Messages(messages) => messages.push(message.into()),
            FieldError::Items(_) => {}
        }
    }

    /// Record errors for `field`, replacing anything already recorded.
    pub fn set(&mut self, field: &str, error: FieldError) {
        self.0.insert(field.to_owned(), error);
    }

    /// Errors recorded for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldError> {
        self.0.get(field)
    }

    /// Whether no errors were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names of the fields carrying errors, in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns the map itself when it holds at least one error.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid fields: ")?;
        let mut first = true;
        for field in self.fields() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{field}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// One requested attribute, as decoded from the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeInput {
    pub namespace: String,
    pub name: String,
    pub value: String,
}

impl AttributeInput {
    /// Convenience constructor.
    #[must_use]
    pub fn new(namespace: &str, name: &str, value: &str) -> Self {
        Self {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            value: value.to_owned(),
        }
    }
}

/// Attributes that passed validation, in request order.
///
/// Namespaces and names are trimmed and non-blank; no (namespace, name) pair
/// repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedAttributes(Vec<AttributeInput>);

impl ValidatedAttributes {
    /// The validated attributes in request order.
    #[must_use]
    pub fn as_slice(&self) -> &[AttributeInput] {
        &self.0
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for ValidatedAttributes {
    type Item = AttributeInput;
    type IntoIter = std::vec::IntoIter<AttributeInput>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Why an attribute list was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributeError {
    /// At least one element has a blank namespace or name.
    #[error("invalid attribute elements")]
    Elements(Vec<ItemErrors>),
    /// Some (namespace, name) pair occurs more than once.
    #[error("Attributes cannot be duplicated.")]
    Duplicated,
}

impl From<AttributeError> for FieldError {
    fn from(err: AttributeError) -> Self {
        match err {
            AttributeError::Elements(items) => Self::Items(items),
            AttributeError::Duplicated => Self::Messages(vec![DUPLICATE_ATTRIBUTES.to_owned()]),
        }
    }
}

/// Validate a requested attribute list.
///
/// Element checks run first: every namespace and name must be non-blank and
/// at most [`MAX_ATTRIBUTE_KEY_LENGTH`] characters (values may be anything,
/// including empty). Only when every element passes is the list checked for
/// repeated (namespace, name) pairs, using exact case-sensitive comparison.
///
/// # Errors
///
/// Returns [`AttributeError::Elements`] with one entry per input element when
/// any element is invalid, or [`AttributeError::Duplicated`].
pub fn validate_attributes(
    attributes: Vec<AttributeInput>,
) -> Result<ValidatedAttributes, AttributeError> {
    let mut items = Vec::with_capacity(attributes.len());
    let mut any_invalid = false;
    let mut cleaned = Vec::with_capacity(attributes.len());

    for attribute in attributes {
        let mut errors = ItemErrors::new();
        let namespace = attribute.namespace.trim();
        let name = attribute.name.trim();
        for (field, text) in [("namespace", namespace), ("name", name)] {
            if let Some(message) = attribute_key_error(text) {
                errors.insert(field.to_owned(), vec![message]);
            }
        }
        any_invalid |= !errors.is_empty();
        items.push(errors);
        cleaned.push(AttributeInput {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            value: attribute.value,
        });
    }

    if any_invalid {
        return Err(AttributeError::Elements(items));
    }

    let mut seen = HashSet::with_capacity(cleaned.len());
    for attribute in &cleaned {
        if !seen.insert((attribute.namespace.as_str(), attribute.name.as_str())) {
            return Err(AttributeError::Duplicated);
        }
    }

    Ok(ValidatedAttributes(cleaned))
}

/// Problem with a trimmed attribute namespace or name, if any.
fn attribute_key_error(text: &str) -> Option<String> {
    if text.is_empty() {
        Some(BLANK_FIELD.to_owned())
    } else if text.chars().count() > MAX_ATTRIBUTE_KEY_LENGTH {
        Some(format!(
            "Ensure this field has no more than {MAX_ATTRIBUTE_KEY_LENGTH} characters."
        ))
    } else {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_valid_attributes_keep_order() {
        let validated = validate_attributes(vec![
            AttributeInput::new("white", "grade", "0.5"),
            AttributeInput::new("white", "level", ""),
        ])
        .unwrap();
        assert_eq!(validated.len(), 2);
        assert_eq!(validated.as_slice()[0].name, "grade");
        assert_eq!(validated.as_slice()[1].value, "");
    }

    #[test]
    fn test_blank_namespace_reported_by_position() {
        let err = validate_attributes(vec![
            AttributeInput::new("white", "grade", "0.5"),
            AttributeInput::new("", "grade", "0.8"),
        ])
        .unwrap_err();

        let AttributeError::Elements(items) = err else {
            panic!("expected element errors");
        };
        assert!(items[0].is_empty());
        assert_eq!(items[1]["namespace"], vec![BLANK_FIELD.to_owned()]);
        assert!(!items[1].contains_key("name"));
    }

    #[test]
    fn test_whitespace_name_is_blank() {
        let err = validate_attributes(vec![AttributeInput::new("ns", "  ", "v")]).unwrap_err();
        assert!(matches!(err, AttributeError::Elements(ref items) if items[0].contains_key("name")));
    }

    #[test]
    fn test_overlong_name_reported_by_position() {
        let err = validate_attributes(vec![
            AttributeInput::new("grade", "final", "A"),
            AttributeInput::new("grade", &"n".repeat(MAX_ATTRIBUTE_KEY_LENGTH + 45), "A"),
        ])
        .unwrap_err();

        let AttributeError::Elements(items) = err else {
            panic!("expected element errors");
        };
        assert!(items[0].is_empty());
        assert_eq!(
            items[1]["name"],
            vec!["Ensure this field has no more than 255 characters.".to_owned()]
        );
    }

    #[test]
    fn test_name_at_length_limit_accepted() {
        let name = "n".repeat(MAX_ATTRIBUTE_KEY_LENGTH);
        let long_value = "v".repeat(1000);
        let attributes = vec![AttributeInput::new("grade", &name, &long_value)];
        assert!(validate_attributes(attributes).is_ok());
    }

    #[test]
    fn test_duplicates_rejected_at_sequence_level() {
        let err = validate_attributes(vec![
            AttributeInput::new("white", "grade", "0.5"),
            AttributeInput::new("white", "grade", "0.8"),
        ])
        .unwrap_err();
        assert_eq!(err, AttributeError::Duplicated);
        assert_eq!(err.to_string(), DUPLICATE_ATTRIBUTES);
    }

    #[test]
    fn test_duplicate_check_waits_for_element_checks() {
        let err = validate_attributes(vec![
            AttributeInput::new("white", "grade", "0.5"),
            AttributeInput::new("white", "grade", "0.8"),
            AttributeInput::new("white", "", "0.8"),
        ])
        .unwrap_err();
        assert!(matches!(err, AttributeError::Elements(_)));
    }

    #[test]
    fn test_pairs_compare_case_sensitively() {
        assert!(
            validate_attributes(vec![
                AttributeInput::new("white", "grade", "0.5"),
                AttributeInput::new("White", "grade", "0.5"),
                AttributeInput::new("white", "Grade", "0.5"),
            ])
            .is_ok()
        );
    }

    #[test]
    fn test_same_name_different_namespace_allowed() {
        assert!(
            validate_attributes(vec![
                AttributeInput::new("white", "grade", "0.5"),
                AttributeInput::new("black", "grade", "0.5"),
            ])
            .is_ok()
        );
    }

    #[test]
    fn test_errors_serialize_field_keyed() {
        let mut errors = ValidationErrors::single("username", BLANK_FIELD);
        errors.set("attributes", AttributeError::Duplicated.into());
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({
                "attributes": ["Attributes cannot be duplicated."],
                "username": ["This field may not be blank."],
            })
        );
        assert_eq!(errors.to_string(), "invalid fields: attributes, username");
    }

    #[test]
    fn test_positional_errors_serialize_as_list_of_objects() {
        let mut item = ItemErrors::new();
        item.insert("name".to_owned(), vec![BLANK_FIELD.to_owned()]);
        let mut errors = ValidationErrors::new();
        errors.set("attributes", FieldError::Items(vec![ItemErrors::new(), item]));
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({"attributes": [{}, {"name": ["This field may not be blank."]}]})
        );
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationErrors::new().into_result().is_ok());
        assert!(ValidationErrors::single("x", "y").into_result().is_err());
    }
}
