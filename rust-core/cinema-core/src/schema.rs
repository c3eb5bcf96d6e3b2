//! # Entity Schemas
//!
//! Declarative field rules for catalog records. A [`Schema`] checks the shape of
//! a request body and produces cleaned field values; it never touches a store.
//! Reference existence is checked afterwards by the resource layer.

use crate::validation::{FieldError, ValidationErrors, ValidationResult, NON_FIELD_ERRORS};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Cleaned, field-name keyed values ready to be stored
pub type Fields = Map<String, Value>;

/// Largest value accepted by positive integer fields
pub const MAX_POSITIVE_INT: i64 = 2_147_483_647;

/// Kind of value a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-blank string, whitespace trimmed
    Text {
        /// Maximum length in characters, `None` for unbounded
        max_length: Option<usize>,
    },
    /// Integer within `1..=MAX_POSITIVE_INT`
    PositiveInt,
    /// Set of ids of records in another table
    References {
        /// Table holding the referenced records
        table: &'static str,
    },
}

/// A single field of an entity schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name as it appears in request/response bodies
    pub name: &'static str,
    /// Value kind
    pub kind: FieldKind,
    /// Must be present on create and full replace
    pub required: bool,
    /// Accepts JSON `null`
    pub nullable: bool,
}

impl Field {
    /// Required text field with a length cap
    #[must_use]
    pub const fn text(name: &'static str, max_length: usize) -> Self {
        Self {
            name,
            kind: FieldKind::Text {
                max_length: Some(max_length),
            },
            required: true,
            nullable: false,
        }
    }

    /// Optional, nullable text field of unbounded length
    #[must_use]
    pub const fn optional_text(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text { max_length: None },
            required: false,
            nullable: true,
        }
    }

    /// Required positive integer field
    #[must_use]
    pub const fn positive_int(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::PositiveInt,
            required: true,
            nullable: false,
        }
    }

    /// Required set of references into `table`
    #[must_use]
    pub const fn references(name: &'static str, table: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::References { table },
            required: true,
            nullable: false,
        }
    }

    /// Whether this field is stored in a join table rather than a column
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self.kind, FieldKind::References { .. })
    }

    /// Check one supplied value against this field's rules and normalize it
    ///
    /// # Errors
    ///
    /// Returns the first violation found for the value.
    pub fn clean(&self, value: &Value) -> Result<Value, FieldError> {
        if value.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(FieldError::null(self.name))
            };
        }

        match self.kind {
            FieldKind::Text { max_length } => {
                let Some(raw) = value.as_str() else {
                    return Err(FieldError::invalid_type(self.name, "a string"));
                };
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(FieldError::blank(self.name));
                }
                if let Some(max) = max_length {
                    if trimmed.chars().count() > max {
                        return Err(FieldError::too_long(self.name, max));
                    }
                }
                Ok(Value::String(trimmed.to_string()))
            }
            FieldKind::PositiveInt => {
                let Some(number) = value.as_i64() else {
                    return Err(FieldError::invalid_type(self.name, "an integer"));
                };
                if number < 1 {
                    return Err(FieldError::too_small(self.name, 1));
                }
                if number > MAX_POSITIVE_INT {
                    return Err(FieldError::too_large(self.name, MAX_POSITIVE_INT));
                }
                Ok(Value::from(number))
            }
            FieldKind::References { .. } => {
                let Some(items) = value.as_array() else {
                    return Err(FieldError::invalid_type(self.name, "a list of ids"));
                };
                let mut ids = BTreeSet::new();
                for item in items {
                    match item.as_i64() {
                        Some(id) => {
                            ids.insert(id);
                        }
                        None => {
                            return Err(FieldError::invalid_type(self.name, "a list of integer ids"));
                        }
                    }
                }
                Ok(Value::from(ids.into_iter().collect::<Vec<_>>()))
            }
        }
    }
}

/// How much of a body must be present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Create or full replace: every required field must be supplied
    Full,
    /// Merge: only supplied fields are validated
    Partial,
}

/// Field rules for one entity type
#[derive(Debug)]
pub struct Schema {
    /// Resource name, also the URL segment (e.g. "cinema_halls")
    pub resource: &'static str,
    /// Table the records live in
    pub table: &'static str,
    /// Field rules, in response order (after `id`)
    pub fields: &'static [Field],
}

impl Schema {
    /// Look up a field rule by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields stored as plain columns
    pub fn columns(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.is_reference())
    }

    /// Fields stored in join tables
    pub fn references(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_reference())
    }

    /// Validate a request body and return the cleaned values of supplied fields
    ///
    /// Unknown keys (including `id`) are ignored. In [`Mode::Full`], missing
    /// required fields are errors; missing optional fields are simply absent
    /// from the result.
    ///
    /// # Errors
    ///
    /// Returns every field violation found in the body.
    pub fn validate(&self, body: &Value, mode: Mode) -> ValidationResult<Fields> {
        let mut errors = ValidationErrors::new();

        let Some(object) = body.as_object() else {
            errors.add(FieldError::invalid_type(NON_FIELD_ERRORS, "an object"));
            return Err(errors);
        };

        let mut cleaned = Fields::new();
        for field in self.fields {
            match object.get(field.name) {
                Some(value) => match field.clean(value) {
                    Ok(value) => {
                        cleaned.insert(field.name.to_string(), value);
                    }
                    Err(error) => errors.add(error),
                },
                None if field.required && mode == Mode::Full => errors.add_required(field.name),
                None => {}
            }
        }

        errors.into_result(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationCode;
    use serde_json::json;

    static HALL: Schema = Schema {
        resource: "cinema_halls",
        table: "cinema_halls",
        fields: &[Field::text("name", 10), Field::positive_int("rows")],
    };

    static FILM: Schema = Schema {
        resource: "movies",
        table: "movies",
        fields: &[
            Field::text("title", 255),
            Field::optional_text("description"),
            Field::references("actors", "actors"),
        ],
    };

    fn codes(errors: &ValidationErrors, field: &str) -> Vec<ValidationCode> {
        errors
            .errors
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.code)
            .collect()
    }

    #[test]
    fn test_full_mode_requires_fields() {
        let errors = HALL.validate(&json!({}), Mode::Full).unwrap_err();
        assert_eq!(codes(&errors, "name"), vec![ValidationCode::Required]);
        assert_eq!(codes(&errors, "rows"), vec![ValidationCode::Required]);
    }

    #[test]
    fn test_partial_mode_only_checks_supplied() {
        let cleaned = HALL.validate(&json!({"rows": 12}), Mode::Partial).unwrap();
        assert_eq!(cleaned.get("rows"), Some(&json!(12)));
        assert!(!cleaned.contains_key("name"));
    }

    #[test]
    fn test_text_is_trimmed_and_bounded() {
        let cleaned = HALL
            .validate(&json!({"name": "  Blue  ", "rows": 3}), Mode::Full)
            .unwrap();
        assert_eq!(cleaned.get("name"), Some(&json!("Blue")));

        let errors = HALL
            .validate(&json!({"name": "x".repeat(11), "rows": 3}), Mode::Full)
            .unwrap_err();
        assert_eq!(codes(&errors, "name"), vec![ValidationCode::TooLong]);

        let errors = HALL
            .validate(&json!({"name": "   ", "rows": 3}), Mode::Full)
            .unwrap_err();
        assert_eq!(codes(&errors, "name"), vec![ValidationCode::Blank]);
    }

    #[test]
    fn test_wrong_types_and_null() {
        let errors = HALL
            .validate(&json!({"name": 5, "rows": "ten"}), Mode::Full)
            .unwrap_err();
        assert_eq!(codes(&errors, "name"), vec![ValidationCode::InvalidType]);
        assert_eq!(codes(&errors, "rows"), vec![ValidationCode::InvalidType]);

        let errors = HALL
            .validate(&json!({"name": null, "rows": 2.5}), Mode::Full)
            .unwrap_err();
        assert_eq!(codes(&errors, "name"), vec![ValidationCode::Null]);
        assert_eq!(codes(&errors, "rows"), vec![ValidationCode::InvalidType]);
    }

    #[test]
    fn test_positive_int_bounds() {
        let errors = HALL
            .validate(&json!({"name": "A", "rows": 0}), Mode::Full)
            .unwrap_err();
        assert_eq!(codes(&errors, "rows"), vec![ValidationCode::TooSmall]);

        let errors = HALL
            .validate(&json!({"name": "A", "rows": MAX_POSITIVE_INT + 1}), Mode::Full)
            .unwrap_err();
        assert_eq!(codes(&errors, "rows"), vec![ValidationCode::TooLarge]);
    }

    #[test]
    fn test_optional_field_accepts_null_and_absence() {
        let cleaned = FILM
            .validate(&json!({"title": "X", "actors": []}), Mode::Full)
            .unwrap();
        assert!(!cleaned.contains_key("description"));

        let cleaned = FILM
            .validate(
                &json!({"title": "X", "description": null, "actors": []}),
                Mode::Full,
            )
            .unwrap();
        assert_eq!(cleaned.get("description"), Some(&Value::Null));
    }

    #[test]
    fn test_references_are_deduplicated_and_sorted() {
        let cleaned = FILM
            .validate(&json!({"title": "X", "actors": [3, 1, 3]}), Mode::Full)
            .unwrap();
        assert_eq!(cleaned.get("actors"), Some(&json!([1, 3])));
    }

    #[test]
    fn test_references_reject_embedded_objects() {
        let errors = FILM
            .validate(
                &json!({"title": "X", "actors": [{"id": 1, "first_name": "A"}]}),
                Mode::Full,
            )
            .unwrap_err();
        assert_eq!(codes(&errors, "actors"), vec![ValidationCode::InvalidType]);

        let errors = FILM
            .validate(&json!({"title": "X", "actors": 1}), Mode::Full)
            .unwrap_err();
        assert_eq!(codes(&errors, "actors"), vec![ValidationCode::InvalidType]);
    }

    #[test]
    fn test_non_object_body() {
        let errors = HALL.validate(&json!([1, 2]), Mode::Full).unwrap_err();
        assert_eq!(codes(&errors, NON_FIELD_ERRORS), vec![ValidationCode::InvalidType]);
    }

    #[test]
    fn test_unknown_keys_and_id_ignored() {
        let cleaned = HALL
            .validate(&json!({"id": 99, "name": "A", "rows": 1, "color": "red"}), Mode::Full)
            .unwrap();
        assert_eq!(cleaned.len(), 2);
    }

    #[test]
    fn test_column_and_reference_split() {
        let columns: Vec<_> = FILM.columns().map(|f| f.name).collect();
        let references: Vec<_> = FILM.references().map(|f| f.name).collect();
        assert_eq!(columns, vec!["title", "description"]);
        assert_eq!(references, vec!["actors"]);
        assert!(FILM.field("actors").is_some_and(Field::is_reference));
    }
}
