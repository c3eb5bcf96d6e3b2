//! # Validation Errors
//!
//! Field-level errors collected while checking a catalog write. Every
//! problem with a body is gathered before responding, and the whole set is
//! returned as `{"errors": [{"field", "message", "code"}, ...]}`.

use serde::Serialize;

/// Field name used for errors that concern the body as a whole
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Error code for categorizing validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// Required field is missing
    Required,
    /// Field is null but does not accept null
    Null,
    /// Value is invalid type
    InvalidType,
    /// String is empty after trimming
    Blank,
    /// Value is too long
    TooLong,
    /// Value is below minimum
    TooSmall,
    /// Value is above maximum
    TooLarge,
    /// Referenced record does not exist
    DoesNotExist,
}

/// A single validation error for a specific field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name (e.g., "name", "actors")
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: ValidationCode,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: ValidationCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }

    /// Create a "required field" error
    pub fn required(field: impl Into<String>) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} is required"),
            field: field_str,
            code: ValidationCode::Required,
        }
    }

    /// Create a "may not be null" error
    pub fn null(field: impl Into<String>) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} may not be null"),
            field: field_str,
            code: ValidationCode::Null,
        }
    }

    /// Create an "invalid type" error
    pub fn invalid_type(field: impl Into<String>, expected: &str) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} must be {expected}"),
            field: field_str,
            code: ValidationCode::InvalidType,
        }
    }

    /// Create a "may not be blank" error
    pub fn blank(field: impl Into<String>) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} may not be blank"),
            field: field_str,
            code: ValidationCode::Blank,
        }
    }

    /// Create a "too long" error
    pub fn too_long(field: impl Into<String>, max: usize) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} must be at most {max} characters"),
            field: field_str,
            code: ValidationCode::TooLong,
        }
    }

    /// Create a "below minimum" error
    pub fn too_small(field: impl Into<String>, min: i64) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} must be greater than or equal to {min}"),
            field: field_str,
            code: ValidationCode::TooSmall,
        }
    }

    /// Create an "above maximum" error
    pub fn too_large(field: impl Into<String>, max: i64) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} must be less than or equal to {max}"),
            field: field_str,
            code: ValidationCode::TooLarge,
        }
    }

    /// Create an "unresolved reference" error
    pub fn does_not_exist(field: impl Into<String>, id: i64) -> Self {
        Self {
            field: field.into(),
            message: format!("Invalid pk \"{id}\" - object does not exist"),
            code: ValidationCode::DoesNotExist,
        }
    }
}

/// Collection of validation errors
///
/// Allows aggregating multiple field errors for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    /// List of field-level errors
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty error collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field error
    pub fn add(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Add a required field error
    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add(FieldError::required(field));
    }

    /// Append every error from another collection
    pub fn extend(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }

    /// Check if there are any errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether any error was reported for `field`
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Convert to JSON response body
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"errors":[]}"#.to_string())
    }

    /// `Ok(value)` when empty, otherwise `Err(self)`
    ///
    /// # Errors
    ///
    /// Returns the collection itself when it holds at least one error.
    pub fn into_result<T>(self, value: T) -> ValidationResult<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = std::result::Result<T, ValidationErrors>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_required() {
        let error = FieldError::required("name");
        assert_eq!(error.field, "name");
        assert_eq!(error.code, ValidationCode::Required);
        assert!(error.message.contains("required"));
    }

    #[test]
    fn test_validation_errors_add() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        errors.add_required("title");
        errors.add(FieldError::too_long("title", 255));

        assert_eq!(errors.len(), 2);
        assert!(errors.has_field("title"));
        assert!(!errors.has_field("duration"));
    }

    #[test]
    fn test_validation_errors_json() {
        let mut errors = ValidationErrors::new();
        errors.add(FieldError::does_not_exist("actors", 999));

        let json = errors.to_json();
        assert!(json.contains("actors"));
        assert!(json.contains("DOES_NOT_EXIST"));
        assert!(json.contains("999"));
    }

    #[test]
    fn test_field_error_helpers() {
        assert_eq!(
            FieldError::invalid_type("rows", "an integer").code,
            ValidationCode::InvalidType
        );
        assert_eq!(FieldError::blank("name").code, ValidationCode::Blank);
        assert_eq!(FieldError::null("name").code, ValidationCode::Null);
        assert_eq!(FieldError::too_small("rows", 1).code, ValidationCode::TooSmall);
        assert_eq!(
            FieldError::too_large("rows", 10).code,
            ValidationCode::TooLarge
        );
    }

    #[test]
    fn test_into_result() {
        assert_eq!(ValidationErrors::new().into_result(5), Ok(5));

        let mut errors = ValidationErrors::new();
        errors.add_required("name");
        assert!(errors.into_result(5).is_err());
    }
}
