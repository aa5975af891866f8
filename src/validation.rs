// 📐 Field Validation
// Column definitions and the required/length checks every entity runs before persisting

use crate::domain::Table;
use rusqlite::types::Value;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// FIELD DEFINITIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text with a maximum length in characters
    Text { max_length: usize },
    /// ISO date, `YYYY-MM-DD`
    Date,
    /// Integer id of a row in another table
    Reference(Table),
    /// One of a fixed set of values
    Choice(&'static [&'static str]),
}

/// A writable column of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub column: &'static str,
    pub caption: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl Field {
    pub const fn text(column: &'static str, caption: &'static str, max_length: usize) -> Self {
        Field {
            column,
            caption,
            kind: FieldKind::Text { max_length },
            nullable: true,
        }
    }

    pub const fn date(column: &'static str, caption: &'static str) -> Self {
        Field {
            column,
            caption,
            kind: FieldKind::Date,
            nullable: true,
        }
    }

    pub const fn reference(column: &'static str, caption: &'static str, table: Table) -> Self {
        Field {
            column,
            caption,
            kind: FieldKind::Reference(table),
            nullable: true,
        }
    }

    pub const fn choice(
        column: &'static str,
        caption: &'static str,
        options: &'static [&'static str],
    ) -> Self {
        Field {
            column,
            caption,
            kind: FieldKind::Choice(options),
            nullable: true,
        }
    }

    pub const fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

// ============================================================================
// VALIDATION ERROR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    Required,
    TooLong,
    InvalidValue,
    DuplicateAssociation,
}

/// A rejected value, tied to the field it was entered in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub kind: ValidationKind,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        kind: ValidationKind,
        field: impl Into<String>,
        value: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationError {
            kind,
            field: field.into(),
            value,
            message: message.into(),
        }
    }

    pub fn required(field: &Field) -> Self {
        Self::new(
            ValidationKind::Required,
            field.column,
            None,
            format!("{} is required", field.caption),
        )
    }

    pub fn invalid(field: &Field, value: &str, message: impl Into<String>) -> Self {
        Self::new(
            ValidationKind::InvalidValue,
            field.column,
            Some(value.to_string()),
            message,
        )
    }
}

pub type ValidationResult = Result<(), ValidationError>;

// ============================================================================
// VALIDATOR
// ============================================================================

/// Check column values against their field definitions
///
/// Fields are visited in declaration order and the first failure wins, so a
/// form always reports the topmost problem. Values whose column has no field
/// definition are ignored.
pub fn validate_fields(fields: &[Field], values: &[(&'static str, Value)]) -> ValidationResult {
    for field in fields {
        let value = values
            .iter()
            .find(|(column, _)| *column == field.column)
            .map(|(_, value)| value)
            .unwrap_or(&Value::Null);

        if is_null(value) {
            if !field.nullable {
                return Err(ValidationError::required(field));
            }
            continue;
        }

        match (field.kind, value) {
            (FieldKind::Text { max_length }, Value::Text(text)) => {
                if text.chars().count() > max_length {
                    return Err(ValidationError::new(
                        ValidationKind::TooLong,
                        field.column,
                        Some(text.clone()),
                        format!("{} exceeds maximum length of {}", field.caption, max_length),
                    ));
                }
            }
            (FieldKind::Choice(options), Value::Text(text)) => {
                if !options.contains(&text.as_str()) {
                    return Err(ValidationError::invalid(
                        field,
                        text,
                        format!("{} must be one of {}", field.caption, options.join(", ")),
                    ));
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn is_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(text) => text.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[Field] = &[
        Field::text("name", "Name", 5).required(),
        Field::text("city", "City", 3),
        Field::choice("phone_type", "Phone type", &["MOBILE", "HOME"]),
    ];

    #[test]
    fn test_valid_values_pass() {
        let values = vec![
            ("name", Value::from("Leo".to_string())),
            ("city", Value::Null),
            ("phone_type", Value::from("HOME".to_string())),
        ];

        assert!(validate_fields(FIELDS, &values).is_ok());
    }

    #[test]
    fn test_required_rejects_null_and_blank() {
        let missing = validate_fields(FIELDS, &[]).unwrap_err();
        assert_eq!(missing.kind, ValidationKind::Required);
        assert_eq!(missing.field, "name");
        assert_eq!(missing.message, "Name is required");

        let blank = validate_fields(FIELDS, &[("name", Value::from("   ".to_string()))]).unwrap_err();
        assert_eq!(blank.kind, ValidationKind::Required);
    }

    #[test]
    fn test_max_length_counts_characters() {
        // five characters, more than five bytes
        let ok = vec![("name", Value::from("Björk".to_string()))];
        assert!(validate_fields(FIELDS, &ok).is_ok());

        let too_long = vec![
            ("name", Value::from("Leo".to_string())),
            ("city", Value::from("Madison".to_string())),
        ];
        let err = validate_fields(FIELDS, &too_long).unwrap_err();
        assert_eq!(err.kind, ValidationKind::TooLong);
        assert_eq!(err.field, "city");
        assert_eq!(err.value.as_deref(), Some("Madison"));
        assert_eq!(err.message, "City exceeds maximum length of 3");
    }

    #[test]
    fn test_choice_outside_options() {
        let values = vec![
            ("name", Value::from("Leo".to_string())),
            ("phone_type", Value::from("FAX".to_string())),
        ];

        let err = validate_fields(FIELDS, &values).unwrap_err();
        assert_eq!(err.kind, ValidationKind::InvalidValue);
        assert_eq!(err.field, "phone_type");
    }

    #[test]
    fn test_first_failure_wins() {
        let values = vec![("city", Value::from("Madison".to_string()))];

        let err = validate_fields(FIELDS, &values).unwrap_err();
        assert_eq!(err.field, "name");
    }
}
