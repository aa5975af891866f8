// 🩺 Vet Entity

use super::{count_references, text, Entity};
use crate::error::{Dependent, Result};
use crate::form::FormValues;
use crate::validation::{Field, ValidationError};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Vet {
    #[serde(default)]
    pub id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
}

impl Vet {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Vet {
            id: None,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        }
    }
}

/// "Douglas, Linda"
impl fmt::Display for Vet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.last_name, self.first_name)
    }
}

impl Entity for Vet {
    type Key = i64;

    const TABLE: &'static str = "vet";
    const CAPTION: &'static str = "Vets";
    const SELECT: &'static str = "id, first_name, last_name";
    const ORDER_BY: &'static str = "last_name, first_name";
    const SEARCH_COLUMNS: &'static [&'static str] = &["first_name", "last_name"];
    const FIELDS: &'static [Field] = &[
        Field::text("first_name", "First name", 30).required(),
        Field::text("last_name", "Last name", 30).required(),
    ];
    const HEADERS: &'static [&'static str] = &["Id", "First name", "Last name"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Vet {
            id: row.get("id")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
        })
    }

    fn key(&self) -> Option<i64> {
        self.id
    }

    fn inserted_key(&self, rowid: i64) -> i64 {
        rowid
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("first_name", text(&self.first_name)),
            ("last_name", text(&self.last_name)),
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.map(|id| id.to_string()).unwrap_or_default(),
            self.first_name.clone(),
            self.last_name.clone(),
        ]
    }

    fn from_form(form: &FormValues, key: Option<i64>) -> Result<Self, ValidationError> {
        Ok(Vet {
            id: key,
            first_name: form.text("first_name"),
            last_name: form.text("last_name"),
        })
    }

    fn dependents(conn: &Connection, key: i64) -> Result<Vec<Dependent>> {
        Ok(vec![
            count_references(conn, "Vet specialties", "vet_specialty", "vet", key)?,
            count_references(conn, "Visits", "visit", "vet_id", key)?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{validate_fields, ValidationKind};

    #[test]
    fn test_vet_display_is_last_comma_first() {
        let vet = Vet::new("Linda", "Douglas");
        assert_eq!(vet.to_string(), "Douglas, Linda");
    }

    #[test]
    fn test_vet_names_are_required_and_bounded() {
        let missing = Vet::new("", "Douglas");
        let err = validate_fields(Vet::FIELDS, &missing.values()).unwrap_err();
        assert_eq!(err.field, "first_name");
        assert_eq!(err.message, "First name is required");

        let long = Vet::new("Linda", &"x".repeat(31));
        let err = validate_fields(Vet::FIELDS, &long.values()).unwrap_err();
        assert_eq!(err.kind, ValidationKind::TooLong);
        assert_eq!(err.field, "last_name");
    }
}
