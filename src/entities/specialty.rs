use super::{count_references, text, Entity};
use crate::error::{Dependent, Result};
use crate::form::FormValues;
use crate::validation::{Field, ValidationError};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Specialty {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
}

impl Specialty {
    pub fn new(name: &str) -> Self {
        Specialty {
            id: None,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Entity for Specialty {
    type Key = i64;

    const TABLE: &'static str = "specialty";
    const CAPTION: &'static str = "Specialties";
    const SELECT: &'static str = "id, name";
    const ORDER_BY: &'static str = "name";
    const SEARCH_COLUMNS: &'static [&'static str] = &["name"];
    const FIELDS: &'static [Field] = &[Field::text("name", "Name", 80).required()];
    const HEADERS: &'static [&'static str] = &["Id", "Name"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Specialty {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }

    fn key(&self) -> Option<i64> {
        self.id
    }

    fn inserted_key(&self, rowid: i64) -> i64 {
        rowid
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![("name", text(&self.name))]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.map(|id| id.to_string()).unwrap_or_default(),
            self.name.clone(),
        ]
    }

    fn from_form(form: &FormValues, key: Option<i64>) -> Result<Self, ValidationError> {
        Ok(Specialty {
            id: key,
            name: form.text("name"),
        })
    }

    fn dependents(conn: &Connection, key: i64) -> Result<Vec<Dependent>> {
        Ok(vec![count_references(
            conn,
            "Vet specialties",
            "vet_specialty",
            "specialty",
            key,
        )?])
    }
}
