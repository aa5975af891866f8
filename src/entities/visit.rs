// 📋 Visit Entity
// A pet seen by a vet on a given date

use super::{display_or_id, optional_date, optional_id, optional_text, Entity};
use crate::domain::Table;
use crate::form::FormValues;
use crate::validation::{Field, ValidationError};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Visit {
    #[serde(default)]
    pub id: Option<i64>,
    pub pet_id: Option<i64>,
    pub visit_date: Option<NaiveDate>,
    pub vet_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default, skip_deserializing)]
    pub pet_name: Option<String>,
    #[serde(default, skip_deserializing)]
    pub vet_name: Option<String>,
}

impl Visit {
    pub fn new(pet_id: i64, visit_date: NaiveDate, vet_id: i64, description: Option<&str>) -> Self {
        Visit {
            pet_id: Some(pet_id),
            visit_date: Some(visit_date),
            vet_id: Some(vet_id),
            description: description.map(str::to_string),
            ..Default::default()
        }
    }
}

/// "2013-01-01 - Samantha"
impl fmt::Display for Visit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self.visit_date.map(|d| d.to_string()).unwrap_or_default();
        write!(
            f,
            "{} - {}",
            date,
            display_or_id(self.pet_name.as_deref(), self.pet_id)
        )
    }
}

impl Entity for Visit {
    type Key = i64;

    const TABLE: &'static str = "visit";
    const CAPTION: &'static str = "Visits";
    const SELECT: &'static str = "id, pet_id, visit_date, vet_id, description, \
        (SELECT pet.name FROM pet WHERE pet.id = visit.pet_id) AS pet_name, \
        (SELECT vet.last_name || ', ' || vet.first_name FROM vet WHERE vet.id = visit.vet_id) AS vet_name";
    const ORDER_BY: &'static str = "pet_id ASC, visit_date DESC";
    const FIELDS: &'static [Field] = &[
        Field::reference("pet_id", "Pet", Table::Pet).required(),
        Field::date("visit_date", "Date").required(),
        Field::reference("vet_id", "Vet", Table::Vet).required(),
        Field::text("description", "Description", 255),
    ];
    const HEADERS: &'static [&'static str] = &["Id", "Pet", "Date", "Vet", "Description"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Visit {
            id: row.get("id")?,
            pet_id: row.get("pet_id")?,
            visit_date: row.get("visit_date")?,
            vet_id: row.get("vet_id")?,
            description: row.get("description")?,
            pet_name: row.get("pet_name")?,
            vet_name: row.get("vet_name")?,
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
            ("pet_id", optional_id(self.pet_id)),
            ("visit_date", optional_date(self.visit_date)),
            ("vet_id", optional_id(self.vet_id)),
            ("description", optional_text(self.description.as_deref())),
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.map(|id| id.to_string()).unwrap_or_default(),
            display_or_id(self.pet_name.as_deref(), self.pet_id),
            self.visit_date.map(|d| d.to_string()).unwrap_or_default(),
            display_or_id(self.vet_name.as_deref(), self.vet_id),
            self.description.clone().unwrap_or_default(),
        ]
    }

    fn from_form(form: &FormValues, key: Option<i64>) -> Result<Self, ValidationError> {
        Ok(Visit {
            id: key,
            pet_id: form.reference("pet_id")?,
            visit_date: form.date("visit_date")?,
            vet_id: form.reference("vet_id")?,
            description: form.optional_text("description"),
            ..Default::default()
        })
    }
}
