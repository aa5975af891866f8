// 🐾 Pet Entity
// Belongs to an owner, has a pet type

use super::{count_references, display_or_id, optional_date, optional_id, text, Entity};
use crate::domain::Table;
use crate::error::{Dependent, Result};
use crate::form::FormValues;
use crate::validation::{Field, ValidationError};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pet {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub pet_type_id: Option<i64>,
    pub owner_id: Option<i64>,

    // Display values of the referenced rows (read only)
    #[serde(default, skip_deserializing)]
    pub pet_type_name: Option<String>,
    #[serde(default, skip_deserializing)]
    pub owner_name: Option<String>,
}

impl Pet {
    pub fn new(name: &str, birth_date: NaiveDate, pet_type_id: i64, owner_id: i64) -> Self {
        Pet {
            name: name.to_string(),
            birth_date: Some(birth_date),
            pet_type_id: Some(pet_type_id),
            owner_id: Some(owner_id),
            ..Default::default()
        }
    }
}

impl fmt::Display for Pet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Entity for Pet {
    type Key = i64;

    const TABLE: &'static str = "pet";
    const CAPTION: &'static str = "Pets";
    const SELECT: &'static str = "id, name, birth_date, type_id, owner_id, \
        (SELECT pet_type.name FROM pet_type WHERE pet_type.id = pet.type_id) AS pet_type_name, \
        (SELECT owner.last_name || ', ' || owner.first_name FROM owner WHERE owner.id = pet.owner_id) AS owner_name";
    const ORDER_BY: &'static str = "name";
    const SEARCH_COLUMNS: &'static [&'static str] = &["name"];
    const FIELDS: &'static [Field] = &[
        Field::reference("owner_id", "Owner", Table::Owner).required(),
        Field::text("name", "Name", 30).required(),
        Field::date("birth_date", "Birth date").required(),
        Field::reference("type_id", "Pet type", Table::PetType).required(),
    ];
    const HEADERS: &'static [&'static str] = &["Id", "Owner", "Name", "Birth date", "Pet type"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Pet {
            id: row.get("id")?,
            name: row.get("name")?,
            birth_date: row.get("birth_date")?,
            pet_type_id: row.get("type_id")?,
            owner_id: row.get("owner_id")?,
            pet_type_name: row.get("pet_type_name")?,
            owner_name: row.get("owner_name")?,
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
            ("owner_id", optional_id(self.owner_id)),
            ("name", text(&self.name)),
            ("birth_date", optional_date(self.birth_date)),
            ("type_id", optional_id(self.pet_type_id)),
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.map(|id| id.to_string()).unwrap_or_default(),
            display_or_id(self.owner_name.as_deref(), self.owner_id),
            self.name.clone(),
            self.birth_date.map(|d| d.to_string()).unwrap_or_default(),
            display_or_id(self.pet_type_name.as_deref(), self.pet_type_id),
        ]
    }

    fn from_form(form: &FormValues, key: Option<i64>) -> Result<Self, ValidationError> {
        Ok(Pet {
            id: key,
            name: form.text("name"),
            birth_date: form.date("birth_date")?,
            pet_type_id: form.reference("type_id")?,
            owner_id: form.reference("owner_id")?,
            ..Default::default()
        })
    }

    fn dependents(conn: &Connection, key: i64) -> Result<Vec<Dependent>> {
        Ok(vec![count_references(conn, "Visits", "visit", "pet_id", key)?])
    }
}
