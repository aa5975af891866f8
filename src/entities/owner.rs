// 🏠 Owner Entity

use super::{count_references, optional_text, text, Entity};
use crate::error::{Dependent, Result};
use crate::form::FormValues;
use crate::validation::{Field, ValidationError};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// PHONE TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhoneType {
    Mobile,
    Home,
    Work,
}

impl PhoneType {
    pub const NAMES: &'static [&'static str] = &["MOBILE", "HOME", "WORK"];

    /// Stored column value
    pub fn as_str(&self) -> &'static str {
        match self {
            PhoneType::Mobile => "MOBILE",
            PhoneType::Home => "HOME",
            PhoneType::Work => "WORK",
        }
    }
}

impl FromStr for PhoneType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MOBILE" => Ok(PhoneType::Mobile),
            "HOME" => Ok(PhoneType::Home),
            "WORK" => Ok(PhoneType::Work),
            other => Err(format!("Unknown phone type: {}", other)),
        }
    }
}

// ============================================================================
// OWNER ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub telephone: Option<String>,
    #[serde(default)]
    pub phone_type: Option<PhoneType>,
}

impl Owner {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Owner {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            ..Default::default()
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.last_name, self.first_name)
    }
}

impl Entity for Owner {
    type Key = i64;

    const TABLE: &'static str = "owner";
    const CAPTION: &'static str = "Owners";
    const SELECT: &'static str =
        "id, first_name, last_name, address, city, telephone, phone_type";
    const ORDER_BY: &'static str = "last_name, first_name";
    const SEARCH_COLUMNS: &'static [&'static str] = &["first_name", "last_name"];
    const FIELDS: &'static [Field] = &[
        Field::text("first_name", "First name", 30).required(),
        Field::text("last_name", "Last name", 30).required(),
        Field::text("address", "Address", 255),
        Field::text("city", "City", 80),
        Field::text("telephone", "Telephone", 20),
        Field::choice("phone_type", "Phone type", PhoneType::NAMES),
    ];
    const HEADERS: &'static [&'static str] = &[
        "Id",
        "First name",
        "Last name",
        "Address",
        "City",
        "Telephone",
        "Phone type",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let phone_type: Option<String> = row.get("phone_type")?;

        Ok(Owner {
            id: row.get("id")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            address: row.get("address")?,
            city: row.get("city")?,
            telephone: row.get("telephone")?,
            // Unknown values read back as unset rather than failing the whole list
            phone_type: phone_type.and_then(|s| s.parse().ok()),
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
            ("address", optional_text(self.address.as_deref())),
            ("city", optional_text(self.city.as_deref())),
            ("telephone", optional_text(self.telephone.as_deref())),
            (
                "phone_type",
                optional_text(self.phone_type.map(|p| p.as_str())),
            ),
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.map(|id| id.to_string()).unwrap_or_default(),
            self.first_name.clone(),
            self.last_name.clone(),
            self.address.clone().unwrap_or_default(),
            self.city.clone().unwrap_or_default(),
            self.telephone.clone().unwrap_or_default(),
            self.phone_type
                .map(|p| p.as_str().to_string())
                .unwrap_or_default(),
        ]
    }

    fn from_form(form: &FormValues, key: Option<i64>) -> Result<Self, ValidationError> {
        Ok(Owner {
            id: key,
            first_name: form.text("first_name"),
            last_name: form.text("last_name"),
            address: form.optional_text("address"),
            city: form.optional_text("city"),
            telephone: form.optional_text("telephone"),
            phone_type: form.parsed("phone_type")?,
        })
    }

    fn dependents(conn: &Connection, key: i64) -> Result<Vec<Dependent>> {
        Ok(vec![count_references(conn, "Pets", "pet", "owner_id", key)?])
    }
}
