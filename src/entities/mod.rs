// Entity Models
//
// Each entity has:
// - A table with declarative column definitions (caption, length, nullability)
// - A key (integer identity, or the composite vet/specialty pair)
// - A display format and ordering used by lists and lookups

pub mod owner;
pub mod pet;
pub mod pet_type;
pub mod specialty;
pub mod vet;
pub mod vet_specialty;
pub mod visit;

pub use owner::{Owner, PhoneType};
pub use pet::Pet;
pub use pet_type::PetType;
pub use specialty::Specialty;
pub use vet::Vet;
pub use vet_specialty::{validate_association, AssociationStore, VetSpecialty, VetSpecialtyKey};
pub use visit::Visit;

use crate::error::{Dependent, Result};
use crate::form::FormValues;
use crate::validation::{Field, ValidationError};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// KEYS
// ============================================================================

/// Runtime key of any row, used where the table is only known at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowKey {
    Id(i64),
    Pair(VetSpecialtyKey),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Id(id) => write!(f, "{}", id),
            RowKey::Pair(key) => write!(f, "{}", key),
        }
    }
}

/// Typed primary key of an entity
pub trait EntityKey:
    Copy + fmt::Debug + fmt::Display + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// WHERE clause matching this key, with one `?` per parameter
    const FILTER: &'static str;

    fn params(&self) -> Vec<Value>;
    fn to_row_key(self) -> RowKey;
    fn from_row_key(key: RowKey) -> Option<Self>;
}

impl EntityKey for i64 {
    const FILTER: &'static str = "id = ?";

    fn params(&self) -> Vec<Value> {
        vec![Value::Integer(*self)]
    }

    fn to_row_key(self) -> RowKey {
        RowKey::Id(self)
    }

    fn from_row_key(key: RowKey) -> Option<Self> {
        match key {
            RowKey::Id(id) => Some(id),
            RowKey::Pair(_) => None,
        }
    }
}

// ============================================================================
// ENTITY
// ============================================================================

/// Whether a record is about to be inserted or is replacing an existing row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode<K> {
    Insert,
    Update { original: K },
}

impl<K: Copy> EditMode<K> {
    /// The key of the row being replaced, if any
    pub fn original(&self) -> Option<K> {
        match self {
            EditMode::Insert => None,
            EditMode::Update { original } => Some(*original),
        }
    }
}

/// A table-backed record
///
/// The associated constants describe the table declaratively; the edit
/// workflow in [`crate::edit`] builds its SQL from them.
pub trait Entity: Clone + fmt::Display + Sized {
    type Key: EntityKey;

    const TABLE: &'static str;
    /// Plural caption, e.g. "Vet specialties"
    const CAPTION: &'static str;
    /// Select list; may include reference display columns
    const SELECT: &'static str;
    const ORDER_BY: &'static str;
    const SEARCH_COLUMNS: &'static [&'static str] = &[];
    /// Writable columns, in form order
    const FIELDS: &'static [Field];
    const HEADERS: &'static [&'static str];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// None until the record has been inserted
    fn key(&self) -> Option<Self::Key>;

    /// Key of a freshly inserted row
    fn inserted_key(&self, rowid: i64) -> Self::Key;

    /// Key the row is stored under after replacing the one at `original`
    fn updated_key(&self, original: Self::Key) -> Self::Key {
        original
    }

    /// Column values to write, keyed by column name
    fn values(&self) -> Vec<(&'static str, Value)>;

    fn cells(&self) -> Vec<String>;

    fn from_form(form: &FormValues, key: Option<Self::Key>) -> Result<Self, ValidationError>;

    /// Entity-specific rule run after field validation, before the row is written
    fn check(&self, _conn: &Connection, _mode: EditMode<Self::Key>) -> Result<()> {
        Ok(())
    }

    /// Error reported when the store rejects the row as a duplicate key
    fn duplicate_error(&self) -> Option<ValidationError> {
        None
    }

    /// Rows elsewhere that reference this one
    fn dependents(_conn: &Connection, _key: Self::Key) -> Result<Vec<Dependent>> {
        Ok(Vec::new())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

pub(crate) fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

pub(crate) fn optional_text(value: Option<&str>) -> Value {
    value.map(text).unwrap_or(Value::Null)
}

pub(crate) fn optional_id(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}

pub(crate) fn optional_date(value: Option<chrono::NaiveDate>) -> Value {
    value
        .map(|date| Value::Text(date.format("%Y-%m-%d").to_string()))
        .unwrap_or(Value::Null)
}

pub(crate) fn display_or_id(display: Option<&str>, id: Option<i64>) -> String {
    match (display, id) {
        (Some(display), _) => display.to_string(),
        (None, Some(id)) => format!("#{}", id),
        (None, None) => String::new(),
    }
}

/// Count rows in `table` whose `column` equals `id`
pub(crate) fn count_references(
    conn: &Connection,
    caption: &'static str,
    table: &str,
    column: &str,
    id: i64,
) -> Result<Dependent> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", table, column),
        [id],
        |row| row.get(0),
    )?;

    Ok(Dependent { caption, count })
}
