// Petclinic domain - the tables and how they hang together
//
// Master-detail:
//   Owners → Pets → Visits
//   Vets   → Vet specialties
// Support tables: Pet types, Specialties

use crate::edit;
use crate::entities::{
    Entity, EntityKey, Owner, Pet, PetType, RowKey, Specialty, Vet, VetSpecialty, Visit,
};
use crate::error::{Error, Result};
use crate::form::FormValues;
use crate::validation::Field;
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Owner,
    Pet,
    Visit,
    Vet,
    VetSpecialty,
    PetType,
    Specialty,
}

/// One row as shown in a list: its key and the rendered cells
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub key: RowKey,
    pub cells: Vec<String>,
}

/// A selectable reference target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub id: i64,
    pub label: String,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Owner,
        Table::Pet,
        Table::Visit,
        Table::Vet,
        Table::VetSpecialty,
        Table::PetType,
        Table::Specialty,
    ];

    /// Command line / URL name
    pub fn name(&self) -> &'static str {
        match self {
            Table::Owner => "owner",
            Table::Pet => "pet",
            Table::Visit => "visit",
            Table::Vet => "vet",
            Table::VetSpecialty => "vet-specialty",
            Table::PetType => "pet-type",
            Table::Specialty => "specialty",
        }
    }

    /// Detail tables shown under a selected row of this one
    pub fn details(&self) -> &'static [Table] {
        match self {
            Table::Owner => &[Table::Pet],
            Table::Pet => &[Table::Visit],
            Table::Vet => &[Table::VetSpecialty],
            _ => &[],
        }
    }

    /// Column referencing the master row, for detail tables
    pub fn master_column(&self) -> Option<&'static str> {
        match self {
            Table::Pet => Some("owner_id"),
            Table::Visit => Some("pet_id"),
            Table::VetSpecialty => Some("vet"),
            _ => None,
        }
    }

    /// SQL table holding the rows
    pub fn table_name(&self) -> &'static str {
        self.ops().table
    }

    pub fn caption(&self) -> &'static str {
        self.ops().caption
    }

    pub fn fields(&self) -> &'static [Field] {
        self.ops().fields
    }

    pub fn headers(&self) -> &'static [&'static str] {
        self.ops().headers
    }

    /// Rows of this table, optionally restricted to one master row and a search term
    pub fn rows(
        &self,
        conn: &Connection,
        master: Option<i64>,
        search: Option<&str>,
    ) -> Result<Vec<RowView>> {
        (self.ops().rows)(conn, self.master_column().zip(master), search)
    }

    /// Current values of a row as form text, in field order
    pub fn form_values(&self, conn: &Connection, key: RowKey) -> Result<Vec<String>> {
        (self.ops().form_values)(conn, key)
    }

    /// Insert (no original key) or update a row from form input
    pub fn save(
        &self,
        conn: &Connection,
        original: Option<RowKey>,
        form: &FormValues,
    ) -> Result<RowKey> {
        (self.ops().save)(conn, original, form)
    }

    pub fn delete(&self, conn: &Connection, key: RowKey) -> Result<()> {
        (self.ops().delete)(conn, key)
    }

    /// `(id, display)` for every row, used to fill reference fields
    pub fn lookup_choices(&self, conn: &Connection) -> Result<Vec<Choice>> {
        (self.ops().choices)(conn)
    }

    fn ops(&self) -> TableOps {
        match self {
            Table::Owner => TableOps::of::<Owner>(),
            Table::Pet => TableOps::of::<Pet>(),
            Table::Visit => TableOps::of::<Visit>(),
            Table::Vet => TableOps::of::<Vet>(),
            Table::VetSpecialty => TableOps::of::<VetSpecialty>(),
            Table::PetType => TableOps::of::<PetType>(),
            Table::Specialty => TableOps::of::<Specialty>(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        let singular = normalized
            .strip_suffix("ies")
            .map(|stem| format!("{}y", stem))
            .or_else(|| normalized.strip_suffix('s').map(str::to_string))
            .unwrap_or_else(|| normalized.clone());

        Table::ALL
            .iter()
            .find(|t| t.name() == normalized || t.name() == singular)
            .copied()
            .ok_or_else(|| {
                let names: Vec<&str> = Table::ALL.iter().map(|t| t.name()).collect();
                format!("Unknown table '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

// ============================================================================
// TABLE OPERATIONS
// ============================================================================

/// Entity operations with the entity type erased
struct TableOps {
    table: &'static str,
    caption: &'static str,
    fields: &'static [Field],
    headers: &'static [&'static str],
    rows: fn(&Connection, Option<(&str, i64)>, Option<&str>) -> Result<Vec<RowView>>,
    form_values: fn(&Connection, RowKey) -> Result<Vec<String>>,
    save: fn(&Connection, Option<RowKey>, &FormValues) -> Result<RowKey>,
    delete: fn(&Connection, RowKey) -> Result<()>,
    choices: fn(&Connection) -> Result<Vec<Choice>>,
}

impl TableOps {
    fn of<E: Entity>() -> Self {
        TableOps {
            table: E::TABLE,
            caption: E::CAPTION,
            fields: E::FIELDS,
            headers: E::HEADERS,
            rows: rows_of::<E>,
            form_values: form_values_of::<E>,
            save: save_of::<E>,
            delete: delete_of::<E>,
            choices: choices_of::<E>,
        }
    }
}

fn rows_of<E: Entity>(
    conn: &Connection,
    master: Option<(&str, i64)>,
    search: Option<&str>,
) -> Result<Vec<RowView>> {
    let mut rows: Vec<E> = match master {
        Some((column, id)) => edit::select_details(conn, column, id)?,
        None => edit::search(conn, search.unwrap_or(""))?,
    };

    // detail lists are short, filter them in memory
    if let (Some(_), Some(term)) = (master, search) {
        let term = term.trim().to_lowercase();
        if !term.is_empty() {
            rows.retain(|row| {
                row.cells()
                    .iter()
                    .any(|cell| cell.to_lowercase().contains(&term))
            });
        }
    }

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            row.key().map(|key| RowView {
                key: key.to_row_key(),
                cells: row.cells(),
            })
        })
        .collect())
}

fn typed_key<E: Entity>(key: RowKey) -> Result<E::Key> {
    E::Key::from_row_key(key).ok_or_else(|| Error::NotFound {
        entity: E::CAPTION,
        key: key.to_string(),
    })
}

fn form_values_of<E: Entity>(conn: &Connection, key: RowKey) -> Result<Vec<String>> {
    let key = typed_key::<E>(key)?;
    let entity = edit::select_by_key::<E>(conn, key)?.ok_or_else(|| Error::NotFound {
        entity: E::CAPTION,
        key: key.to_string(),
    })?;

    let values = entity.values();
    Ok(E::FIELDS
        .iter()
        .map(|field| {
            values
                .iter()
                .find(|(column, _)| *column == field.column)
                .map(|(_, value)| value_text(value))
                .unwrap_or_default()
        })
        .collect())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(_) => String::new(),
    }
}

fn save_of<E: Entity>(
    conn: &Connection,
    original: Option<RowKey>,
    form: &FormValues,
) -> Result<RowKey> {
    let original = original.map(typed_key::<E>).transpose()?;
    let entity = E::from_form(form, original)?;

    let key = match original {
        None => edit::insert(conn, &entity)?,
        Some(original) => {
            edit::update(conn, original, &entity)?;
            entity.updated_key(original)
        }
    };

    Ok(key.to_row_key())
}

fn delete_of<E: Entity>(conn: &Connection, key: RowKey) -> Result<()> {
    edit::delete::<E>(conn, typed_key::<E>(key)?)
}

fn choices_of<E: Entity>(conn: &Connection) -> Result<Vec<Choice>> {
    Ok(edit::select_all::<E>(conn)?
        .into_iter()
        .filter_map(|entity| match entity.key()?.to_row_key() {
            RowKey::Id(id) => Some(Choice {
                id,
                label: entity.to_string(),
            }),
            RowKey::Pair(_) => None,
        })
        .collect())
}
