// 🔗 Vet Specialty - many-to-many link between vets and specialties
//
// The (vet, specialty) pair is the row's key and both halves are editable.
// A pair may only exist once: `validate_association` is run by the edit
// workflow before every insert and update, and the table's primary key
// rejects anything that races past it.

use super::{display_or_id, optional_id, EditMode, Entity, EntityKey, RowKey};
use crate::domain::Table;
use crate::error::Result;
use crate::form::FormValues;
use crate::validation::{validate_fields, Field, ValidationError, ValidationKind};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DUPLICATE_ASSOCIATION: &str = "Vet/specialty combination already exists";

// ============================================================================
// KEY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VetSpecialtyKey {
    pub vet: i64,
    pub specialty: i64,
}

impl fmt::Display for VetSpecialtyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vet, self.specialty)
    }
}

impl EntityKey for VetSpecialtyKey {
    const FILTER: &'static str = "vet = ? AND specialty = ?";

    fn params(&self) -> Vec<Value> {
        vec![Value::Integer(self.vet), Value::Integer(self.specialty)]
    }

    fn to_row_key(self) -> RowKey {
        RowKey::Pair(self)
    }

    fn from_row_key(key: RowKey) -> Option<Self> {
        match key {
            RowKey::Pair(key) => Some(key),
            RowKey::Id(_) => None,
        }
    }
}

// ============================================================================
// ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VetSpecialty {
    pub vet: Option<i64>,
    pub specialty: Option<i64>,

    #[serde(default, skip_deserializing)]
    pub vet_name: Option<String>,
    #[serde(default, skip_deserializing)]
    pub specialty_name: Option<String>,
}

impl VetSpecialty {
    pub fn new(vet: i64, specialty: i64) -> Self {
        VetSpecialty {
            vet: Some(vet),
            specialty: Some(specialty),
            ..Default::default()
        }
    }

    /// The rejection reported when this pair already exists
    pub fn duplicate(&self) -> ValidationError {
        ValidationError::new(
            ValidationKind::DuplicateAssociation,
            "specialty",
            Some(display_or_id(self.specialty_name.as_deref(), self.specialty)),
            DUPLICATE_ASSOCIATION,
        )
    }
}

/// "Douglas, Linda - surgery"
impl fmt::Display for VetSpecialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            display_or_id(self.vet_name.as_deref(), self.vet),
            display_or_id(self.specialty_name.as_deref(), self.specialty)
        )
    }
}

impl Entity for VetSpecialty {
    type Key = VetSpecialtyKey;

    const TABLE: &'static str = "vet_specialty";
    const CAPTION: &'static str = "Vet specialties";
    const SELECT: &'static str = "vet, specialty, \
        (SELECT vet.last_name || ', ' || vet.first_name FROM vet WHERE vet.id = vet_specialty.vet) AS vet_name, \
        (SELECT specialty.name FROM specialty WHERE specialty.id = vet_specialty.specialty) AS specialty_name";
    const ORDER_BY: &'static str = "vet_name, specialty_name";
    const FIELDS: &'static [Field] = &[
        Field::reference("vet", "Vet", Table::Vet).required(),
        Field::reference("specialty", "Specialty", Table::Specialty).required(),
    ];
    const HEADERS: &'static [&'static str] = &["Vet", "Specialty"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(VetSpecialty {
            vet: row.get("vet")?,
            specialty: row.get("specialty")?,
            vet_name: row.get("vet_name")?,
            specialty_name: row.get("specialty_name")?,
        })
    }

    fn key(&self) -> Option<VetSpecialtyKey> {
        match (self.vet, self.specialty) {
            (Some(vet), Some(specialty)) => Some(VetSpecialtyKey { vet, specialty }),
            _ => None,
        }
    }

    fn inserted_key(&self, _rowid: i64) -> VetSpecialtyKey {
        // both halves are required, so validation has already rejected a partial pair
        VetSpecialtyKey {
            vet: self.vet.unwrap_or_default(),
            specialty: self.specialty.unwrap_or_default(),
        }
    }

    fn updated_key(&self, original: VetSpecialtyKey) -> VetSpecialtyKey {
        self.key().unwrap_or(original)
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("vet", optional_id(self.vet)),
            ("specialty", optional_id(self.specialty)),
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            display_or_id(self.vet_name.as_deref(), self.vet),
            display_or_id(self.specialty_name.as_deref(), self.specialty),
        ]
    }

    fn from_form(form: &FormValues, _key: Option<VetSpecialtyKey>) -> Result<Self, ValidationError> {
        Ok(VetSpecialty {
            vet: form.reference("vet")?,
            specialty: form.reference("specialty")?,
            specialty_name: form.label("specialty"),
            vet_name: form.label("vet"),
        })
    }

    fn check(&self, conn: &Connection, mode: EditMode<VetSpecialtyKey>) -> Result<()> {
        validate_association(conn, self, mode)
    }

    fn duplicate_error(&self) -> Option<ValidationError> {
        Some(self.duplicate())
    }
}

// ============================================================================
// ASSOCIATION UNIQUENESS
// ============================================================================

/// Row counting needed by the uniqueness check
pub trait AssociationStore {
    /// Number of links with this exact pair, not counting the `excluding` row
    fn count_associations(
        &self,
        vet_id: i64,
        specialty_id: i64,
        excluding: Option<VetSpecialtyKey>,
    ) -> Result<i64>;
}

impl AssociationStore for Connection {
    fn count_associations(
        &self,
        vet_id: i64,
        specialty_id: i64,
        excluding: Option<VetSpecialtyKey>,
    ) -> Result<i64> {
        let count = match excluding {
            None => self.query_row(
                "SELECT COUNT(*) FROM vet_specialty WHERE specialty = ?1 AND vet = ?2",
                params![specialty_id, vet_id],
                |row| row.get(0),
            )?,
            Some(own) => self.query_row(
                "SELECT COUNT(*) FROM vet_specialty
                 WHERE specialty = ?1 AND vet = ?2
                   AND NOT (vet = ?3 AND specialty = ?4)",
                params![specialty_id, vet_id, own.vet, own.specialty],
                |row| row.get(0),
            )?,
        };

        Ok(count)
    }
}

/// Reject a link whose (vet, specialty) pair is already taken by another row
///
/// Required references are checked first. On update the row being replaced is
/// left out of the count, so saving a link without changing its pair passes.
/// The duplicate error is reported against the `specialty` field.
pub fn validate_association<S: AssociationStore + ?Sized>(
    store: &S,
    candidate: &VetSpecialty,
    mode: EditMode<VetSpecialtyKey>,
) -> Result<()> {
    validate_fields(VetSpecialty::FIELDS, &candidate.values())?;

    let Some(key) = candidate.key() else {
        return Ok(());
    };

    let count = store.count_associations(key.vet, key.specialty, mode.original())?;
    if count > 0 {
        tracing::debug!(vet = key.vet, specialty = key.specialty, "duplicate vet specialty rejected");
        return Err(candidate.duplicate().into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    /// In-memory stand-in for the table
    struct Links(Vec<VetSpecialtyKey>);

    impl AssociationStore for Links {
        fn count_associations(
            &self,
            vet_id: i64,
            specialty_id: i64,
            excluding: Option<VetSpecialtyKey>,
        ) -> Result<i64> {
            Ok(self
                .0
                .iter()
                .filter(|k| k.vet == vet_id && k.specialty == specialty_id)
                .filter(|k| Some(**k) != excluding)
                .count() as i64)
        }
    }

    const LINDA: i64 = 3;
    const SURGERY: i64 = 2;
    const DENTISTRY: i64 = 3;
    const RADIOLOGY: i64 = 1;

    fn links() -> Links {
        Links(vec![
            VetSpecialtyKey { vet: LINDA, specialty: SURGERY },
            VetSpecialtyKey { vet: LINDA, specialty: RADIOLOGY },
        ])
    }

    fn rejection(result: Result<()>) -> ValidationError {
        match result {
            Err(Error::Validation(err)) => err,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_new_pair_is_valid() {
        let candidate = VetSpecialty::new(LINDA, DENTISTRY);
        assert!(validate_association(&links(), &candidate, EditMode::Insert).is_ok());
    }

    #[test]
    fn test_existing_pair_rejected_on_insert() {
        let mut candidate = VetSpecialty::new(LINDA, SURGERY);
        candidate.specialty_name = Some("surgery".to_string());

        let err = rejection(validate_association(&links(), &candidate, EditMode::Insert));
        assert_eq!(err.kind, ValidationKind::DuplicateAssociation);
        assert_eq!(err.field, "specialty");
        assert_eq!(err.value.as_deref(), Some("surgery"));
        assert_eq!(err.message, DUPLICATE_ASSOCIATION);
    }

    #[test]
    fn test_update_onto_another_rows_pair_rejected() {
        // Linda/radiology changed to Linda/surgery, which another row already holds
        let candidate = VetSpecialty::new(LINDA, SURGERY);
        let mode = EditMode::Update {
            original: VetSpecialtyKey { vet: LINDA, specialty: RADIOLOGY },
        };

        let err = rejection(validate_association(&links(), &candidate, mode));
        assert_eq!(err.kind, ValidationKind::DuplicateAssociation);
        assert_eq!(err.value.as_deref(), Some("#2"));
    }

    #[test]
    fn test_update_keeping_own_pair_is_valid() {
        let candidate = VetSpecialty::new(LINDA, SURGERY);
        let mode = EditMode::Update {
            original: VetSpecialtyKey { vet: LINDA, specialty: SURGERY },
        };

        assert!(validate_association(&links(), &candidate, mode).is_ok());
    }

    #[test]
    fn test_missing_reference_reported_before_counting() {
        let candidate = VetSpecialty {
            vet: Some(LINDA),
            ..Default::default()
        };

        let err = rejection(validate_association(&links(), &candidate, EditMode::Insert));
        assert_eq!(err.kind, ValidationKind::Required);
        assert_eq!(err.field, "specialty");
        assert_eq!(err.message, "Specialty is required");
    }

    #[test]
    fn test_connection_store_excludes_own_row() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::setup_database(&conn).unwrap();
        crate::db::seed_demo_data(&conn).unwrap();

        // seed data links Linda Douglas (3) to surgery (2) and dentistry (3)
        assert_eq!(conn.count_associations(3, 2, None).unwrap(), 1);
        assert_eq!(
            conn.count_associations(3, 2, Some(VetSpecialtyKey { vet: 3, specialty: 2 }))
                .unwrap(),
            0
        );
        assert_eq!(
            conn.count_associations(3, 2, Some(VetSpecialtyKey { vet: 3, specialty: 3 }))
                .unwrap(),
            1
        );
        assert_eq!(conn.count_associations(1, 1, None).unwrap(), 0);
    }

    #[test]
    fn test_display_uses_reference_names() {
        let link = VetSpecialty {
            vet: Some(LINDA),
            specialty: Some(SURGERY),
            vet_name: Some("Douglas, Linda".to_string()),
            specialty_name: Some("surgery".to_string()),
        };

        assert_eq!(link.to_string(), "Douglas, Linda - surgery");
        assert_eq!(VetSpecialty::new(LINDA, SURGERY).to_string(), "#3 - #2");
    }
}
