// ✏️ Edit Workflow
// Select, insert, update and delete for any entity.
//
// Inserts and updates validate before anything is written:
//   1. field validation (required, length, choices)
//   2. referenced rows exist
//   3. the entity's own check (vet/specialty uniqueness)
// Deletes are refused while other rows still reference the row.

use crate::entities::{EditMode, Entity, EntityKey};
use crate::error::{Dependents, Error, Result};
use crate::validation::{validate_fields, FieldKind, ValidationError};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ErrorCode};

// ============================================================================
// SELECT
// ============================================================================

fn select_where<E: Entity>(
    conn: &Connection,
    filter: Option<&str>,
    params: Vec<rusqlite::types::Value>,
) -> Result<Vec<E>> {
    let where_clause = filter.map(|f| format!(" WHERE {}", f)).unwrap_or_default();
    let sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}",
        E::SELECT,
        E::TABLE,
        where_clause,
        E::ORDER_BY
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params), |row| E::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// All rows, in the entity's order
pub fn select_all<E: Entity>(conn: &Connection) -> Result<Vec<E>> {
    select_where(conn, None, Vec::new())
}

pub fn select_by_key<E: Entity>(conn: &Connection, key: E::Key) -> Result<Option<E>> {
    let mut rows = select_where::<E>(conn, Some(<E::Key as EntityKey>::FILTER), key.params())?;
    Ok(rows.pop())
}

/// Detail rows referencing a master row, e.g. the pets of an owner
pub fn select_details<E: Entity>(conn: &Connection, column: &str, master_id: i64) -> Result<Vec<E>> {
    let filter = format!("{} = ?", column);
    select_where(
        conn,
        Some(&filter),
        vec![rusqlite::types::Value::Integer(master_id)],
    )
}

/// Substring search over the entity's searchable columns
///
/// Matching ignores case for ASCII letters only, as SQLite's `LIKE` does.
/// `%` and `_` in the term match themselves. A blank term, or an entity
/// without searchable columns, returns every row.
pub fn search<E: Entity>(conn: &Connection, term: &str) -> Result<Vec<E>> {
    let term = term.trim();
    if term.is_empty() || E::SEARCH_COLUMNS.is_empty() {
        return select_all(conn);
    }

    let filter = E::SEARCH_COLUMNS
        .iter()
        .map(|column| format!("{} LIKE ?1 ESCAPE '\\'", column))
        .collect::<Vec<_>>()
        .join(" OR ");

    select_where(
        conn,
        Some(&format!("({})", filter)),
        vec![Value::Text(format!("%{}%", escape_like(term)))],
    )
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ============================================================================
// INSERT / UPDATE
// ============================================================================

/// Validate and insert a new row, returning its key
pub fn insert<E: Entity>(conn: &Connection, entity: &E) -> Result<E::Key> {
    let values = entity.values();

    if let Err(err) = validate_fields(E::FIELDS, &values) {
        tracing::debug!(table = E::TABLE, field = %err.field, "insert rejected: {}", err.message);
        return Err(err.into());
    }
    check_references::<E>(conn, &values)?;
    entity.check(conn, EditMode::Insert)?;

    let columns: Vec<&str> = values.iter().map(|(column, _)| *column).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        E::TABLE,
        columns.join(", "),
        placeholders
    );

    conn.execute(&sql, params_from_iter(values.into_iter().map(|(_, v)| v)))
        .map_err(|e| map_write_error(entity, e))?;

    let key = entity.inserted_key(conn.last_insert_rowid());
    tracing::debug!(table = E::TABLE, key = %key, "inserted");

    Ok(key)
}

/// Validate and replace the row stored under `original`
///
/// `original` may differ from the entity's own key when key columns are
/// edited, as with a vet specialty moved to another specialty.
pub fn update<E: Entity>(conn: &Connection, original: E::Key, entity: &E) -> Result<()> {
    ensure_exists::<E>(conn, original)?;

    let values = entity.values();

    if let Err(err) = validate_fields(E::FIELDS, &values) {
        tracing::debug!(table = E::TABLE, field = %err.field, "update rejected: {}", err.message);
        return Err(err.into());
    }
    check_references::<E>(conn, &values)?;
    entity.check(conn, EditMode::Update { original })?;

    let assignments: Vec<String> = values
        .iter()
        .map(|(column, _)| format!("{} = ?", column))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        E::TABLE,
        assignments.join(", "),
        <E::Key as EntityKey>::FILTER
    );

    let params = values
        .into_iter()
        .map(|(_, v)| v)
        .chain(original.params());

    conn.execute(&sql, params_from_iter(params))
        .map_err(|e| map_write_error(entity, e))?;

    tracing::debug!(table = E::TABLE, key = %original, "updated");
    Ok(())
}

/// Every reference field must point at a stored row
fn check_references<E: Entity>(conn: &Connection, values: &[(&'static str, Value)]) -> Result<()> {
    for field in E::FIELDS {
        let FieldKind::Reference(table) = field.kind else {
            continue;
        };
        let Some(id) = values.iter().find_map(|(column, value)| match value {
            Value::Integer(id) if *column == field.column => Some(*id),
            _ => None,
        }) else {
            continue;
        };

        let exists: bool = conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table.table_name()),
            [id],
            |row| row.get(0),
        )?;
        if !exists {
            tracing::debug!(table = E::TABLE, field = field.column, id, "missing reference");
            return Err(ValidationError::invalid(
                field,
                &id.to_string(),
                format!("{} does not exist", field.caption),
            )
            .into());
        }
    }

    Ok(())
}

/// The store is the final guard against duplicate keys
fn map_write_error<E: Entity>(entity: &E, err: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        let duplicate_key = failure.code == ErrorCode::ConstraintViolation
            && matches!(
                failure.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            );

        if duplicate_key {
            if let Some(validation) = entity.duplicate_error() {
                return validation.into();
            }
        }
    }

    err.into()
}

// ============================================================================
// DELETE
// ============================================================================

/// Delete a row that nothing else references
pub fn delete<E: Entity>(conn: &Connection, key: E::Key) -> Result<()> {
    ensure_exists::<E>(conn, key)?;

    let dependents: Vec<_> = E::dependents(conn, key)?
        .into_iter()
        .filter(|d| d.count > 0)
        .collect();
    if !dependents.is_empty() {
        return Err(Error::ReferentialIntegrity {
            entity: E::CAPTION,
            key: key.to_string(),
            dependents: Dependents(dependents),
        });
    }

    conn.execute(
        &format!("DELETE FROM {} WHERE {}", E::TABLE, <E::Key as EntityKey>::FILTER),
        params_from_iter(key.params()),
    )?;

    tracing::debug!(table = E::TABLE, key = %key, "deleted");
    Ok(())
}

fn ensure_exists<E: Entity>(conn: &Connection, key: E::Key) -> Result<()> {
    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            E::TABLE,
            <E::Key as EntityKey>::FILTER
        ),
        params_from_iter(key.params()),
        |row| row.get(0),
    )?;

    if count == 0 {
        return Err(Error::NotFound {
            entity: E::CAPTION,
            key: key.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_demo_data, setup_database};
    use crate::entities::{
        Owner, Pet, PetType, Specialty, Vet, VetSpecialty, VetSpecialtyKey, Visit,
    };
    use crate::entities::vet_specialty::DUPLICATE_ASSOCIATION;
    use crate::validation::{ValidationError, ValidationKind};
    use chrono::NaiveDate;

    fn empty() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn demo() -> Connection {
        let conn = empty();
        seed_demo_data(&conn).unwrap();
        conn
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rejection<T: std::fmt::Debug>(result: Result<T>) -> ValidationError {
        match result {
            Err(Error::Validation(err)) => err,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    /// Linda linked to surgery and radiology, dentistry still free
    struct Clinic {
        conn: Connection,
        linda: i64,
        james: i64,
        surgery: i64,
        radiology: i64,
        dentistry: i64,
    }

    fn clinic() -> Clinic {
        let conn = empty();
        let linda = insert(&conn, &Vet::new("Linda", "Douglas")).unwrap();
        let james = insert(&conn, &Vet::new("James", "Carter")).unwrap();
        let surgery = insert(&conn, &Specialty::new("surgery")).unwrap();
        let radiology = insert(&conn, &Specialty::new("radiology")).unwrap();
        let dentistry = insert(&conn, &Specialty::new("dentistry")).unwrap();

        insert(&conn, &VetSpecialty::new(linda, surgery)).unwrap();
        insert(&conn, &VetSpecialty::new(linda, radiology)).unwrap();
        insert(&conn, &VetSpecialty::new(james, radiology)).unwrap();

        Clinic { conn, linda, james, surgery, radiology, dentistry }
    }

    // ------------------------------------------------------------------------
    // Vet specialty uniqueness
    // ------------------------------------------------------------------------

    #[test]
    fn test_insert_existing_pair_rejected() {
        let c = clinic();

        let err = rejection(insert(&c.conn, &VetSpecialty::new(c.linda, c.surgery)));
        assert_eq!(err.kind, ValidationKind::DuplicateAssociation);
        assert_eq!(err.field, "specialty");
        assert_eq!(err.message, DUPLICATE_ASSOCIATION);

        let links = select_details::<VetSpecialty>(&c.conn, "vet", c.linda).unwrap();
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_insert_new_pair_succeeds() {
        let c = clinic();

        let key = insert(&c.conn, &VetSpecialty::new(c.linda, c.dentistry)).unwrap();
        assert_eq!(key, VetSpecialtyKey { vet: c.linda, specialty: c.dentistry });

        let stored = select_by_key::<VetSpecialty>(&c.conn, key).unwrap().unwrap();
        assert_eq!(stored.to_string(), "Douglas, Linda - dentistry");
    }

    #[test]
    fn test_update_other_row_onto_existing_pair_rejected() {
        let c = clinic();
        let original = VetSpecialtyKey { vet: c.linda, specialty: c.radiology };

        let err = rejection(update(&c.conn, original, &VetSpecialty::new(c.linda, c.surgery)));
        assert_eq!(err.kind, ValidationKind::DuplicateAssociation);
        assert_eq!(err.field, "specialty");

        // moving another vet's link onto Linda/surgery is rejected too
        let james_radiology = VetSpecialtyKey { vet: c.james, specialty: c.radiology };
        let err = rejection(update(
            &c.conn,
            james_radiology,
            &VetSpecialty::new(c.linda, c.surgery),
        ));
        assert_eq!(err.kind, ValidationKind::DuplicateAssociation);

        // nothing changed
        assert!(select_by_key::<VetSpecialty>(&c.conn, original).unwrap().is_some());
        assert!(select_by_key::<VetSpecialty>(&c.conn, james_radiology).unwrap().is_some());
    }

    #[test]
    fn test_update_keeping_pair_succeeds() {
        let c = clinic();
        let key = VetSpecialtyKey { vet: c.linda, specialty: c.surgery };

        update(&c.conn, key, &VetSpecialty::new(c.linda, c.surgery)).unwrap();

        let links = select_details::<VetSpecialty>(&c.conn, "vet", c.linda).unwrap();
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_update_moves_link_to_free_specialty() {
        let c = clinic();
        let original = VetSpecialtyKey { vet: c.linda, specialty: c.radiology };

        update(&c.conn, original, &VetSpecialty::new(c.linda, c.dentistry)).unwrap();

        assert!(select_by_key::<VetSpecialty>(&c.conn, original).unwrap().is_none());
        let moved = VetSpecialtyKey { vet: c.linda, specialty: c.dentistry };
        assert!(select_by_key::<VetSpecialty>(&c.conn, moved).unwrap().is_some());
    }

    #[test]
    fn test_primary_key_violation_reported_as_duplicate() {
        let c = clinic();

        // bypass the check and let the store reject it
        let err = map_write_error(
            &VetSpecialty::new(c.linda, c.surgery),
            c.conn
                .execute(
                    "INSERT INTO vet_specialty (vet, specialty) VALUES (?1, ?2)",
                    [c.linda, c.surgery],
                )
                .unwrap_err(),
        );

        let err = rejection::<()>(Err(err));
        assert_eq!(err.kind, ValidationKind::DuplicateAssociation);
    }

    #[test]
    fn test_seeded_linda_scenario() {
        let conn = demo();
        let linda = search::<Vet>(&conn, "linda").unwrap().remove(0);
        let linda_id = linda.id.unwrap();

        let specialties = select_details::<VetSpecialty>(&conn, "vet", linda_id).unwrap();
        assert_eq!(specialties.len(), 2);

        let surgery = search::<Specialty>(&conn, "surgery").unwrap().remove(0);
        let err = rejection(insert(&conn, &VetSpecialty::new(linda_id, surgery.id.unwrap())));
        assert_eq!(err.value.as_deref(), Some("#2"));

        // point her first specialty at her second one
        let first = specialties[0].key().unwrap();
        let second = specialties[1].specialty.unwrap();
        let err = rejection(update(&conn, first, &VetSpecialty::new(linda_id, second)));
        assert_eq!(err.kind, ValidationKind::DuplicateAssociation);
    }

    #[test]
    fn test_link_to_missing_vet_or_specialty_rejected() {
        let c = clinic();

        let err = rejection(insert(&c.conn, &VetSpecialty::new(999, c.surgery)));
        assert_eq!(err.kind, ValidationKind::InvalidValue);
        assert_eq!(err.field, "vet");
        assert_eq!(err.value.as_deref(), Some("999"));
        assert_eq!(err.message, "Vet does not exist");

        let err = rejection(insert(&c.conn, &VetSpecialty::new(c.james, 999)));
        assert_eq!(err.field, "specialty");
        assert_eq!(err.message, "Specialty does not exist");

        // moving an existing link onto a missing specialty
        let original = VetSpecialtyKey { vet: c.linda, specialty: c.surgery };
        let err = rejection(update(&c.conn, original, &VetSpecialty::new(c.linda, 999)));
        assert_eq!(err.field, "specialty");
        assert!(select_by_key::<VetSpecialty>(&c.conn, original).unwrap().is_some());
    }

    // ------------------------------------------------------------------------
    // Field validation
    // ------------------------------------------------------------------------

    #[test]
    fn test_required_fields_block_insert() {
        let conn = demo();

        let pet = Pet {
            name: "Rex".to_string(),
            owner_id: Some(1),
            pet_type_id: Some(2),
            ..Default::default()
        };
        let err = rejection(insert(&conn, &pet));
        assert_eq!(err.kind, ValidationKind::Required);
        assert_eq!(err.field, "birth_date");
        assert_eq!(err.message, "Birth date is required");
    }

    #[test]
    fn test_max_length_blocks_update() {
        let conn = demo();

        let mut owner = select_by_key::<Owner>(&conn, 1).unwrap().unwrap();
        owner.telephone = Some("1".repeat(21));

        let err = rejection(update(&conn, 1, &owner));
        assert_eq!(err.kind, ValidationKind::TooLong);
        assert_eq!(err.field, "telephone");
    }

    #[test]
    fn test_update_missing_row_not_found() {
        let conn = demo();

        let result = update(&conn, 999, &PetType::new("ferret"));
        assert!(matches!(result, Err(Error::NotFound { entity: "Pet types", .. })));
    }

    // ------------------------------------------------------------------------
    // Delete & referential integrity
    // ------------------------------------------------------------------------

    #[test]
    fn test_delete_referenced_owner_refused() {
        let conn = demo();
        let owner = insert(&conn, &Owner::new("Ada", "Byron")).unwrap();
        let pet = insert(&conn, &Pet::new("Rex", date(2020, 1, 1), 2, owner)).unwrap();
        let visit = insert(&conn, &Visit::new(pet, date(2021, 5, 1), 1, Some("checkup"))).unwrap();

        match delete::<Owner>(&conn, owner) {
            Err(Error::ReferentialIntegrity { entity, dependents, .. }) => {
                assert_eq!(entity, "Owners");
                assert_eq!(dependents.to_string(), "Pets (1)");
            }
            other => panic!("expected referential integrity error, got {:?}", other),
        }

        assert!(delete::<Pet>(&conn, pet).is_err());
        delete::<Visit>(&conn, visit).unwrap();
        delete::<Pet>(&conn, pet).unwrap();
        delete::<Owner>(&conn, owner).unwrap();

        assert!(select_by_key::<Owner>(&conn, owner).unwrap().is_none());
    }

    #[test]
    fn test_delete_vet_lists_all_dependents() {
        let c = clinic();

        match delete::<Vet>(&c.conn, c.linda) {
            Err(Error::ReferentialIntegrity { dependents, .. }) => {
                assert_eq!(dependents.to_string(), "Vet specialties (2)");
            }
            other => panic!("expected referential integrity error, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_missing_row_not_found() {
        let c = clinic();
        let key = VetSpecialtyKey { vet: c.james, specialty: c.surgery };

        assert!(matches!(
            delete::<VetSpecialty>(&c.conn, key),
            Err(Error::NotFound { .. })
        ));
    }

    // ------------------------------------------------------------------------
    // Ordering & search
    // ------------------------------------------------------------------------

    #[test]
    fn test_visits_ordered_by_pet_then_latest_first() {
        let conn = demo();

        let visits = select_all::<Visit>(&conn).unwrap();
        let order: Vec<(i64, String)> = visits
            .iter()
            .map(|v| (v.pet_id.unwrap(), v.visit_date.unwrap().to_string()))
            .collect();

        assert_eq!(
            order,
            vec![
                (7, "2013-01-04".to_string()),
                (7, "2013-01-01".to_string()),
                (8, "2013-01-03".to_string()),
                (8, "2013-01-02".to_string()),
            ]
        );
        assert_eq!(visits[0].pet_name.as_deref(), Some("Samantha"));
    }

    #[test]
    fn test_vets_ordered_by_last_name() {
        let conn = demo();

        let names: Vec<String> = select_all::<Vet>(&conn)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();

        assert_eq!(names[0], "Carter, James");
        assert_eq!(names[names.len() - 1], "Stevens, Henry");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let conn = demo();

        let owners = search::<Owner>(&conn, "DAVIS").unwrap();
        let names: Vec<String> = owners.iter().map(|o| o.to_string()).collect();
        assert_eq!(names, vec!["Davis, Betty", "Davis, Harold"]);

        assert_eq!(search::<Owner>(&conn, "  ").unwrap().len(), 10);
        // visits have no searchable columns
        assert_eq!(search::<Visit>(&conn, "rabies").unwrap().len(), 4);

        // only ASCII letters fold
        insert(&conn, &Owner::new("Émile", "Zola")).unwrap();
        assert_eq!(search::<Owner>(&conn, "ÉMILE").unwrap().len(), 1);
        assert!(search::<Owner>(&conn, "émile").unwrap().is_empty());
    }

    #[test]
    fn test_search_wildcards_match_literally() {
        let conn = demo();

        assert!(search::<Owner>(&conn, "_").unwrap().is_empty());
        assert!(search::<Owner>(&conn, "%").unwrap().is_empty());
        assert!(search::<Owner>(&conn, "\\").unwrap().is_empty());

        let owner = insert(&conn, &Owner::new("Ada", "Byron_100%")).unwrap();
        let found = search::<Owner>(&conn, "n_100%").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, Some(owner));
    }

    #[test]
    fn test_details_carry_reference_names() {
        let conn = demo();

        let pets = select_details::<Pet>(&conn, "owner_id", 6).unwrap();
        let names: Vec<&str> = pets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Max", "Samantha"]);
        assert_eq!(pets[0].owner_name.as_deref(), Some("Coleman, Jean"));
        assert_eq!(pets[0].pet_type_name.as_deref(), Some("cat"));
    }
}
