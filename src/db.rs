use crate::edit;
use crate::entities::{Owner, Pet, PetType, PhoneType, Specialty, Vet, VetSpecialty, Visit};
use crate::error::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ============================================================================
// DATABASE LOCATION
// ============================================================================

/// Where the database lives; `:memory:` selects a throwaway in-memory database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl FromStr for DatabaseLocation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("Database path must not be empty".to_string()),
            ":memory:" => Ok(DatabaseLocation::Memory),
            path => Ok(DatabaseLocation::File(PathBuf::from(path))),
        }
    }
}

impl fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseLocation::Memory => write!(f, ":memory:"),
            DatabaseLocation::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Open a database with the schema in place
///
/// An in-memory database starts out with the demo data, a file database is
/// only seeded by `petclinic init`.
pub fn open_database(location: &DatabaseLocation) -> Result<Connection> {
    let conn = open_schema(location)?;
    if *location == DatabaseLocation::Memory {
        seed_demo_data(&conn)?;
    }
    Ok(conn)
}

/// Open a database with the schema in place and never seed it
pub fn open_schema(location: &DatabaseLocation) -> Result<Connection> {
    let conn = match location {
        DatabaseLocation::Memory => Connection::open_in_memory()?,
        DatabaseLocation::File(path) => Connection::open(path)?,
    };

    setup_database(&conn)?;

    tracing::info!(database = %location, "database opened");
    Ok(conn)
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS vet (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS specialty (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        );

        -- the composite key makes the store reject duplicate links on its own
        CREATE TABLE IF NOT EXISTS vet_specialty (
            vet INTEGER NOT NULL REFERENCES vet(id),
            specialty INTEGER NOT NULL REFERENCES specialty(id),
            PRIMARY KEY (vet, specialty)
        );

        CREATE TABLE IF NOT EXISTS pet_type (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS owner (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            address TEXT,
            city TEXT,
            telephone TEXT,
            phone_type TEXT
        );

        CREATE TABLE IF NOT EXISTS pet (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            birth_date TEXT NOT NULL,
            type_id INTEGER NOT NULL REFERENCES pet_type(id),
            owner_id INTEGER NOT NULL REFERENCES owner(id)
        );

        CREATE TABLE IF NOT EXISTS visit (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pet_id INTEGER NOT NULL REFERENCES pet(id),
            visit_date TEXT NOT NULL,
            vet_id INTEGER NOT NULL REFERENCES vet(id),
            description TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_vet_specialty_specialty ON vet_specialty(specialty);
        CREATE INDEX IF NOT EXISTS idx_pet_owner ON pet(owner_id);
        CREATE INDEX IF NOT EXISTS idx_visit_pet ON visit(pet_id);
        CREATE INDEX IF NOT EXISTS idx_visit_vet ON visit(vet_id);",
    )?;

    Ok(())
}

// ============================================================================
// DEMO DATA
// ============================================================================

/// Insert the classic petclinic data set; does nothing if vets already exist
///
/// Returns the number of rows inserted.
pub fn seed_demo_data(conn: &Connection) -> Result<usize> {
    if count_rows(conn, "vet")? > 0 {
        return Ok(0);
    }

    let tx = conn.unchecked_transaction()?;

    let mut vets = Vec::new();
    for (first, last) in [
        ("James", "Carter"),
        ("Helen", "Leary"),
        ("Linda", "Douglas"),
        ("Rafael", "Ortega"),
        ("Henry", "Stevens"),
        ("Sharon", "Jenkins"),
    ] {
        vets.push(edit::insert(&tx, &Vet::new(first, last))?);
    }

    let mut specialties = Vec::new();
    for name in ["radiology", "surgery", "dentistry"] {
        specialties.push(edit::insert(&tx, &Specialty::new(name))?);
    }

    // (vet, specialty) by position
    for (vet, specialty) in [(1, 0), (2, 1), (2, 2), (3, 1), (4, 0)] {
        edit::insert(&tx, &VetSpecialty::new(vets[vet], specialties[specialty]))?;
    }

    let mut types = Vec::new();
    for name in ["cat", "dog", "lizard", "snake", "bird", "hamster"] {
        types.push(edit::insert(&tx, &PetType::new(name))?);
    }

    let mut owners = Vec::new();
    for (first, last, address, city, telephone, phone_type) in [
        ("George", "Franklin", "110 W. Liberty St.", "Madison", "6085551023", PhoneType::Home),
        ("Betty", "Davis", "638 Cardinal Ave.", "Sun Prairie", "6085551749", PhoneType::Mobile),
        ("Eduardo", "Rodriquez", "2693 Commerce St.", "McFarland", "6085558763", PhoneType::Work),
        ("Harold", "Davis", "563 Friendly St.", "Windsor", "6085553198", PhoneType::Home),
        ("Peter", "McTavish", "2387 S. Fair Way", "Madison", "6085552765", PhoneType::Mobile),
        ("Jean", "Coleman", "105 N. Lake St.", "Monona", "6085552654", PhoneType::Home),
        ("Jeff", "Black", "1450 Oak Blvd.", "Monona", "6085555387", PhoneType::Work),
        ("Maria", "Escobito", "345 Maple St.", "Madison", "6085557683", PhoneType::Mobile),
        ("David", "Schroeder", "2749 Blackhawk Trail", "Madison", "6085559435", PhoneType::Home),
        ("Carlos", "Estaban", "2335 Independence La.", "Waunakee", "6085555487", PhoneType::Mobile),
    ] {
        let owner = Owner {
            address: Some(address.to_string()),
            city: Some(city.to_string()),
            telephone: Some(telephone.to_string()),
            phone_type: Some(phone_type),
            ..Owner::new(first, last)
        };
        owners.push(edit::insert(&tx, &owner)?);
    }

    // (name, birth date, type, owner) by position
    let mut pets = Vec::new();
    for (name, birth_date, pet_type, owner) in [
        ("Leo", "2010-09-07", 0, 0),
        ("Basil", "2012-08-06", 5, 1),
        ("Rosy", "2011-04-17", 1, 2),
        ("Jewel", "2010-03-07", 1, 2),
        ("Iggy", "2010-11-30", 2, 3),
        ("George", "2010-01-20", 3, 4),
        ("Samantha", "2012-09-04", 0, 5),
        ("Max", "2012-09-04", 0, 5),
        ("Lucky", "2011-08-06", 4, 6),
        ("Mulligan", "2007-02-24", 1, 7),
        ("Freddy", "2010-03-09", 4, 8),
        ("Lucky", "2010-06-24", 1, 9),
        ("Sly", "2012-06-08", 0, 9),
    ] {
        let pet = Pet::new(name, demo_date(birth_date)?, types[pet_type], owners[owner]);
        pets.push(edit::insert(&tx, &pet)?);
    }

    for (pet, date, vet, description) in [
        (6, "2013-01-01", 0, "rabies shot"),
        (7, "2013-01-02", 1, "rabies shot"),
        (7, "2013-01-03", 2, "neutered"),
        (6, "2013-01-04", 3, "spayed"),
    ] {
        let visit = Visit::new(pets[pet], demo_date(date)?, vets[vet], Some(description));
        edit::insert(&tx, &visit)?;
    }

    let inserted = vets.len() + specialties.len() + 5 + types.len() + owners.len() + pets.len() + 4;
    tx.commit()?;

    tracing::info!(rows = inserted, "demo data seeded");
    Ok(inserted)
}

fn demo_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)).into()
    })
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;

    Ok(count)
}
