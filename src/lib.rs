// Petclinic - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod db;
pub mod domain;
pub mod edit;
pub mod entities;
pub mod error;
pub mod form;
pub mod validation;

// Re-export commonly used types
pub use db::{
    count_rows, open_database, open_schema, seed_demo_data, setup_database, DatabaseLocation,
};
pub use domain::{Choice, RowView, Table};
pub use entities::{
    validate_association, AssociationStore, EditMode, Entity, EntityKey, Owner, Pet, PetType,
    PhoneType, RowKey, Specialty, Vet, VetSpecialty, VetSpecialtyKey, Visit,
};
pub use error::{Error, Result};
pub use form::{Form, FormValues};
pub use validation::{ValidationError, ValidationKind};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with RUST_LOG environment variable support
///
/// Logs go to stderr so they never mix with command output or the terminal UI.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
