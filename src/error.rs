// Error types for the Petclinic library
//
// Validation failures are user feedback, everything else is a fault.

use crate::validation::ValidationError;
use std::fmt;
use thiserror::Error;

/// Rows in another table that still reference the row being deleted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependent {
    pub caption: &'static str,
    pub count: i64,
}

/// Display helper: "Pets (2), Visits (1)"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependents(pub Vec<Dependent>);

impl fmt::Display for Dependents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|d| format!("{} ({})", d.caption, d.count))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Cannot delete {entity} {key}, it is referenced by {dependents}")]
    ReferentialIntegrity {
        entity: &'static str,
        key: String,
        dependents: Dependents,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl Error {
    /// The validation error, if this is user feedback rather than a fault
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependents_display() {
        let dependents = Dependents(vec![
            Dependent { caption: "Pets", count: 2 },
            Dependent { caption: "Visits", count: 1 },
        ]);

        assert_eq!(dependents.to_string(), "Pets (2), Visits (1)");

        let err = Error::ReferentialIntegrity {
            entity: "Owner",
            key: "1".to_string(),
            dependents,
        };
        assert_eq!(
            err.to_string(),
            "Cannot delete Owner 1, it is referenced by Pets (2), Visits (1)"
        );
        assert!(err.as_validation().is_none());
    }
}
