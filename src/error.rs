// Error taxonomy for the stock ledger
// Every failure is surfaced synchronously; multi-row writes roll back fully.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StockError {
    /// Missing or malformed input, rejected before any write
    #[error("validation: {0}")]
    Validation(String),

    /// Referenced entity does not exist
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Unique key collision (type code, SKU, BOM pair, ...)
    #[error("duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    /// Operation not valid for the entity's current state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Underlying storage error
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StockError>;

impl StockError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StockError::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        StockError::NotFound {
            entity,
            key: key.into(),
        }
    }
}

/// Translate a unique-constraint violation into a Duplicate error,
/// leaving every other storage error untouched.
pub fn map_unique_violation(
    err: rusqlite::Error,
    entity: &'static str,
    key: &str,
) -> StockError {
    match err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StockError::Duplicate {
                entity,
                key: key.to_string(),
            }
        }
        other => StockError::Db(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = StockError::not_found("item", "ALU-XXXXXX");
        assert_eq!(e.to_string(), "item not found: ALU-XXXXXX");

        let e = StockError::validation("qty must be > 0");
        assert_eq!(e.to_string(), "validation: qty must be > 0");

        let e = StockError::Duplicate {
            entity: "bom line",
            key: "PRD-1/ALU-1".to_string(),
        };
        assert_eq!(e.to_string(), "duplicate bom line: PRD-1/ALU-1");
    }

    #[test]
    fn test_map_unique_violation_passthrough() {
        let err = rusqlite::Error::InvalidQuery;
        match map_unique_violation(err, "item type", "ALU") {
            StockError::Db(rusqlite::Error::InvalidQuery) => {}
            other => panic!("expected Db passthrough, got {:?}", other),
        }
    }
}
