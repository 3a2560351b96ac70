//! Unified error type for the challenge engine.
//!
//! Domain failures are grouped the way callers need to react to them: bad input,
//! conflicts with existing state, time-gated policy, ownership checks, missing rows
//! and violated invariants. None of them are retried internally.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Every failure the crate can surface.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Underlying store failure
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Bad input shape or a cap was exceeded
    #[error("Validation failed: {message}")]
    Validation {
        /// Human-readable reason
        message: String,
    },

    /// Request collides with existing state (duplicate diary, answered invite, ...)
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable reason
        message: String,
    },

    /// Time-gated or state-gated restriction
    #[error("Not allowed right now: {message}")]
    Policy {
        /// Human-readable reason
        message: String,
    },

    /// Caller does not own the resource or lacks the owner role
    #[error("Not authorized: {message}")]
    Authorization {
        /// Human-readable reason
        message: String,
    },

    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"challenge"`
        entity: &'static str,
        /// Lookup key that failed
        id: String,
    },

    /// A member tried to use an item on their own membership
    #[error("Items cannot be used on yourself")]
    SelfTarget,

    /// Inventory entry exists but holds no items
    #[error("No item {item_id} left in inventory of membership {membership_id}")]
    InsufficientInventory {
        /// Acting membership
        membership_id: i64,
        /// Item that was requested
        item_id: i64,
    },

    /// Stored data violates an invariant
    #[error("Invariant violated: {message}")]
    Domain {
        /// Human-readable reason
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::NotFound`] keyed by any displayable id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Maps a unique-constraint violation to [`Error::Conflict`], passing everything else through.
    pub fn conflict_on_unique(err: DbErr, message: impl Into<String>) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Self::Conflict {
                message: message.into(),
            },
            _ => Self::Database(err),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
