use std::io;
use thiserror::Error;

/// Represents all possible errors surfaced by registry operations
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Caller lacks the role or token approval the operation requires
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed allocation request (sum mismatch, length mismatch, empty recipients)
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation collides with an existing allocation record
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation would leave the registry in a forbidden state
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Query or reference to something the registry does not know about
    #[error("not found: {0}")]
    NotFound(String),

    /// A delegated call to an external asset ledger failed
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// IO errors that occur when reading/writing snapshot files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Anyhow error wrapper for error context
    #[error(transparent)]
    Context(#[from] anyhow::Error),
}

/// Errors reported by the external asset ledgers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The minting identity is not enrolled on the ledger
    #[error("identity {0} is not an enrolled minter")]
    NotMinter(String),

    /// The identity does not hold the token it tried to act on
    #[error("identity {0} does not hold token {1}")]
    NotHolder(String, u64),

    /// No token with this identifier exists on the ledger
    #[error("unknown token {0}")]
    UnknownToken(u64),

    /// A burn would take a balance below zero
    #[error("insufficient balance of share class {share}: held {held}, requested {requested}")]
    InsufficientBalance {
        share: u64,
        held: u128,
        requested: u128,
    },

    /// The ledger refused the mint
    #[error("mint rejected: {0}")]
    MintRejected(String),
}

// Additional From conversions for common error types

impl From<bincode::Error> for RegistryError {
    fn from(err: bincode::Error) -> Self {
        RegistryError::Serialization(err.to_string())
    }
}
