//! Repository error types.

use gatehouse_storage::{StorageError, UserId};
use thiserror::Error;

/// Errors produced by registry operations.
///
/// These are user-input or policy errors surfaced directly to the caller as
/// the terminal response; only [`Storage`](RegistryError::Storage) reflects
/// an underlying persistence failure.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registration was attempted without an acceptance key.
    #[error("Acceptance key is required")]
    MissingKey,

    /// The acceptance key does not exist or has already been used.
    ///
    /// The two cases are deliberately indistinguishable to the caller.
    #[error("Invalid or used acceptance key")]
    InvalidKey,

    /// The requested username is already registered.
    #[error("Username already exists")]
    UsernameTaken,

    /// The referenced user does not exist.
    #[error("User not found: {id}")]
    NotFound {
        /// The user id that was not found.
        id: UserId,
    },

    /// Announcement content was blank after trimming.
    #[error("Announcement content must not be empty")]
    EmptyContent,

    /// An underlying storage failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
