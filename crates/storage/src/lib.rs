//! Storage backend abstraction for the gatehouse membership service.
//!
//! This crate provides the [`StorageBackend`] trait and related types that
//! form the foundation for all persistence in gatehouse. The registry
//! (repository) layer and the HTTP service are both written against this
//! abstraction, so the concrete store can be swapped or faked in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! │           (HTTP handlers, auth, registration)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   Repository Layer                          │
//! │     members │ acceptance keys │ announcements               │
//! │       (domain logic, serialization, indexing)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 gatehouse-storage                           │
//! │              StorageBackend trait                           │
//! │    (get, set, compare_and_set, get_range, transaction)      │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryBackend│            SqliteBackend                     │
//! │   (testing)  │            (durable)                         │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use gatehouse_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set(b"user:123".to_vec(), b"Alice".to_vec()).await?;
//!     let value = backend.get(b"user:123").await?;
//!     assert_eq!(value.map(|b| b.to_vec()), Some(b"Alice".to_vec()));
//!
//!     // Transactions apply multiple operations atomically
//!     let mut txn = backend.transaction().await?;
//!     txn.set(b"counter".to_vec(), b"1".to_vec());
//!     txn.set(b"updated".to_vec(), b"true".to_vec());
//!     txn.commit().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Available Backends
//!
//! | Backend | Use Case | Persistence |
//! |---------|----------|-------------|
//! | [`MemoryBackend`] | Testing, development | No |
//! | [`SqliteBackend`] | Single-node production | Yes |
//!
//! Use the [`Backend`] enum when the choice is made at runtime (e.g. from
//! configuration).
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`]. Backends map their internal
//! errors to the standardized [`StorageError`] variants.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with shared test helpers (key/value generators,
//!   backend factories, assertion macros). Enable this in `[dev-dependencies]` for integration
//!   tests.

#![deny(unsafe_code)]

pub mod backend;
pub mod backend_enum;
pub mod error;
pub mod memory;
pub mod sqlite;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod transaction;
pub mod types;

// Re-export primary types at crate root for convenience
pub use backend::StorageBackend;
pub use backend_enum::Backend;
pub use error::{BoxError, StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use transaction::Transaction;
pub use types::{KeyId, KeyValue, MessageId, UserId};
