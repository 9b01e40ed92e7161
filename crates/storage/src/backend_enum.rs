//! Unified backend enum for gatehouse storage.
//!
//! This module provides the [`Backend`] enum, a unified type that can
//! represent any available storage backend implementation. This enables
//! runtime selection of backends (e.g. from configuration) while keeping
//! static dispatch.
//!
//! # Available Backends
//!
//! | Variant | Use Case |
//! |---------|----------|
//! | [`Backend::Memory`] | Testing, development, ephemeral deployments |
//! | [`Backend::Sqlite`] | Durable single-node deployments |
//!
//! # Usage
//!
//! ```
//! use gatehouse_storage::{Backend, MemoryBackend, StorageBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Backend::Memory(MemoryBackend::new());
//!
//! backend.set(b"key".to_vec(), b"value".to_vec()).await?;
//! let value = backend.get(b"key").await?;
//! # Ok(())
//! # }
//! ```

use std::ops::RangeBounds;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    MemoryBackend, SqliteBackend, StorageBackend, StorageResult, Transaction, types::KeyValue,
};

/// Unified storage backend enum.
///
/// Wraps the available backend implementations, enabling runtime selection
/// while maintaining type safety.
#[derive(Clone)]
pub enum Backend {
    /// In-memory backend for testing and ephemeral deployments.
    Memory(MemoryBackend),
    /// Durable SQLite backend.
    Sqlite(SqliteBackend),
}

impl Backend {
    /// Creates a new memory backend.
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(MemoryBackend::new())
    }

    /// Opens (or creates) a SQLite backend at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`](crate::StorageError::Connection)
    /// if the database cannot be opened.
    pub fn sqlite(path: impl AsRef<std::path::Path>) -> StorageResult<Self> {
        Ok(Self::Sqlite(SqliteBackend::open(path)?))
    }

    /// Returns true if this is a memory backend.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory(_))
    }
}

#[async_trait]
impl StorageBackend for Backend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        match self {
            Self::Memory(b) => b.get(key).await,
            Self::Sqlite(b) => b.get(key).await,
        }
    }

    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        match self {
            Self::Memory(b) => b.set(key, value).await,
            Self::Sqlite(b) => b.set(key, value).await,
        }
    }

    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StorageResult<()> {
        match self {
            Self::Memory(b) => b.compare_and_set(key, expected, new_value).await,
            Self::Sqlite(b) => b.compare_and_set(key, expected, new_value).await,
        }
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        match self {
            Self::Memory(b) => b.delete(key).await,
            Self::Sqlite(b) => b.delete(key).await,
        }
    }

    async fn get_range<R>(&self, range: R) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>> + Send,
    {
        match self {
            Self::Memory(b) => b.get_range(range).await,
            Self::Sqlite(b) => b.get_range(range).await,
        }
    }

    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        match self {
            Self::Memory(b) => b.transaction().await,
            Self::Sqlite(b) => b.transaction().await,
        }
    }

    async fn health_check(&self) -> StorageResult<()> {
        match self {
            Self::Memory(b) => b.health_check().await,
            Self::Sqlite(b) => b.health_check().await,
        }
    }
}
