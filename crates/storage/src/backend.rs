//! Storage backend trait definition.
//!
//! This module defines the [`StorageBackend`] trait, the core abstraction for
//! key-value storage in gatehouse. All storage implementations
//! ([`MemoryBackend`](crate::MemoryBackend), [`SqliteBackend`](crate::SqliteBackend))
//! implement this trait.
//!
//! # Design Philosophy
//!
//! The trait provides a minimal, generic key-value interface:
//! - **Keys and values are bytes**: No assumptions about serialization format
//! - **Async by default**: All operations are async for non-blocking I/O
//! - **Range queries supported**: Efficient prefix scans and ordered iteration
//! - **Transactional**: Atomic multi-key operations via transactions
//!
//! Domain-specific logic (members, acceptance keys, announcements) lives in
//! the repository layer built on top of this trait, not in the storage
//! backends.

use std::ops::RangeBounds;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    StorageError, error::StorageResult, transaction::Transaction, types::KeyValue,
};

/// Abstract storage backend for key-value operations.
///
/// Backends are expected to be thread-safe (`Send + Sync`) and support
/// concurrent operations.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](StorageBackend::get) | Retrieve a single value by key |
/// | [`set`](StorageBackend::set) | Store a key-value pair |
/// | [`compare_and_set`](StorageBackend::compare_and_set) | Atomic compare-and-swap |
/// | [`delete`](StorageBackend::delete) | Remove a key |
/// | [`get_range`](StorageBackend::get_range) | Retrieve multiple keys in a range |
/// | [`transaction`](StorageBackend::transaction) | Begin an atomic transaction |
/// | [`health_check`](StorageBackend::health_check) | Verify backend availability |
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` if the key exists
    /// - `Ok(None)` if the key doesn't exist
    /// - `Err(...)` on storage errors
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Stores a key-value pair.
    ///
    /// If the key already exists, its value is overwritten.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Atomically sets a key's value if it matches the expected current value.
    ///
    /// # Semantics
    ///
    /// The `expected` parameter controls the precondition:
    ///
    /// - **`expected: None`** — insert-if-absent. Succeeds only when the key does not exist.
    ///   Fails with [`Conflict`](crate::StorageError::Conflict) if any value is present.
    /// - **`expected: Some(value)`** — update-if-unchanged. Succeeds only when the current value
    ///   is an exact byte-for-byte match of `value`. Fails with
    ///   [`Conflict`](crate::StorageError::Conflict) if the key is absent or holds a different
    ///   value.
    ///
    /// # Byte Comparison Rules
    ///
    /// The comparison is an exact, length-sensitive byte equality check with
    /// no normalization or encoding-aware comparison — callers must ensure
    /// the expected value is byte-identical to the stored value.
    ///
    /// **Serialization warning**: If you serialize structured data before
    /// storing it, the byte representation must be deterministic across
    /// serialization calls. `serde_json` serializes struct fields in
    /// declaration order (deterministic), but `HashMap` entries in arbitrary
    /// order. Prefer struct types or `BTreeMap` for CAS values, reuse the raw
    /// bytes you read as the `expected` value, or use
    /// [`compare_and_set_json`](StorageBackend::compare_and_set_json).
    ///
    /// # Behavior Within Transactions
    ///
    /// When called through [`Transaction::compare_and_set`], the operation is
    /// buffered and the precondition is evaluated at
    /// [`Transaction::commit`] time. If any CAS precondition fails, the
    /// entire transaction is rejected with
    /// [`Conflict`](crate::StorageError::Conflict) and no operations are
    /// applied.
    ///
    /// # Retry Pattern
    ///
    /// `Conflict` means a concurrent writer won the race. Callers that want
    /// to retry should re-read the current value and re-derive the update —
    /// blind retries will keep conflicting.
    #[must_use = "compare-and-set may fail with a conflict and errors must be handled"]
    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StorageResult<()>;

    /// Atomically sets a key's JSON value if the current value deserializes
    /// to the expected value.
    ///
    /// Typed convenience wrapper around
    /// [`compare_and_set`](StorageBackend::compare_and_set): serializes
    /// `expected` and `new_value` to JSON bytes and delegates to the
    /// byte-level CAS. Because both sides use the same serializer, the
    /// comparison is deterministic regardless of the type's internal field
    /// ordering (as long as the type contains no `HashMap`).
    ///
    /// # Errors
    ///
    /// - [`StorageError::Serialization`](crate::StorageError) — `expected` or `new_value` cannot
    ///   be serialized to JSON.
    /// - [`StorageError::Conflict`](crate::StorageError) — the current value does not match
    ///   `expected`.
    #[must_use = "compare-and-set may fail with a conflict and errors must be handled"]
    async fn compare_and_set_json<T>(
        &self,
        key: &[u8],
        expected: Option<&T>,
        new_value: &T,
    ) -> StorageResult<()>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let expected_bytes = expected
            .map(|v| serde_json::to_vec(v))
            .transpose()
            .map_err(|e: serde_json::Error| StorageError::serialization(e.to_string()))?;

        let new_bytes = serde_json::to_vec(new_value)
            .map_err(|e| StorageError::serialization(e.to_string()))?;

        self.compare_and_set(key, expected_bytes.as_deref(), new_bytes).await
    }

    /// Deletes a key.
    ///
    /// If the key doesn't exist, this is a no-op (returns `Ok(())`).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Retrieves all key-value pairs within a range.
    ///
    /// The range is defined using Rust's standard [`RangeBounds`] trait,
    /// allowing `start..end`, `start..=end`, `start..`, and `..end` forms.
    /// Results are returned in key order.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get_range<R>(&self, range: R) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>> + Send;

    /// Begins a new transaction.
    ///
    /// Returns a [`Transaction`] handle that can be used to perform multiple
    /// operations atomically.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>>;

    /// Checks backend availability.
    ///
    /// Returns `Ok(())` when the backend can serve traffic; an error
    /// otherwise. Used by the service's health endpoint.
    #[must_use = "health check results indicate backend availability and must be inspected"]
    async fn health_check(&self) -> StorageResult<()>;
}
