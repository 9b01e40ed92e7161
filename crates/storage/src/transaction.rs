//! Transaction trait for atomic storage operations.
//!
//! # Transaction Semantics
//!
//! Transactions provide:
//! - **Atomicity**: All operations in a transaction either succeed together or fail together
//! - **Read-your-writes**: Reads within a transaction see pending writes
//! - **Buffering**: Writes are buffered until commit
//!
//! # Example
//!
//! ```
//! use gatehouse_storage::{MemoryBackend, StorageBackend};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let backend = MemoryBackend::new();
//!
//! backend.set(b"account:alice".to_vec(), b"100".to_vec()).await.unwrap();
//! backend.set(b"account:bob".to_vec(), b"50".to_vec()).await.unwrap();
//!
//! // Atomic transfer via transaction
//! let mut txn = backend.transaction().await.unwrap();
//! txn.set(b"account:alice".to_vec(), b"80".to_vec());
//! txn.set(b"account:bob".to_vec(), b"70".to_vec());
//! txn.commit().await.unwrap();
//!
//! let alice = backend.get(b"account:alice").await.unwrap().unwrap();
//! assert_eq!(&alice[..], b"80");
//! # });
//! ```

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;

/// A compare-and-set operation buffered for verification at commit time.
#[derive(Debug, Clone)]
pub(crate) struct CasOp {
    pub(crate) key: Vec<u8>,
    pub(crate) expected: Option<Vec<u8>>,
    pub(crate) new_value: Vec<u8>,
}

/// Transaction handle for atomic multi-operation commits.
///
/// A transaction buffers operations (sets and deletes) until
/// [`commit`](Transaction::commit) is called, at which point all operations
/// are applied atomically.
///
/// Transactions support read-your-writes semantics: a
/// [`get`](Transaction::get) call returns data from pending writes within the
/// same transaction.
///
/// # Concurrency
///
/// Transactions implement optimistic concurrency control. If a buffered
/// compare-and-set precondition no longer holds when the transaction commits
/// (because a concurrent writer got there first), the commit fails with
/// [`StorageError::Conflict`](crate::StorageError::Conflict) and none of the
/// buffered operations are applied.
#[async_trait]
pub trait Transaction: Send {
    /// Gets a value within the transaction.
    ///
    /// Checks pending writes first, then falls back to reading from the
    /// underlying storage if the key hasn't been modified in this
    /// transaction.
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Buffers a set operation within the transaction.
    ///
    /// The write is applied atomically when [`commit`](Transaction::commit)
    /// is called. Subsequent [`get`](Transaction::get) calls for this key
    /// within the same transaction return the buffered value.
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Buffers a delete operation within the transaction.
    ///
    /// Subsequent [`get`](Transaction::get) calls for this key within the
    /// same transaction return `None`.
    fn delete(&mut self, key: Vec<u8>);

    /// Buffers a compare-and-set operation within the transaction.
    ///
    /// The condition is checked at commit time, not when this method is
    /// called. `expected: None` requires the key to be absent
    /// (insert-if-absent); `expected: Some(bytes)` requires an exact
    /// byte-for-byte match of the current value. If any buffered condition
    /// fails at commit time, the entire transaction fails with
    /// [`Conflict`](crate::StorageError::Conflict) and nothing is applied.
    fn compare_and_set(
        &mut self,
        key: Vec<u8>,
        expected: Option<Vec<u8>>,
        new_value: Vec<u8>,
    ) -> StorageResult<()>;

    /// Commits all buffered operations atomically.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Conflict`](crate::StorageError::Conflict) if any buffered
    ///   compare-and-set precondition fails
    /// - Other [`StorageError`](crate::StorageError) variants on backend failures
    ///
    /// # Consumes
    ///
    /// This method consumes the transaction. After commit (successful or
    /// not), the transaction cannot be used further.
    async fn commit(self: Box<Self>) -> StorageResult<()>;
}
