//! Member, acceptance-key, and announcement repository for gatehouse.
//!
//! This crate is the repository layer of the gatehouse membership service:
//! it owns the domain records (members, one-time acceptance keys, admin
//! announcements), their serialization and key layout in storage, and the
//! operations over them — most importantly the atomic key-redemption
//! transaction that creates a new member.
//!
//! # Core invariants
//!
//! - **Username uniqueness**: enforced by an insert-if-absent write on the
//!   `usernames/` index inside the registration transaction, never by a
//!   check-then-act sequence alone.
//! - **One-time keys**: an acceptance key transitions used=false → used=true
//!   exactly once, atomically with the creation of the member that redeemed
//!   it, and never reverts. If member creation fails (e.g. the username was
//!   taken concurrently), the whole transaction is rejected and the key
//!   stays unused and retriable.
//! - **Append-only announcements**: announcements are immutable once posted
//!   and read newest-first.
//!
//! # Example
//!
//! ```
//! use gatehouse_registry::{NewMember, Registry};
//! use gatehouse_storage::MemoryBackend;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::new(MemoryBackend::new());
//!
//! let key = registry.mint_key().await?;
//! let member = NewMember {
//!     username: "alice".into(),
//!     password_hash: "$argon2id$...".into(),
//!     email: Some("alice@example.com".into()),
//!     mobile: None,
//! };
//! let user = registry.register(member, &key.token).await?;
//! assert_eq!(user.username, "alice");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod keys;
pub mod record;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use record::{
    AcceptanceKey, Announcement, KeyEntry, MemberSummary, NewMember, Redeemer, Role, User,
};
pub use registry::Registry;
