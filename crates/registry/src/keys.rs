//! Storage key layout.
//!
//! All records live in a single logical keyspace with `/`-separated
//! prefixes:
//!
//! | Key | Value |
//! |-----|-------|
//! | `users/{id:020}` | [`User`](crate::User) JSON |
//! | `usernames/{username}` | user id as decimal bytes |
//! | `keys/{id:020}` | [`AcceptanceKey`](crate::AcceptanceKey) JSON |
//! | `key-tokens/{token}` | key id as decimal bytes |
//! | `messages/{id:020}` | [`Announcement`](crate::Announcement) JSON |
//!
//! Record ids are zero-padded to 20 digits so that lexicographic key order
//! matches numeric id order within each prefix. The `usernames/` and
//! `key-tokens/` entries are uniqueness indexes: registration and key
//! minting claim them with insert-if-absent writes.

use std::ops::Range;

use gatehouse_storage::{KeyId, MessageId, UserId};

/// Prefix for user records.
pub const USER_PREFIX: &str = "users/";
/// Prefix for the username uniqueness index.
pub const USERNAME_PREFIX: &str = "usernames/";
/// Prefix for acceptance-key records.
pub const KEY_PREFIX: &str = "keys/";
/// Prefix for the key-token uniqueness index.
pub const KEY_TOKEN_PREFIX: &str = "key-tokens/";
/// Prefix for announcement records.
pub const MESSAGE_PREFIX: &str = "messages/";

/// Storage key of a user record.
#[must_use]
pub fn user_key(id: UserId) -> Vec<u8> {
    format!("{USER_PREFIX}{:020}", id.0).into_bytes()
}

/// Storage key of the username index entry for `username`.
#[must_use]
pub fn username_key(username: &str) -> Vec<u8> {
    format!("{USERNAME_PREFIX}{username}").into_bytes()
}

/// Storage key of an acceptance-key record.
#[must_use]
pub fn acceptance_key_key(id: KeyId) -> Vec<u8> {
    format!("{KEY_PREFIX}{:020}", id.0).into_bytes()
}

/// Storage key of the token index entry for `token`.
#[must_use]
pub fn key_token_key(token: &str) -> Vec<u8> {
    format!("{KEY_TOKEN_PREFIX}{token}").into_bytes()
}

/// Storage key of an announcement record.
#[must_use]
pub fn message_key(id: MessageId) -> Vec<u8> {
    format!("{MESSAGE_PREFIX}{:020}", id.0).into_bytes()
}

/// Range covering every key under `prefix`.
///
/// The end bound is the prefix with its final byte incremented, which is the
/// smallest key greater than every key that starts with the prefix. The
/// prefixes in this module all end in `/` (0x2F), so incrementing never
/// overflows.
#[must_use]
pub fn prefix_range(prefix: &str) -> Range<Vec<u8>> {
    let start = prefix.as_bytes().to_vec();
    let mut end = start.clone();
    if let Some(last) = end.last_mut() {
        *last += 1;
    }
    start..end
}
