//! The repository over members, acceptance keys, and announcements.

use bytes::Bytes;
use chrono::Utc;
use gatehouse_storage::{KeyId, MessageId, StorageBackend, StorageError, UserId};
use rand::Rng;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::{RegistryError, RegistryResult},
    keys::{
        KEY_PREFIX, MESSAGE_PREFIX, USER_PREFIX, acceptance_key_key, key_token_key, message_key,
        prefix_range, user_key, username_key,
    },
    record::{
        AcceptanceKey, Announcement, KeyEntry, MemberSummary, NewMember, Redeemer, Role, User,
    },
};

/// Alphabet used for acceptance-key tokens.
const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of acceptance-key tokens. Eight characters over a 36-symbol
/// alphabet is ~41 bits of entropy.
pub const TOKEN_LEN: usize = 8;

/// Attempts to mint a key before giving up on token/id collisions.
const MAX_MINT_ATTEMPTS: usize = 4;

fn random_id() -> i64 {
    rand::thread_rng().gen_range(1..i64::MAX)
}

fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

fn encode_record<T: Serialize>(value: &T) -> RegistryResult<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| StorageError::serialization_with_source("failed to encode record", e).into())
}

fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> RegistryResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        StorageError::serialization_with_source("failed to decode stored record", e).into()
    })
}

fn decode_id(bytes: &[u8]) -> RegistryResult<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| StorageError::serialization("malformed id index entry").into())
}

/// Repository over the three record families.
///
/// `Registry` is a thin, cheaply cloneable handle; clones share the
/// underlying backend. All invariants (username uniqueness, one-time key
/// redemption) are enforced through storage transactions, so concurrent
/// registries — including ones in other processes sharing a durable backend
/// — cannot violate them.
#[derive(Clone)]
pub struct Registry<B> {
    backend: B,
}

impl<B: StorageBackend> Registry<B> {
    /// Creates a registry over the given backend.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns a reference to the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ── members ─────────────────────────────────────────────────────

    /// Fetches a user by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_user(&self, id: UserId) -> RegistryResult<Option<User>> {
        Ok(self.load_user_raw(id).await?.map(|(user, _)| user))
    }

    /// Fetches a user by exact, case-sensitive username.
    #[tracing::instrument(skip(self))]
    pub async fn find_user_by_username(&self, username: &str) -> RegistryResult<Option<User>> {
        let Some(id_bytes) = self.backend.get(&username_key(username)).await? else {
            return Ok(None);
        };
        let id = UserId(decode_id(&id_bytes)?);
        self.get_user(id).await
    }

    /// Idempotently seeds the administrator account.
    ///
    /// Returns the existing account if the username is already registered
    /// (regardless of role); otherwise creates it with [`Role::Admin`] and
    /// no redeemed key.
    #[tracing::instrument(skip(self, password_hash))]
    pub async fn ensure_admin(&self, username: &str, password_hash: &str) -> RegistryResult<User> {
        if let Some(existing) = self.find_user_by_username(username).await? {
            return Ok(existing);
        }

        let user = User {
            id: UserId(random_id()),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role: Role::Admin,
            banned: false,
            email: None,
            mobile: None,
            redeemed_key: None,
            created_at: Utc::now(),
        };

        let mut txn = self.backend.transaction().await?;
        txn.compare_and_set(username_key(username), None, user.id.to_string().into_bytes())?;
        txn.compare_and_set(user_key(user.id), None, encode_record(&user)?)?;

        match txn.commit().await {
            Ok(()) => {
                tracing::info!(username, "seeded admin account");
                Ok(user)
            },
            Err(StorageError::Conflict) => {
                // A concurrent seeder won; the stored account is canonical.
                self.find_user_by_username(username)
                    .await?
                    .ok_or_else(|| StorageError::Conflict.into())
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Lists all non-admin accounts, oldest first.
    ///
    /// Admin accounts are excluded from the listing entirely.
    #[tracing::instrument(skip(self))]
    pub async fn list_members(&self) -> RegistryResult<Vec<MemberSummary>> {
        let rows = self.backend.get_range(prefix_range(USER_PREFIX)).await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            let user: User = decode_record(&row.value)?;
            if !user.role.is_admin() {
                users.push(user);
            }
        }
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(users
            .into_iter()
            .map(|u| MemberSummary {
                id: u.id,
                username: u.username,
                email: u.email,
                banned: u.banned,
            })
            .collect())
    }

    /// Sets the banned flag on a user.
    ///
    /// Idempotent: setting the flag to its current value is a no-op
    /// success. Fails with [`RegistryError::NotFound`] if the user does not
    /// exist. Banning does not invalidate bearer tokens that were issued
    /// before the ban.
    #[tracing::instrument(skip(self))]
    pub async fn set_banned(&self, id: UserId, banned: bool) -> RegistryResult<()> {
        let Some((mut user, _raw)) = self.load_user_raw(id).await? else {
            return Err(RegistryError::NotFound { id });
        };

        if user.banned == banned {
            return Ok(());
        }

        user.banned = banned;
        self.backend.set(user_key(id), encode_record(&user)?).await?;
        tracing::info!(user = %id, banned, "updated ban flag");
        Ok(())
    }

    // ── acceptance keys ─────────────────────────────────────────────

    /// Mints a new unused acceptance key with a fresh random token.
    ///
    /// The record and its token index entry are inserted in one transaction
    /// with insert-if-absent semantics; a token or id collision (vanishingly
    /// unlikely) regenerates and retries a bounded number of times.
    #[tracing::instrument(skip(self))]
    pub async fn mint_key(&self) -> RegistryResult<AcceptanceKey> {
        for _attempt in 0..MAX_MINT_ATTEMPTS {
            let key = AcceptanceKey {
                id: KeyId(random_id()),
                token: random_token(),
                used: false,
                redeemed_by: None,
                created_at: Utc::now(),
            };

            let mut txn = self.backend.transaction().await?;
            txn.compare_and_set(key_token_key(&key.token), None, key.id.to_string().into_bytes())?;
            txn.compare_and_set(acceptance_key_key(key.id), None, encode_record(&key)?)?;

            match txn.commit().await {
                Ok(()) => return Ok(key),
                Err(StorageError::Conflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(StorageError::internal("failed to mint a unique acceptance key").into())
    }

    /// Lists all acceptance keys, newest first, each augmented with the
    /// member that redeemed it (left-join semantics: unredeemed keys carry
    /// no redeemer).
    #[tracing::instrument(skip(self))]
    pub async fn list_keys(&self) -> RegistryResult<Vec<KeyEntry>> {
        let rows = self.backend.get_range(prefix_range(KEY_PREFIX)).await?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            keys.push(decode_record::<AcceptanceKey>(&row.value)?);
        }
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let redeemed_by = match key.redeemed_by {
                Some(user_id) => self
                    .get_user(user_id)
                    .await?
                    .map(|u| Redeemer { username: u.username, email: u.email }),
                None => None,
            };
            entries.push(KeyEntry {
                id: key.id,
                token: key.token,
                used: key.used,
                created_at: key.created_at,
                redeemed_by,
            });
        }
        Ok(entries)
    }

    // ── registration ────────────────────────────────────────────────

    /// Registers a new member by redeeming an acceptance key.
    ///
    /// The redemption is a single storage transaction: the key record is
    /// compare-and-set from the exact bytes that were read (used=false) to
    /// the redeemed record, the `usernames/` index entry is claimed
    /// insert-if-absent, and the user record is inserted. A commit-time
    /// conflict applies nothing — in particular the key stays unused — and
    /// is classified by re-reading the state:
    ///
    /// - username now present → [`RegistryError::UsernameTaken`]
    /// - key now used → [`RegistryError::InvalidKey`]
    ///
    /// # Errors
    ///
    /// - [`RegistryError::MissingKey`] if `token` is empty
    /// - [`RegistryError::InvalidKey`] if no unused key matches `token` (nonexistent and
    ///   already-used keys are indistinguishable to the caller)
    /// - [`RegistryError::UsernameTaken`] if the username is already registered
    /// - [`RegistryError::Storage`] for any other persistence failure
    #[tracing::instrument(skip(self, member), fields(username = %member.username))]
    pub async fn register(&self, member: NewMember, token: &str) -> RegistryResult<User> {
        if token.is_empty() {
            return Err(RegistryError::MissingKey);
        }

        let Some(key_id) = self.lookup_key_id(token).await? else {
            return Err(RegistryError::InvalidKey);
        };
        let Some((key, key_raw)) = self.load_key_raw(key_id).await? else {
            return Err(StorageError::internal(format!(
                "dangling key-token index entry for key {key_id}"
            ))
            .into());
        };
        if key.used {
            return Err(RegistryError::InvalidKey);
        }

        // Fast-path check; the authoritative uniqueness guard is the
        // insert-if-absent write below.
        if self.find_user_by_username(&member.username).await?.is_some() {
            return Err(RegistryError::UsernameTaken);
        }

        let user = User {
            id: UserId(random_id()),
            username: member.username,
            password_hash: member.password_hash,
            role: Role::User,
            banned: false,
            email: member.email,
            mobile: member.mobile,
            redeemed_key: Some(key.id),
            created_at: Utc::now(),
        };
        let redeemed = AcceptanceKey { used: true, redeemed_by: Some(user.id), ..key };

        let mut txn = self.backend.transaction().await?;
        txn.compare_and_set(
            acceptance_key_key(redeemed.id),
            Some(key_raw.to_vec()),
            encode_record(&redeemed)?,
        )?;
        txn.compare_and_set(username_key(&user.username), None, user.id.to_string().into_bytes())?;
        txn.compare_and_set(user_key(user.id), None, encode_record(&user)?)?;

        match txn.commit().await {
            Ok(()) => {
                tracing::info!(user = %user.id, username = %user.username, "registered member");
                Ok(user)
            },
            Err(StorageError::Conflict) => {
                Err(self.classify_registration_conflict(&user.username, redeemed.id).await?)
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Decides which precondition lost a registration race. The rejected
    /// transaction applied nothing, so the current state names the winner.
    async fn classify_registration_conflict(
        &self,
        username: &str,
        key_id: KeyId,
    ) -> RegistryResult<RegistryError> {
        if self.find_user_by_username(username).await?.is_some() {
            return Ok(RegistryError::UsernameTaken);
        }
        match self.load_key_raw(key_id).await? {
            Some((key, _)) if key.used => Ok(RegistryError::InvalidKey),
            _ => Ok(RegistryError::Storage(StorageError::Conflict)),
        }
    }

    // ── announcements ───────────────────────────────────────────────

    /// Posts a new announcement.
    ///
    /// Content is trimmed; blank content fails with
    /// [`RegistryError::EmptyContent`]. Announcements are immutable once
    /// posted.
    #[tracing::instrument(skip(self, content))]
    pub async fn post_announcement(&self, content: &str) -> RegistryResult<Announcement> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(RegistryError::EmptyContent);
        }

        for _attempt in 0..MAX_MINT_ATTEMPTS {
            let announcement = Announcement {
                id: MessageId(random_id()),
                content: trimmed.to_string(),
                created_at: Utc::now(),
            };

            match self
                .backend
                .compare_and_set(&message_key(announcement.id), None, encode_record(&announcement)?)
                .await
            {
                Ok(()) => return Ok(announcement),
                Err(StorageError::Conflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(StorageError::internal("failed to allocate an announcement id").into())
    }

    /// Lists all announcements, newest first.
    ///
    /// The returned order is strictly non-increasing in creation time.
    #[tracing::instrument(skip(self))]
    pub async fn list_announcements(&self) -> RegistryResult<Vec<Announcement>> {
        let rows = self.backend.get_range(prefix_range(MESSAGE_PREFIX)).await?;

        let mut announcements = Vec::with_capacity(rows.len());
        for row in rows {
            announcements.push(decode_record::<Announcement>(&row.value)?);
        }
        announcements.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(announcements)
    }

    // ── internal ────────────────────────────────────────────────────

    async fn load_user_raw(&self, id: UserId) -> RegistryResult<Option<(User, Bytes)>> {
        let Some(raw) = self.backend.get(&user_key(id)).await? else {
            return Ok(None);
        };
        let user = decode_record(&raw)?;
        Ok(Some((user, raw)))
    }

    async fn lookup_key_id(&self, token: &str) -> RegistryResult<Option<KeyId>> {
        let Some(id_bytes) = self.backend.get(&key_token_key(token)).await? else {
            return Ok(None);
        };
        Ok(Some(KeyId(decode_id(&id_bytes)?)))
    }

    async fn load_key_raw(&self, id: KeyId) -> RegistryResult<Option<(AcceptanceKey, Bytes)>> {
        let Some(raw) = self.backend.get(&acceptance_key_key(id)).await? else {
            return Ok(None);
        };
        let key = decode_record(&raw)?;
        Ok(Some((key, raw)))
    }
}
