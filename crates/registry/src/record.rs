//! Domain records and read models.
//!
//! All persisted records are serialized as JSON. Struct fields serialize in
//! declaration order, which keeps the byte representation deterministic —
//! the registration transaction relies on this when it compare-and-sets a
//! key record against the exact bytes it read.

use chrono::{DateTime, Utc};
use gatehouse_storage::{KeyId, MessageId, UserId};
use serde::{Deserialize, Serialize};

/// Account role.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular member.
    User,
    /// Administrator.
    Admin,
}

impl Role {
    /// Returns true for [`Role::Admin`].
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// A registered account.
///
/// The password is stored only as an irreversible salted hash (argon2id PHC
/// string); the plaintext never reaches this layer. `redeemed_key` links to
/// the acceptance key consumed at registration and is `None` only for the
/// seeded admin account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Account identifier.
    pub id: UserId,
    /// Unique, case-sensitive username. No normalization is applied.
    pub username: String,
    /// Salted password hash (PHC string format).
    pub password_hash: String,
    /// Account role.
    pub role: Role,
    /// Whether the account is banned from authenticating.
    pub banned: bool,
    /// Optional contact email.
    pub email: Option<String>,
    /// Optional contact mobile number.
    pub mobile: Option<String>,
    /// The acceptance key redeemed at registration, if any.
    pub redeemed_key: Option<KeyId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A one-time acceptance key.
///
/// `used` transitions false → true exactly once, atomically with the
/// creation of the member recorded in `redeemed_by`, and never reverts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceKey {
    /// Key identifier.
    pub id: KeyId,
    /// The random token value handed out to the prospective member.
    pub token: String,
    /// Whether the key has been redeemed.
    pub used: bool,
    /// The member that redeemed this key, if any.
    pub redeemed_by: Option<UserId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// An admin-authored announcement. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    /// Announcement identifier.
    pub id: MessageId,
    /// Free-text content. The author is implicitly the admin.
    pub content: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Input for registering a new member.
///
/// The password arrives here already hashed; hashing is the auth layer's
/// concern.
#[derive(Clone, Debug)]
pub struct NewMember {
    /// Requested username.
    pub username: String,
    /// Salted password hash (PHC string format).
    pub password_hash: String,
    /// Optional contact email.
    pub email: Option<String>,
    /// Optional contact mobile number.
    pub mobile: Option<String>,
}

/// Read model for the admin user listing. Excludes the password hash and
/// admin accounts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberSummary {
    /// Account identifier.
    pub id: UserId,
    /// Username.
    pub username: String,
    /// Contact email, if provided at registration.
    pub email: Option<String>,
    /// Whether the account is banned.
    pub banned: bool,
}

/// The member that redeemed a key, as shown in the admin key listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Redeemer {
    /// Username of the redeeming member.
    pub username: String,
    /// Contact email of the redeeming member, if any.
    pub email: Option<String>,
}

/// Read model for the admin key listing: the key plus the member that
/// redeemed it (left-join semantics — `redeemed_by` is `None` for unredeemed
/// keys).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// Key identifier.
    pub id: KeyId,
    /// The token value (this listing is how an admin retrieves it).
    pub token: String,
    /// Whether the key has been redeemed.
    pub used: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// The redeeming member, if the key has been used.
    pub redeemed_by: Option<Redeemer>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), r#""admin""#);
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);

        let role: Role = serde_json::from_str(r#""admin""#).unwrap();
        assert!(role.is_admin());
    }

    #[test]
    fn test_user_serialization_is_deterministic() {
        let user = User {
            id: UserId(1),
            username: "alice".into(),
            password_hash: "$argon2id$fake".into(),
            role: Role::User,
            banned: false,
            email: None,
            mobile: None,
            redeemed_key: Some(KeyId(2)),
            created_at: "2025-01-01T00:00:00Z".parse().unwrap(),
        };

        let a = serde_json::to_vec(&user).unwrap();
        let b = serde_json::to_vec(&user).unwrap();
        assert_eq!(a, b);

        let round: User = serde_json::from_slice(&a).unwrap();
        assert_eq!(round, user);
    }

    #[test]
    fn test_key_round_trip() {
        let key = AcceptanceKey {
            id: KeyId(9),
            token: "ZK41Q7PM".into(),
            used: false,
            redeemed_by: None,
            created_at: Utc::now(),
        };

        let bytes = serde_json::to_vec(&key).unwrap();
        let round: AcceptanceKey = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(round, key);
    }
}
