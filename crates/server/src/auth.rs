//! Credential verification and bearer tokens.
//!
//! The auth service issues signed, time-limited HS256 bearer tokens binding
//! the account id, username, and role, and validates them on admin
//! requests. Tokens are stateless: there is no server-side session and no
//! revocation list, so a token issued before a ban stays valid until it
//! expires. The signing secret is explicit configuration
//! ([`Config::token_secret`](crate::Config)), never a compiled-in literal.

use chrono::Utc;
use gatehouse_registry::{Registry, Role, User};
use gatehouse_storage::{StorageBackend, UserId};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{error::AuthError, password};

/// Claims carried by a bearer token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Account identifier.
    pub id: UserId,
    /// Username at issue time.
    pub username: String,
    /// Role at issue time.
    pub role: Role,
    /// Expiration (seconds since epoch).
    pub exp: u64,
    /// Issued at (seconds since epoch).
    pub iat: u64,
}

impl Claims {
    /// Requires the admin role, failing with [`AuthError::Forbidden`]
    /// otherwise.
    pub fn require_admin(&self) -> Result<(), AuthError> {
        if self.role.is_admin() { Ok(()) } else { Err(AuthError::Forbidden) }
    }
}

/// A successful authentication: the token plus role/username for client
/// bookkeeping.
#[derive(Clone, Debug, Serialize)]
pub struct Session {
    /// The signed bearer token.
    pub token: String,
    /// Role of the authenticated account.
    pub role: Role,
    /// Username of the authenticated account.
    pub username: String,
}

/// Credential verification and token issuing/validation.
#[derive(Clone)]
pub struct AuthService<B> {
    registry: Registry<B>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validity_secs: u64,
}

impl<B: StorageBackend> AuthService<B> {
    /// Creates an auth service signing with the given secret.
    ///
    /// `validity_secs` bounds token lifetime (the service default is one
    /// hour).
    #[must_use]
    pub fn new(registry: Registry<B>, token_secret: &str, validity_secs: u64) -> Self {
        Self {
            registry,
            encoding: EncodingKey::from_secret(token_secret.as_bytes()),
            decoding: DecodingKey::from_secret(token_secret.as_bytes()),
            validity_secs,
        }
    }

    /// Verifies credentials and issues a bearer token.
    ///
    /// The ban check runs before the password comparison, and an unknown
    /// username produces the same [`AuthError::InvalidCredentials`] as a
    /// wrong password.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let Some(user) = self.registry.find_user_by_username(username).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if user.banned {
            tracing::info!(username, "rejected login for banned account");
            return Err(AuthError::AccountBanned);
        }

        if !password::verify(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.issue_token(&user)?;
        tracing::debug!(username, role = %user.role, "issued token");
        Ok(Session { token, role: user.role, username: user.username })
    }

    /// Signs a token for the given account.
    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now().timestamp() as u64;
        let claims = Claims {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            exp: now + self.validity_secs,
            iat: now,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::TokenIssue)
    }

    /// Validates a token's signature and expiry and returns its claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    /// Authorizes a request from its `Authorization` header value.
    ///
    /// Fails with [`AuthError::Unauthenticated`] when no bearer token is
    /// presented and [`AuthError::InvalidToken`] when the presented token
    /// does not verify. Role enforcement is the caller's concern (see
    /// [`Claims::require_admin`]).
    pub fn authorize(&self, authorization: Option<&str>) -> Result<Claims, AuthError> {
        let Some(header) = authorization else {
            return Err(AuthError::Unauthenticated);
        };
        let Some(token) = header.strip_prefix("Bearer ") else {
            return Err(AuthError::Unauthenticated);
        };
        self.verify_token(token)
    }
}
