//! HTTP service for the gatehouse membership-gated community.
//!
//! This crate hosts the auth service (credential verification, bearer
//! tokens, ban and role checks) and the HTTP/JSON boundary that exposes the
//! registry operations:
//!
//! | Operation | Method/Path | Auth |
//! |---|---|---|
//! | authenticate | `POST /api/login` | none |
//! | register | `POST /api/signup` | none |
//! | request key | `POST /api/request-key` | none |
//! | list keys | `GET /api/admin/keys` | bearer + admin |
//! | list users | `GET /api/admin/users` | bearer + admin |
//! | set ban flag | `POST /api/admin/ban` | bearer + admin |
//! | post announcement | `POST /api/admin/updates` | bearer + admin |
//! | list announcements | `GET /api/updates` | none |
//!
//! Error responses carry a JSON body of the form `{"error": "<message>"}`.

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod password;
pub mod routes;
pub mod shutdown;

use gatehouse_registry::Registry;
use gatehouse_storage::Backend;

pub use auth::{AuthService, Claims, Session};
pub use config::{Config, ConfigError};
pub use error::{ApiError, AuthError};
pub use routes::router;

/// Shared application state threaded through axum handlers.
///
/// Both fields are cheap to clone; all clones share the same backend.
#[derive(Clone)]
pub struct AppState {
    /// Repository over members, keys, and announcements.
    pub registry: Registry<Backend>,
    /// Token issuing and verification service.
    pub auth: AuthService<Backend>,
}
