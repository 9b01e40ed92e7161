//! HTTP handlers and router assembly.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use gatehouse_registry::{Announcement, KeyEntry, MemberSummary, NewMember};
use gatehouse_storage::{StorageBackend, UserId};
use serde::{Deserialize, Serialize};

use crate::{AppState, Claims, Session, error::ApiError, password};

/// Builds the service router over the shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/api/login", post(login))
        .route("/api/signup", post(signup))
        .route("/api/request-key", post(request_key))
        .route("/api/admin/keys", get(admin_keys))
        .route("/api/admin/users", get(admin_users))
        .route("/api/admin/ban", post(admin_ban))
        .route("/api/admin/updates", post(admin_post_update))
        .route("/api/updates", get(updates))
        .with_state(state)
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
struct Ack {
    message: String,
}

impl Ack {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self { message: message.into() })
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::AUTHORIZATION)?.to_str().ok()
}

/// Authorizes an admin request from its headers.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
    let claims = state.auth.authorize(bearer(headers))?;
    claims.require_admin()?;
    Ok(claims)
}

async fn root() -> &'static str {
    "gatehouse is running"
}

async fn healthz(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    state
        .registry
        .backend()
        .health_check()
        .await
        .map_err(gatehouse_registry::RegistryError::Storage)?;
    Ok("ok")
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = state.auth.authenticate(&req.username, &req.password).await?;
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    username: String,
    password: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    mobile: Option<String>,
    /// Absent and empty are equivalent: both fail with `MissingKey`.
    #[serde(default)]
    acceptance_key: String,
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    let member = NewMember {
        username: req.username,
        password_hash: password::hash(&req.password)?,
        email: req.email,
        mobile: req.mobile,
    };

    state.registry.register(member, &req.acceptance_key).await?;
    Ok((StatusCode::CREATED, Ack::new("User registered successfully")))
}

async fn request_key(State(state): State<AppState>) -> Result<Json<Ack>, ApiError> {
    // The generated value is deliberately not returned: an admin hands it
    // out after reading it from the key listing.
    state.registry.mint_key().await?;
    Ok(Ack::new("Key generated. Please contact admin to retrieve it."))
}

async fn admin_keys(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<KeyEntry>>, ApiError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.registry.list_keys().await?))
}

async fn admin_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MemberSummary>>, ApiError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.registry.list_members().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BanRequest {
    user_id: i64,
    banned: bool,
}

async fn admin_ban(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BanRequest>,
) -> Result<Json<Ack>, ApiError> {
    let claims = require_admin(&state, &headers)?;

    state.registry.set_banned(UserId(req.user_id), req.banned).await?;
    tracing::info!(admin = %claims.username, user = req.user_id, banned = req.banned, "ban flag set");

    let action = if req.banned { "banned" } else { "unbanned" };
    Ok(Ack::new(format!("User {action} successfully")))
}

#[derive(Debug, Deserialize)]
struct UpdateRequest {
    content: String,
}

async fn admin_post_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<Ack>, ApiError> {
    require_admin(&state, &headers)?;

    state.registry.post_announcement(&req.content).await?;
    Ok(Ack::new("Update posted successfully"))
}

async fn updates(State(state): State<AppState>) -> Result<Json<Vec<Announcement>>, ApiError> {
    Ok(Json(state.registry.list_announcements().await?))
}
