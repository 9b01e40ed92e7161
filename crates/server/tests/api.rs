//! End-to-end API tests.
//!
//! Drives the full router over an in-memory backend with a seeded admin
//! account, covering the login, signup, key-request, admin, and
//! announcement flows — including the edge cases the service deliberately
//! commits to (tokens outlive bans; the key-request response never carries
//! the generated value).

#![allow(clippy::expect_used, clippy::panic)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use gatehouse_registry::Registry;
use gatehouse_server::{AppState, AuthService, Config, password, router};
use gatehouse_storage::Backend;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "Admin@000";

async fn setup() -> (Router, Registry<Backend>) {
    let config = Config::for_test();
    let registry = Registry::new(Backend::memory());

    let admin_hash = password::hash(&config.admin.password).expect("hash admin password");
    registry.ensure_admin(&config.admin.username, &admin_hash).await.expect("seed admin");

    let auth =
        AuthService::new(registry.clone(), &config.token_secret, config.token_validity_secs);
    let app = router(AppState { registry: registry.clone(), auth });
    (app, registry)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn login(app: &Router, username: &str, pw: &str) -> (StatusCode, Value) {
    send(app, "POST", "/api/login", None, Some(json!({ "username": username, "password": pw })))
        .await
}

async fn admin_token(app: &Router) -> String {
    let (status, body) = login(app, "admin", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
    body["token"].as_str().expect("token").to_string()
}

/// Requests a key, then retrieves its value the way an admin would: via the
/// key listing. The request-key response itself never carries the value.
async fn obtain_key(app: &Router, admin: &str) -> String {
    let (status, _body) = send(app, "POST", "/api/request-key", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, keys) = send(app, "GET", "/api/admin/keys", Some(admin), None).await;
    assert_eq!(status, StatusCode::OK);
    keys.as_array()
        .expect("key list")
        .iter()
        .find(|k| !k["used"].as_bool().expect("used flag"))
        .expect("an unused key")["token"]
        .as_str()
        .expect("token value")
        .to_string()
}

async fn signup(app: &Router, username: &str, pw: &str, key: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/signup",
        None,
        Some(json!({
            "username": username,
            "password": pw,
            "email": format!("{username}@example.com"),
            "acceptanceKey": key,
        })),
    )
    .await
}

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn root_and_healthz() {
    let (app, _registry) = setup().await;

    let (status, body) = send(&app, "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("gatehouse is running".into()));

    let (status, _body) = send(&app, "GET", "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn seeded_admin_can_log_in() {
    let (app, _registry) = setup().await;

    let (status, body) = login(&app, "admin", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
    assert_eq!(body["username"], "admin");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn wrong_password_and_unknown_user_get_the_same_401() {
    let (app, _registry) = setup().await;

    let (status, body) = login(&app, "admin", "wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, body) = login(&app, "ghost", "whatever").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");
}

// ---------------------------------------------------------------------------
// Key request + signup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn request_key_response_never_contains_the_value() {
    let (app, _registry) = setup().await;

    let (status, body) = send(&app, "POST", "/api/request-key", None, None).await;
    assert_eq!(status, StatusCode::OK);

    // The acknowledgement carries a message and nothing else
    let object = body.as_object().expect("json object");
    assert_eq!(object.len(), 1);
    assert!(object.contains_key("message"));

    // The value is retrievable out-of-band through the admin listing
    let admin = admin_token(&app).await;
    let (status, keys) = send(&app, "GET", "/api/admin/keys", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let keys = keys.as_array().expect("key list");
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["used"], false);
    assert!(!keys[0]["token"].as_str().expect("token").is_empty());
}

#[tokio::test]
async fn signup_redeems_a_key_exactly_once() {
    let (app, _registry) = setup().await;
    let admin = admin_token(&app).await;

    let key = obtain_key(&app, &admin).await;

    let (status, _body) = signup(&app, "alice", "pw1", &key).await;
    assert_eq!(status, StatusCode::CREATED);

    // The key is now used, joined to its redeemer
    let (_, keys) = send(&app, "GET", "/api/admin/keys", Some(&admin), None).await;
    let entry = &keys.as_array().expect("keys")[0];
    assert_eq!(entry["used"], true);
    assert_eq!(entry["redeemed_by"]["username"], "alice");
    assert_eq!(entry["redeemed_by"]["email"], "alice@example.com");

    // Signup must not auto-login; the new member authenticates separately
    let (status, body) = login(&app, "alice", "pw1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");

    // Second redemption of the same key fails
    let (status, body) = signup(&app, "bob", "pw2", &key).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid or used acceptance key");
}

#[tokio::test]
async fn signup_without_a_key_is_rejected() {
    let (app, _registry) = setup().await;

    // Field absent entirely
    let (status, body) = send(
        &app,
        "POST",
        "/api/signup",
        None,
        Some(json!({ "username": "alice", "password": "pw1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Acceptance key is required");

    // Nonexistent key value
    let (status, body) = signup(&app, "alice", "pw1", "NOSUCHKY").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid or used acceptance key");
}

#[tokio::test]
async fn duplicate_username_rolls_the_second_key_back() {
    let (app, _registry) = setup().await;
    let admin = admin_token(&app).await;

    let first = obtain_key(&app, &admin).await;
    let (status, _) = signup(&app, "alice", "pw1", &first).await;
    assert_eq!(status, StatusCode::CREATED);

    let second = obtain_key(&app, &admin).await;
    let (status, body) = signup(&app, "alice", "pw2", &second).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username already exists");

    // The second key survived the rollback unused and still redeems
    let (status, _) = signup(&app, "carol", "pw3", &second).await;
    assert_eq!(status, StatusCode::CREATED);
}

// ---------------------------------------------------------------------------
// Admin: users + ban
// ---------------------------------------------------------------------------

#[tokio::test]
async fn user_listing_excludes_admins() {
    let (app, _registry) = setup().await;
    let admin = admin_token(&app).await;

    let key = obtain_key(&app, &admin).await;
    signup(&app, "alice", "pw1", &key).await;

    let (status, users) = send(&app, "GET", "/api/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let users = users.as_array().expect("users");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["username"], "alice");
    assert_eq!(users[0]["banned"], false);
    assert!(users[0].get("password_hash").is_none(), "hashes must never be listed");
}

#[tokio::test]
async fn ban_blocks_login_and_unban_restores_it() {
    let (app, _registry) = setup().await;
    let admin = admin_token(&app).await;

    let key = obtain_key(&app, &admin).await;
    signup(&app, "alice", "pw1", &key).await;

    let (_, users) = send(&app, "GET", "/api/admin/users", Some(&admin), None).await;
    let alice_id = users.as_array().expect("users")[0]["id"].as_i64().expect("id");

    // Ban — and again, idempotently
    for _ in 0..2 {
        let (status, _) = send(
            &app,
            "POST",
            "/api/admin/ban",
            Some(&admin),
            Some(json!({ "userId": alice_id, "banned": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = login(&app, "alice", "pw1").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Account has been banned");

    // Unban restores access
    let (status, _) = send(
        &app,
        "POST",
        "/api/admin/ban",
        Some(&admin),
        Some(json!({ "userId": alice_id, "banned": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = login(&app, "alice", "pw1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn banning_an_unknown_user_is_404() {
    let (app, _registry) = setup().await;
    let admin = admin_token(&app).await;

    let (status, _body) = send(
        &app,
        "POST",
        "/api/admin/ban",
        Some(&admin),
        Some(json!({ "userId": 123_456_789, "banned": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// Banning does not retroactively invalidate already-issued tokens: the
/// ban only gates future `authenticate` calls.
#[tokio::test]
async fn token_issued_before_ban_still_authorizes() {
    let (app, registry) = setup().await;
    let admin = admin_token(&app).await;

    let admin_id =
        registry.find_user_by_username("admin").await.expect("lookup").expect("admin").id;

    // The admin bans their own account
    let (status, _) = send(
        &app,
        "POST",
        "/api/admin/ban",
        Some(&admin),
        Some(json!({ "userId": i64::from(admin_id), "banned": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The outstanding token keeps working for its lifetime…
    let (status, _) = send(&app, "GET", "/api/admin/keys", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    // …but a fresh authentication is refused
    let (status, _) = login(&app, "admin", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Authorization matrix
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_surface_requires_a_valid_admin_token() {
    let (app, _registry) = setup().await;

    let key_body = || json!({ "userId": 1, "banned": true });
    let update_body = || json!({ "content": "hello" });

    // Build a valid non-admin token
    let admin = admin_token(&app).await;
    let key = obtain_key(&app, &admin).await;
    signup(&app, "alice", "pw1", &key).await;
    let (_, body) = login(&app, "alice", "pw1").await;
    let member_token = body["token"].as_str().expect("token").to_string();

    let cases: [(&str, &str, Option<Value>); 4] = [
        ("GET", "/api/admin/keys", None),
        ("GET", "/api/admin/users", None),
        ("POST", "/api/admin/ban", Some(key_body())),
        ("POST", "/api/admin/updates", Some(update_body())),
    ];

    for (method, uri, body) in cases {
        // No token at all → 401
        let (status, _) = send(&app, method, uri, None, body.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri} without token");

        // Garbage token → 403
        let (status, _) = send(&app, method, uri, Some("not.a.jwt"), body.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri} with garbage token");

        // Valid token, wrong role → 403
        let (status, resp) = send(&app, method, uri, Some(&member_token), body.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri} with member token");
        assert_eq!(resp["error"], "Admin access required");
    }
}

// ---------------------------------------------------------------------------
// Announcements
// ---------------------------------------------------------------------------

#[tokio::test]
async fn announcements_are_public_and_newest_first() {
    let (app, _registry) = setup().await;
    let admin = admin_token(&app).await;

    // Empty feed reads as an empty list, unauthenticated
    let (status, body) = send(&app, "GET", "/api/updates", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    for content in ["first post", "second post", "third post"] {
        let (status, _) = send(
            &app,
            "POST",
            "/api/admin/updates",
            Some(&admin),
            Some(json!({ "content": content })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, "GET", "/api/updates", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let items = body.as_array().expect("announcements");
    assert_eq!(items.len(), 3);
    let timestamps: Vec<chrono::DateTime<chrono::Utc>> = items
        .iter()
        .map(|a| a["created_at"].as_str().expect("created_at").parse().expect("timestamp"))
        .collect();
    for pair in timestamps.windows(2) {
        assert!(pair[0] >= pair[1], "announcements must be newest-first: {timestamps:?}");
    }
}

#[tokio::test]
async fn blank_announcements_are_rejected() {
    let (app, _registry) = setup().await;
    let admin = admin_token(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/admin/updates",
        Some(&admin),
        Some(json!({ "content": "   \n\t  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Announcement content must not be empty");
}
