//! Registration race tests.
//!
//! Pins the core one-time-key contract under concurrency: N simultaneous
//! registration attempts against a single acceptance key must produce
//! exactly one success, and the losers must observe `InvalidKey` (or, when
//! racing on a username instead, `UsernameTaken` with the losing key left
//! unused). Runs against both the memory and SQLite backends.

#![allow(clippy::expect_used, clippy::panic)]

use gatehouse_registry::{NewMember, Registry, RegistryError};
use gatehouse_storage::{Backend, SqliteBackend, StorageBackend};
use tokio::task::JoinSet;

fn member(username: &str) -> NewMember {
    NewMember {
        username: username.to_string(),
        password_hash: format!("$argon2id$hash-for-{username}"),
        email: None,
        mobile: None,
    }
}

async fn one_key_one_winner<B: StorageBackend + Clone + Send + Sync + 'static>(backend: B) {
    const ATTEMPTS: usize = 8;

    let registry = Registry::new(backend);
    let key = registry.mint_key().await.expect("mint");

    let mut set = JoinSet::new();
    for i in 0..ATTEMPTS {
        let registry = registry.clone();
        let token = key.token.clone();
        set.spawn(async move { registry.register(member(&format!("user-{i}")), &token).await });
    }

    let mut successes = 0;
    let mut invalid_key = 0;
    while let Some(result) = set.join_next().await {
        match result.expect("task should not panic") {
            Ok(_) => successes += 1,
            Err(RegistryError::InvalidKey) => invalid_key += 1,
            Err(other) => panic!("unexpected error in key race: {other:?}"),
        }
    }

    assert_eq!(successes, 1, "exactly one registration may redeem a key");
    assert_eq!(invalid_key, ATTEMPTS - 1, "every loser must see InvalidKey");

    // The winning registration is fully linked: key used, redeemer joined
    let entries = registry.list_keys().await.expect("list_keys");
    assert_eq!(entries.len(), 1);
    assert!(entries[0].used);
    assert!(entries[0].redeemed_by.is_some());
}

#[tokio::test]
async fn one_key_one_winner_memory() {
    one_key_one_winner(Backend::memory()).await;
}

#[tokio::test]
async fn one_key_one_winner_sqlite() {
    one_key_one_winner(SqliteBackend::open_in_memory().expect("open sqlite")).await;
}

/// Two simultaneous registrations with distinct fresh keys but the same
/// username: one wins, the other fails `UsernameTaken` and its key must
/// remain unused.
#[tokio::test]
async fn same_username_race_leaves_losing_key_unused() {
    let registry = Registry::new(Backend::memory());

    let key_a = registry.mint_key().await.expect("mint a");
    let key_b = registry.mint_key().await.expect("mint b");

    let mut set = JoinSet::new();
    for token in [key_a.token.clone(), key_b.token.clone()] {
        let registry = registry.clone();
        set.spawn(async move { registry.register(member("alice"), &token).await });
    }

    let mut successes = 0;
    let mut username_taken = 0;
    while let Some(result) = set.join_next().await {
        match result.expect("task should not panic") {
            Ok(_) => successes += 1,
            Err(RegistryError::UsernameTaken) => username_taken += 1,
            Err(other) => panic!("unexpected error in username race: {other:?}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(username_taken, 1);

    // Exactly one of the two keys was consumed; the loser's key rolled back
    let entries = registry.list_keys().await.expect("list_keys");
    let used: Vec<_> = entries.iter().filter(|e| e.used).collect();
    assert_eq!(used.len(), 1, "exactly one key may be consumed");

    let unused = entries.iter().find(|e| !e.used).expect("one key must stay unused");
    registry
        .register(member("bob"), unused.token.as_str())
        .await
        .expect("rolled-back key must remain redeemable");
}

/// Sequential re-registration of a used key fails no matter how much later
/// it happens.
#[tokio::test]
async fn used_key_stays_used() {
    let registry = Registry::new(Backend::memory());

    let key = registry.mint_key().await.expect("mint");
    registry.register(member("alice"), &key.token).await.expect("first registration");

    for attempt in 0..3 {
        let result = registry.register(member(&format!("late-{attempt}")), &key.token).await;
        assert!(
            matches!(result, Err(RegistryError::InvalidKey)),
            "used key must never be redeemable again"
        );
    }
}
