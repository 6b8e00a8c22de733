//! Store-level tests for the quantity ledger and session lifecycle,
//! exercising the repositories below the HTTP layer.

use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use std::collections::HashMap;
use stockd::config::SecurityConfig;
use stockd::db::{Role, Store};
use stockd::entities::{products, sessions, users};
use stockd::error::CoreError;

async fn mem_store() -> Store {
    let security = SecurityConfig {
        argon2_memory_cost_kib: 64,
        argon2_time_cost: 1,
        ..SecurityConfig::default()
    };

    Store::with_pool_options("sqlite::memory:", security, 1, 1)
        .await
        .expect("Failed to open in-memory store")
}

#[tokio::test]
async fn migrations_create_every_referenced_table() {
    let store = mem_store().await;

    let backend = store.conn.get_database_backend();
    let rows = store
        .conn
        .query_all(Statement::from_string(
            backend,
            "SELECT name, sql FROM sqlite_master WHERE type = 'table'".to_string(),
        ))
        .await
        .unwrap();

    let mut ddl: HashMap<String, String> = HashMap::new();
    for row in &rows {
        let name: String = row.try_get("", "name").unwrap();
        let sql: String = row.try_get("", "sql").unwrap();
        ddl.insert(name, sql);
    }

    for table in ["users", "sessions", "products", "quantity_history"] {
        assert!(ddl.contains_key(table), "missing table {table}");
    }

    // Engines that enforce REFERENCES at DDL time (postgres) need every
    // foreign-key target to exist before the referencing table is
    // created, so the migration order itself is part of the contract.
    let history_ddl = &ddl["quantity_history"];
    for target in ["products", "users"] {
        assert!(
            history_ddl.contains(&format!("REFERENCES \"{target}\"")),
            "quantity_history should reference {target}"
        );
    }
    let sessions_ddl = &ddl["sessions"];
    assert!(sessions_ddl.contains("REFERENCES \"users\""));
}

#[tokio::test]
async fn file_backed_store_creates_missing_database_file() {
    let path = std::env::temp_dir().join(format!("stockd-ledger-test-{}.db", std::process::id()));
    let _ = tokio::fs::remove_file(&path).await;

    let security = SecurityConfig {
        argon2_memory_cost_kib: 64,
        argon2_time_cost: 1,
        ..SecurityConfig::default()
    };
    let url = format!("sqlite:{}", path.display());
    let store = Store::with_pool_options(&url, security, 1, 1)
        .await
        .expect("Failed to open file-backed store");

    assert!(path.exists());

    let id = store.add_product("Persisted", None, 4, 0, None).await.unwrap();
    assert!(store.get_product(id).await.unwrap().is_some());

    drop(store);
    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn creation_writes_initial_history_entry() {
    let store = mem_store().await;

    let id = store
        .add_product("Widget", Some("Hardware"), 25, 5, None)
        .await
        .unwrap();

    let product = store.get_product(id).await.unwrap().unwrap();
    assert_eq!(product.quantity, 25);
    assert_eq!(product.min_stock, 5);

    let history = store.get_history(id, None, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].old_quantity, 0);
    assert_eq!(history[0].new_quantity, 25);
}

#[tokio::test]
async fn history_chain_stays_contiguous_under_concurrent_updates() {
    let store = mem_store().await;
    let id = store.add_product("Contended", None, 0, 0, None).await.unwrap();

    let mut handles = Vec::new();
    for target in 1..=8i64 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.update_quantity(id, target, None, None, None).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let product = store.get_product(id).await.unwrap().unwrap();
    let history = store.get_history(id, None, None).await.unwrap();

    // Creation plus eight updates, newest first.
    assert_eq!(history.len(), 9);
    assert_eq!(history[0].new_quantity, product.quantity);

    // Every entry starts where the previous one ended.
    for window in history.windows(2) {
        assert_eq!(window[0].old_quantity, window[1].new_quantity);
    }
}

#[tokio::test]
async fn update_rejects_corrupted_history_chain() {
    let store = mem_store().await;
    let id = store.add_product("Corrupt", None, 10, 0, None).await.unwrap();

    // Bypass the ledger and change the quantity column directly.
    let model = products::Entity::find_by_id(id)
        .one(&store.conn)
        .await
        .unwrap()
        .unwrap();
    let mut active: products::ActiveModel = model.into();
    active.quantity = Set(99);
    active.update(&store.conn).await.unwrap();

    let err = store
        .update_quantity(id, 100, None, None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Store(_)));
    assert!(err.is_retryable());

    // The failed update must not have appended anything.
    let history = store.get_history(id, None, None).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn update_missing_product_is_not_found() {
    let store = mem_store().await;

    let err = store
        .update_quantity(4242, 1, None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn delete_product_removes_history_and_is_idempotent() {
    let store = mem_store().await;
    let id = store.add_product("Doomed", None, 3, 0, None).await.unwrap();
    store.update_quantity(id, 5, None, None, None).await.unwrap();

    assert_eq!(store.delete_product(id).await.unwrap(), 1);
    assert!(store.get_product(id).await.unwrap().is_none());
    assert!(store.get_history(id, None, None).await.unwrap().is_empty());

    // Second delete reports zero rows, not an error.
    assert_eq!(store.delete_product(id).await.unwrap(), 0);
}

#[tokio::test]
async fn duplicate_product_name_is_rejected() {
    let store = mem_store().await;
    store.add_product("Unique", None, 1, 0, None).await.unwrap();

    let err = store
        .add_product("Unique", Some("Other"), 2, 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateName(name) if name == "Unique"));
}

#[tokio::test]
async fn session_roundtrip_and_expiry() {
    let store = mem_store().await;
    let user_id = store
        .create_user("alice", "alice-password", Role::User)
        .await
        .unwrap();

    let session = store.create_session(user_id).await.unwrap();
    assert_eq!(session.token.len(), 64);

    let user = store.verify_session(&session.token).await.unwrap().unwrap();
    assert_eq!(user.id, user_id);
    assert_eq!(user.username, "alice");

    // Force the session into the past.
    let mut active: sessions::ActiveModel = sessions::Entity::find_by_id(&session.token)
        .one(&store.conn)
        .await
        .unwrap()
        .unwrap()
        .into();
    active.expires_at = Set("2000-01-01T00:00:00.000000Z".to_string());
    active.update(&store.conn).await.unwrap();

    assert!(store.verify_session(&session.token).await.unwrap().is_none());

    assert_eq!(store.purge_expired_sessions().await.unwrap(), 1);
    assert!(store.verify_session(&session.token).await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_token_verifies_to_none() {
    let store = mem_store().await;
    assert!(store.verify_session("no-such-token").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_session_is_idempotent() {
    let store = mem_store().await;
    let user_id = store
        .create_user("bob", "bob-password-1", Role::User)
        .await
        .unwrap();
    let session = store.create_session(user_id).await.unwrap();

    store.delete_session(&session.token).await.unwrap();
    assert!(store.verify_session(&session.token).await.unwrap().is_none());

    store.delete_session(&session.token).await.unwrap();
}

#[tokio::test]
async fn delete_user_removes_their_sessions() {
    let store = mem_store().await;
    let user_id = store
        .create_user("carol", "carol-password", Role::User)
        .await
        .unwrap();
    let session = store.create_session(user_id).await.unwrap();

    store.delete_user(user_id).await.unwrap();

    assert!(store.get_user(user_id).await.unwrap().is_none());
    assert!(store.verify_session(&session.token).await.unwrap().is_none());

    let err = store.delete_user(user_id).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let store = mem_store().await;
    store
        .create_user("dave", "dave-password", Role::User)
        .await
        .unwrap();

    let err = store
        .create_user("dave", "other-password", Role::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateUsername(name) if name == "dave"));
}

#[tokio::test]
async fn legacy_sha256_hash_is_accepted_and_migrated() {
    let store = mem_store().await;

    // A row written by the old scheme: unsalted SHA-256 hex digest.
    let legacy_hash = "f0a5cdf5a9b255d3a71acdee7bd29c6b320f27e71f105b86220696f21b67c6e9";
    let now = "2026-01-01T00:00:00.000000Z".to_string();
    let active = users::ActiveModel {
        username: Set("legacy".to_string()),
        password_hash: Set(legacy_hash.to_string()),
        role: Set("user".to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    users::Entity::insert(active).exec(&store.conn).await.unwrap();

    assert!(
        store
            .verify_credentials("legacy", "wrongpassword")
            .await
            .unwrap()
            .is_none()
    );

    let user = store
        .verify_credentials("legacy", "oldpassword")
        .await
        .unwrap()
        .expect("legacy credentials should verify");
    assert_eq!(user.username, "legacy");

    // The login rewrote the stored hash as argon2.
    let model = users::Entity::find_by_id(user.id)
        .one(&store.conn)
        .await
        .unwrap()
        .unwrap();
    assert!(model.password_hash.starts_with("$argon2"));

    // And it still verifies through the new path.
    assert!(
        store
            .verify_credentials("legacy", "oldpassword")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn ensure_default_admin_only_seeds_empty_table() {
    let store = mem_store().await;

    store.ensure_default_admin().await.unwrap();
    let admin = store
        .verify_credentials("admin", "admin")
        .await
        .unwrap()
        .expect("default admin should exist");
    assert_eq!(admin.role, Role::Admin);

    // A second call must not reset anything.
    store
        .change_password(admin.id, "admin", "rotated-password")
        .await
        .unwrap();
    store.ensure_default_admin().await.unwrap();

    assert!(
        store
            .verify_credentials("admin", "admin")
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        store
            .verify_credentials("admin", "rotated-password")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn change_password_requires_current_password() {
    let store = mem_store().await;
    let user_id = store
        .create_user("erin", "first-password", Role::User)
        .await
        .unwrap();

    let err = store
        .change_password(user_id, "not-the-password", "second-password")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized));

    store
        .change_password(user_id, "first-password", "second-password")
        .await
        .unwrap();
    assert!(
        store
            .verify_credentials("erin", "second-password")
            .await
            .unwrap()
            .is_some()
    );
}
