use super::*;
use envelope::Identity;

fn session(id: &str) -> Session {
    Session::signed_in(Identity::new(id), "token", Some("refresh".into()))
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("offscreen-{}-{name}.json", std::process::id()))
}

// =========================================================================
// MemorySessionStore
// =========================================================================

#[tokio::test]
async fn memory_store_round_trip() {
    let store = MemorySessionStore::new();
    assert_eq!(store.load("authSession").await.unwrap(), None);

    store.save("authSession", &session("u1")).await.unwrap();
    assert_eq!(store.load("authSession").await.unwrap(), Some(session("u1")));

    store.clear("authSession").await.unwrap();
    assert_eq!(store.load("authSession").await.unwrap(), None);
}

#[tokio::test]
async fn memory_store_seeded() {
    let store = MemorySessionStore::with_session("k", session("u2"));
    assert_eq!(store.load("k").await.unwrap().and_then(|s| s.identity).map(|i| i.id), Some("u2".into()));
    assert_eq!(store.load("other").await.unwrap(), None);
}

// =========================================================================
// FileSessionStore
// =========================================================================

#[tokio::test]
async fn file_store_missing_file_is_empty() {
    let store = FileSessionStore::new(temp_path("missing"));
    assert_eq!(store.load("authSession").await.unwrap(), None);
    store.clear("authSession").await.unwrap();
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let path = temp_path("reopen");
    let _ = tokio::fs::remove_file(&path).await;

    FileSessionStore::new(&path)
        .save("authSession", &session("u3"))
        .await
        .unwrap();
    let reopened = FileSessionStore::new(&path);
    assert_eq!(reopened.load("authSession").await.unwrap(), Some(session("u3")));

    reopened.clear("authSession").await.unwrap();
    assert_eq!(reopened.load("authSession").await.unwrap(), None);
    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn file_store_keys_are_independent() {
    let path = temp_path("keys");
    let _ = tokio::fs::remove_file(&path).await;

    let store = FileSessionStore::new(&path);
    store.save("a", &session("ua")).await.unwrap();
    store.save("b", &session("ub")).await.unwrap();
    store.clear("a").await.unwrap();
    assert_eq!(store.load("b").await.unwrap(), Some(session("ub")));
    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn file_store_corrupt_file_is_storage_error() {
    let path = temp_path("corrupt");
    tokio::fs::write(&path, b"{not json").await.unwrap();

    let err = FileSessionStore::new(&path).load("authSession").await.unwrap_err();
    assert!(matches!(err, BridgeError::Storage(_)));
    let _ = tokio::fs::remove_file(&path).await;
}

#[test]
fn coordinator_event_wire_shape() {
    let wire = serde_json::to_value(CoordinatorEvent::LogoutCompleted).unwrap();
    assert_eq!(wire, serde_json::json!({"type": "LOGOUT_COMPLETED"}));
}
