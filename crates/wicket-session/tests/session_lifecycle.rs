//! Integration tests for sessions persisted through a store.

use std::sync::Arc;

use wicket_session::{MemoryStore, Session, SessionError, SessionStore};

fn store() -> Arc<dyn SessionStore> {
    Arc::new(MemoryStore::new())
}

#[tokio::test]
async fn test_saved_session_is_found_by_id() {
    let store = store();
    let mut session = Session::create(Arc::clone(&store));
    session.save().await.unwrap();

    let found = Session::find(&store, session.id()).await.unwrap().unwrap();

    assert_eq!(found.id(), session.id());
    assert_eq!(found.mtime(), session.mtime());
}

#[tokio::test]
async fn test_unsaved_session_is_not_found() {
    let store = store();
    let session = Session::create(Arc::clone(&store));

    assert!(Session::find(&store, session.id()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_destroyed_session_is_gone() {
    let store = store();
    let mut session = Session::create(Arc::clone(&store));
    session.save().await.unwrap();

    session.destroy().await.unwrap();

    assert!(Session::find(&store, session.id()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_authentication_survives_reload() {
    let store = store();
    let mut session = Session::create(Arc::clone(&store));
    session.set_token(Some("abc".into()));
    session.set_user(Some(serde_json::json!({ "name": "ada" })));
    session.save().await.unwrap();

    let found = Session::find(&store, session.id()).await.unwrap().unwrap();

    assert!(found.is_authenticated());
    assert_eq!(found.token(), Some("abc"));
    assert_eq!(found.user().unwrap()["name"], "ada");
}

#[tokio::test]
async fn test_logout_then_save_is_rejected() {
    let store = store();
    let mut session = Session::create(Arc::clone(&store));
    session.set_token(Some("abc".into()));
    session.save().await.unwrap();

    session.destroy().await.unwrap();
    let result = session.save().await;

    assert!(matches!(result, Err(SessionError::Destroyed(id)) if id == session.id()));
    assert!(session.token().is_none());
    assert_eq!(store.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_find_empty_id_is_none() {
    let store = store();

    assert!(Session::find(&store, "").await.unwrap().is_none());
}
