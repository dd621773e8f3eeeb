//! State provisioning and save protocol

mod common;

use std::sync::Arc;

use common::MemoryStorage;
use photolake_core::domain::{Album, State};
use photolake_core::ports::IStorageProvider;
use photolake_sync::{StateSource, StateStore, SyncError};

fn store(storage: &Arc<MemoryStorage>, dir: &std::path::Path) -> StateStore {
    let storage: Arc<dyn IStorageProvider> = storage.clone();
    StateStore::new(storage, dir.join(".photolake.state"), "photolake")
}

fn remote_state(storage: &MemoryStorage, store: &StateStore) -> State {
    let bytes = storage.object(store.remote_name()).expect("remote state exists");
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn fresh_workspace_creates_lake_and_saves_both_copies() {
    let storage = MemoryStorage::new();
    let dir = tempfile::tempdir().unwrap();
    let store = store(&storage, dir.path());

    let (state, source) = store.provision().await.unwrap();

    assert_eq!(source, StateSource::New);
    assert!(!state.is_empty());
    assert!(state.lake_name.as_str().starts_with("photolake-"));
    assert_eq!(storage.lake_names(), vec![state.lake_name.to_string()]);
    assert_eq!(storage.bound_lake().as_deref(), Some(state.lake_name.as_str()));

    let local = store.load_local().await.unwrap().unwrap();
    assert_eq!(local, state);
    let remote = remote_state(&storage, &store);
    assert_eq!(remote.lake_name, state.lake_name);
    assert_ne!(remote.id, state.id, "remote copy is re-stamped");
}

#[tokio::test]
async fn local_state_wins() {
    let storage = MemoryStorage::new();
    let dir = tempfile::tempdir().unwrap();
    let store = store(&storage, dir.path());
    let state = State::new("photolake").add_album(Album::new("local"));
    store.save_local(&state).await.unwrap();

    let (provisioned, source) = store.provision().await.unwrap();

    assert_eq!(source, StateSource::Local);
    assert_eq!(provisioned, state);
    assert!(storage.lake_names().is_empty(), "no lake is created");
    assert_eq!(storage.bound_lake().as_deref(), Some(state.lake_name.as_str()));
}

#[tokio::test]
async fn missing_local_state_is_refreshed_from_remote() {
    let storage = MemoryStorage::new();
    let remote = State::new("photolake").add_album(Album::new("from elsewhere"));
    storage.put(
        remote.lake_name.as_str(),
        ".photolake.state",
        &serde_json::to_vec(&remote).unwrap(),
    );
    let dir = tempfile::tempdir().unwrap();
    let store = store(&storage, dir.path());

    let (state, source) = store.provision().await.unwrap();

    assert_eq!(source, StateSource::Remote);
    assert_eq!(state, remote);
    assert_eq!(store.load_local().await.unwrap().unwrap(), remote);
    assert_eq!(storage.lake_names().len(), 1);
}

#[tokio::test]
async fn lake_without_state_document_provisions_new_workspace() {
    let storage = MemoryStorage::new();
    storage.add_lake("photolake-empty");
    let dir = tempfile::tempdir().unwrap();
    let store = store(&storage, dir.path());

    let (_, source) = store.provision().await.unwrap();
    assert_eq!(source, StateSource::New);
}

#[tokio::test]
async fn unrelated_lakes_are_ignored() {
    let storage = MemoryStorage::new();
    storage.put("other-tool-123", ".photolake.state", b"{}");
    let dir = tempfile::tempdir().unwrap();
    let store = store(&storage, dir.path());

    let (state, source) = store.provision().await.unwrap();
    assert_eq!(source, StateSource::New);
    assert_ne!(state.lake_name.as_str(), "other-tool-123");
}

#[tokio::test]
async fn save_writes_local_then_restamped_remote() {
    let storage = MemoryStorage::new();
    let dir = tempfile::tempdir().unwrap();
    let store = store(&storage, dir.path());
    let (state, _) = store.provision().await.unwrap();

    let state = state.add_album(Album::new("new album"));
    store.save(&state).await.unwrap();

    let local = store.load_local().await.unwrap().unwrap();
    let remote = remote_state(&storage, &store);
    assert_eq!(local, state);
    assert_eq!(remote.albums, state.albums);
    assert_ne!(remote.id, state.id);
}

#[tokio::test]
async fn remote_failure_keeps_local_write() {
    let storage = MemoryStorage::new();
    let dir = tempfile::tempdir().unwrap();
    let store = store(&storage, dir.path());
    let (state, _) = store.provision().await.unwrap();
    let before_remote = remote_state(&storage, &store);

    storage.set_offline(true);
    let state = state.add_album(Album::new("offline edit"));
    let err = store.save(&state).await.unwrap_err();

    assert!(matches!(err, SyncError::BadConnection(_)));
    assert_eq!(store.load_local().await.unwrap().unwrap(), state);
    assert_eq!(remote_state(&storage, &store), before_remote);
}

#[tokio::test]
async fn corrupt_local_state_is_reported() {
    let storage = MemoryStorage::new();
    let dir = tempfile::tempdir().unwrap();
    let store = store(&storage, dir.path());
    std::fs::write(store.local_path(), b"{ definitely not a state").unwrap();

    let err = store.provision().await.unwrap_err();
    assert!(matches!(err, SyncError::CorruptState(_)));
}

#[tokio::test]
async fn offline_provisioning_is_a_connection_error() {
    let storage = MemoryStorage::new();
    storage.set_offline(true);
    let dir = tempfile::tempdir().unwrap();
    let store = store(&storage, dir.path());

    let err = store.provision().await.unwrap_err();
    assert!(matches!(err, SyncError::BadConnection(_)));
}
