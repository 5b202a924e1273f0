#![allow(dead_code)]

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use pipeline_chat::{users, UserId};
use record_api::{ChildEvent, Query, RecordPath, RecordStore, SharedStore, StoreError, Subscription};
use record_store::LocalStore;
use serde_json::Value;
use tokio::sync::Notify;

pub fn uid(id: &str) -> UserId {
    UserId::from(id)
}

/// Store with alice, bob and carol registered.
pub async fn seeded() -> Arc<LocalStore> {
    let store = Arc::new(LocalStore::in_memory().unwrap());
    for (id, name, nick) in [
        ("alice", "alice", "Alice"),
        ("bob", "bob", "Bob"),
        ("carol", "carol", "Carol"),
    ] {
        users::register(&*store, &uid(id), name, nick).await.unwrap();
    }
    store
}

pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(2), fut)
        .await
        .expect("timed out")
}

/// Store whose writes can be switched off.
pub struct FlakyStore {
    pub inner: LocalStore,
    offline: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: LocalStore) -> Self {
        Self {
            inner,
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn read(&self, path: &RecordPath) -> Result<Option<Value>, StoreError> {
        self.inner.read(path).await
    }

    async fn update(&self, changes: Vec<(RecordPath, Option<Value>)>) -> Result<(), StoreError> {
        self.check()?;
        self.inner.update(changes).await
    }

    async fn create_if_absent(&self, path: &RecordPath, value: Value) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.create_if_absent(path, value).await
    }

    async fn update_if(
        &self,
        guard: &RecordPath,
        expected: Option<Value>,
        changes: Vec<(RecordPath, Option<Value>)>,
    ) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.update_if(guard, expected, changes).await
    }

    fn push_key(&self) -> String {
        self.inner.push_key()
    }

    fn subscribe_children(&self, query: Query) -> Subscription<ChildEvent> {
        self.inner.subscribe_children(query)
    }

    fn subscribe_value(&self, path: &RecordPath) -> Subscription<Option<Value>> {
        self.inner.subscribe_value(path)
    }
}

/// Store that can hold one read of a chosen path until released, so a
/// test can commit something between a read and the write built from it.
pub struct GatedStore {
    pub inner: Arc<LocalStore>,
    armed: Mutex<Option<RecordPath>>,
    reached: Notify,
    release: Notify,
}

impl GatedStore {
    pub fn new(inner: Arc<LocalStore>) -> Self {
        Self {
            inner,
            armed: Mutex::new(None),
            reached: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Hold the next read of `path`.
    pub fn hold_next_read(&self, path: RecordPath) {
        *self.armed.lock().unwrap() = Some(path);
    }

    /// Wait until the held read has happened.
    pub async fn held(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl RecordStore for GatedStore {
    async fn read(&self, path: &RecordPath) -> Result<Option<Value>, StoreError> {
        let value = self.inner.read(path).await?;
        let hold = {
            let mut armed = self.armed.lock().unwrap();
            if armed.as_ref() == Some(path) {
                armed.take();
                true
            } else {
                false
            }
        };
        if hold {
            self.reached.notify_one();
            self.release.notified().await;
        }
        Ok(value)
    }

    async fn update(&self, changes: Vec<(RecordPath, Option<Value>)>) -> Result<(), StoreError> {
        self.inner.update(changes).await
    }

    async fn update_if(
        &self,
        guard: &RecordPath,
        expected: Option<Value>,
        changes: Vec<(RecordPath, Option<Value>)>,
    ) -> Result<bool, StoreError> {
        self.inner.update_if(guard, expected, changes).await
    }

    async fn create_if_absent(&self, path: &RecordPath, value: Value) -> Result<bool, StoreError> {
        self.inner.create_if_absent(path, value).await
    }

    fn push_key(&self) -> String {
        self.inner.push_key()
    }

    fn subscribe_children(&self, query: Query) -> Subscription<ChildEvent> {
        self.inner.subscribe_children(query)
    }

    fn subscribe_value(&self, path: &RecordPath) -> Subscription<Option<Value>> {
        self.inner.subscribe_value(path)
    }
}

pub fn shared(store: &Arc<LocalStore>) -> SharedStore {
    store.clone()
}
