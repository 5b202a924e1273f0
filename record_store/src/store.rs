use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use record_api::{ChildEvent, Query, RecordPath, RecordStore, StoreError, Subscription};
use rusqlite::Connection;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    db,
    events::{ListenerId, Listeners},
    tree,
};

/// Hands out commit timestamps in milliseconds. Never goes backwards, even
/// if the wall clock does or the store is reopened.
#[derive(Debug)]
struct ServerClock {
    last: i64,
}

impl ServerClock {
    fn resume(last: i64) -> Self {
        Self { last }
    }

    fn next(&mut self) -> i64 {
        let now = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        self.last = self.last.max(now);
        self.last
    }
}

struct Inner {
    root: Value,
    listeners: Listeners,
    clock: ServerClock,
    conn: Connection,
}

impl Inner {
    /// Apply `changes` as one commit: persist, then notify listeners.
    fn commit(&mut self, changes: Vec<(RecordPath, Option<Value>)>) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }
        for (i, (a, _)) in changes.iter().enumerate() {
            if let Some((b, _)) = changes[i + 1..].iter().find(|(b, _)| a.overlaps(b)) {
                return Err(StoreError::Rejected(format!(
                    "overlapping paths {a} and {b} in one update"
                )));
            }
        }

        let now = self.clock.next();
        let mut stamped = false;
        let mut paths = Vec::with_capacity(changes.len());
        let mut values = Vec::with_capacity(changes.len());
        for (path, value) in changes {
            let value = match value {
                Some(mut v) => {
                    stamped |= tree::resolve_server_values(&mut v, now);
                    tree::validate_keys(&v)?;
                    Some(v)
                }
                None => None,
            };
            paths.push(path);
            values.push(value);
        }

        let pending = self.listeners.prepare(&self.root, &paths);
        let previous: Vec<(RecordPath, Option<Value>)> = paths
            .iter()
            .map(|p| {
                let at = tree::restore_point(&self.root, p);
                let old = tree::get(&self.root, &at).cloned();
                (at, old)
            })
            .collect();
        for (path, value) in paths.iter().zip(values) {
            tree::set(&mut self.root, path, value);
        }
        if let Err(e) = db::persist(&mut self.conn, &self.root, &paths, stamped.then_some(now)) {
            for (at, old) in previous.into_iter().rev() {
                tree::set(&mut self.root, &at, old);
            }
            warn!(error = %e, "commit failed, changes rolled back");
            return Err(e);
        }
        debug!(paths = paths.len(), notified = pending.len(), "committed");
        self.listeners.dispatch(&self.root, pending);
        Ok(())
    }
}

/// Record store kept in memory and persisted to SQLite, with in-process
/// fan-out to subscribers.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Mutex<Inner>>,
}

impl LocalStore {
    /// Open (or create) a store backed by the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = db::init_db(&path)?;
        let root = db::load_tree(&conn)?;
        let clock = ServerClock::resume(db::load_clock(&conn)?);
        info!(path = %path.as_ref().display(), "record store opened");
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                root,
                listeners: Listeners::default(),
                clock,
                conn,
            })),
        })
    }

    /// Store that lives only as long as the process.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    fn detacher(&self, id: ListenerId) -> impl FnOnce() + Send + 'static {
        let weak = Arc::downgrade(&self.inner);
        move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().listeners.detach(id);
            }
        }
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    async fn read(&self, path: &RecordPath) -> Result<Option<Value>, StoreError> {
        Ok(tree::get(&self.inner.lock().root, path).cloned())
    }

    async fn update(&self, changes: Vec<(RecordPath, Option<Value>)>) -> Result<(), StoreError> {
        self.inner.lock().commit(changes)
    }

    async fn create_if_absent(&self, path: &RecordPath, value: Value) -> Result<bool, StoreError> {
        let Some(value) = tree::normalize(value) else {
            return Err(StoreError::Rejected(format!("empty value for {path}")));
        };
        let mut inner = self.inner.lock();
        if tree::get(&inner.root, path).is_some() {
            return Ok(false);
        }
        inner.commit(vec![(path.clone(), Some(value))])?;
        Ok(true)
    }

    async fn update_if(
        &self,
        guard: &RecordPath,
        expected: Option<Value>,
        changes: Vec<(RecordPath, Option<Value>)>,
    ) -> Result<bool, StoreError> {
        let expected = expected.and_then(tree::normalize);
        let mut inner = self.inner.lock();
        if tree::get(&inner.root, guard) != expected.as_ref() {
            debug!(guard = %guard, "guarded update skipped");
            return Ok(false);
        }
        inner.commit(changes)?;
        Ok(true)
    }

    fn push_key(&self) -> String {
        Uuid::now_v7().simple().to_string()
    }

    fn subscribe_children(&self, query: Query) -> Subscription<ChildEvent> {
        let (tx, rx) = unbounded_channel();
        let id = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            inner.listeners.attach_children(&inner.root, query, tx)
        };
        Subscription::new(rx, self.detacher(id))
    }

    fn subscribe_value(&self, path: &RecordPath) -> Subscription<Option<Value>> {
        let (tx, rx) = unbounded_channel();
        let id = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            inner.listeners.attach_value(&inner.root, path.clone(), tx)
        };
        Subscription::new(rx, self.detacher(id))
    }
}
