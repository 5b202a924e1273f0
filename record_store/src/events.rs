use std::collections::{BTreeSet, HashMap};

use record_api::{compare_children, ChildEvent, Query, RecordPath};
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use crate::tree;

pub(crate) type ListenerId = u64;

enum Listener {
    Children {
        query: Query,
        tx: UnboundedSender<ChildEvent>,
    },
    Value {
        path: RecordPath,
        tx: UnboundedSender<Option<Value>>,
    },
}

impl Listener {
    fn path(&self) -> &RecordPath {
        match self {
            Listener::Children { query, .. } => &query.path,
            Listener::Value { path, .. } => path,
        }
    }
}

/// What a listener's location looked like before a commit.
pub(crate) struct Pending {
    id: ListenerId,
    before: Before,
}

enum Before {
    Value(Option<Value>),
    Children {
        /// `None` when the whole child set has to be compared.
        keys: Option<BTreeSet<String>>,
        values: Map<String, Value>,
    },
}

/// Registry of attached listeners. Events are pushed into each listener's
/// own queue, so a listener sees commits one by one and in commit order.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: ListenerId,
    entries: HashMap<ListenerId, Listener>,
}

impl Listeners {
    /// Attach a children listener and queue the current children as `Added`.
    pub(crate) fn attach_children(
        &mut self,
        root: &Value,
        query: Query,
        tx: UnboundedSender<ChildEvent>,
    ) -> ListenerId {
        if let Some(children) = tree::children(root, &query.path) {
            let mut snapshot: Vec<(&String, &Value)> = children.iter().collect();
            snapshot.sort_by(|a, b| compare_children(&query.order_by, (a.0, a.1), (b.0, b.1)));
            for (key, value) in snapshot {
                let _ = tx.send(ChildEvent::Added {
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        self.insert(Listener::Children { query, tx })
    }

    /// Attach a value listener and queue the current value.
    pub(crate) fn attach_value(
        &mut self,
        root: &Value,
        path: RecordPath,
        tx: UnboundedSender<Option<Value>>,
    ) -> ListenerId {
        let _ = tx.send(tree::get(root, &path).cloned());
        self.insert(Listener::Value { path, tx })
    }

    fn insert(&mut self, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = self.next_id;
        trace!(id, path = %listener.path(), "listener attached");
        self.entries.insert(id, listener);
        id
    }

    pub(crate) fn detach(&mut self, id: ListenerId) -> bool {
        let removed = self.entries.remove(&id).is_some();
        if removed {
            trace!(id, "listener detached");
        }
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Capture the state of every listener touched by `changed`.
    pub(crate) fn prepare(&self, root: &Value, changed: &[RecordPath]) -> Vec<Pending> {
        let mut pending = Vec::new();
        for (&id, listener) in &self.entries {
            let path = listener.path();
            if !changed.iter().any(|c| c.overlaps(path)) {
                continue;
            }
            let before = match listener {
                Listener::Value { path, .. } => Before::Value(tree::get(root, path).cloned()),
                Listener::Children { query, .. } => {
                    let keys = affected_keys(&query.path, changed);
                    let values = snapshot_children(root, &query.path, keys.as_ref());
                    Before::Children { keys, values }
                }
            };
            pending.push(Pending { id, before });
        }
        pending
    }

    /// Queue events describing the difference between the captured state and
    /// `root`. Listeners whose subscriber went away are dropped.
    pub(crate) fn dispatch(&mut self, root: &Value, pending: Vec<Pending>) {
        let mut gone = Vec::new();
        for Pending { id, before } in pending {
            let Some(listener) = self.entries.get(&id) else {
                continue;
            };
            let delivered = match (listener, before) {
                (Listener::Value { path, tx }, Before::Value(old)) => {
                    let new = tree::get(root, path).cloned();
                    new == old || tx.send(new).is_ok()
                }
                (Listener::Children { query, tx }, Before::Children { keys, values }) => {
                    let after = snapshot_children(root, &query.path, keys.as_ref());
                    diff_children(query, &values, &after)
                        .into_iter()
                        .all(|ev| tx.send(ev).is_ok())
                }
                _ => true,
            };
            if !delivered {
                gone.push(id);
            }
        }
        for id in gone {
            self.detach(id);
        }
    }
}

/// Child keys of `parent` touched by `changed`, or `None` if a write at or
/// above `parent` may have touched all of them.
fn affected_keys(parent: &RecordPath, changed: &[RecordPath]) -> Option<BTreeSet<String>> {
    let depth = parent.segments().count();
    let mut keys = BTreeSet::new();
    for path in changed {
        if path == parent || path.is_ancestor_of(parent) {
            return None;
        }
        if parent.is_ancestor_of(path) {
            if let Some(key) = path.segments().nth(depth) {
                keys.insert(key.to_string());
            }
        }
    }
    Some(keys)
}

fn snapshot_children(
    root: &Value,
    parent: &RecordPath,
    keys: Option<&BTreeSet<String>>,
) -> Map<String, Value> {
    let Some(children) = tree::children(root, parent) else {
        return Map::new();
    };
    match keys {
        None => children.clone(),
        Some(keys) => keys
            .iter()
            .filter_map(|k| children.get(k).map(|v| (k.clone(), v.clone())))
            .collect(),
    }
}

fn diff_children(
    query: &Query,
    before: &Map<String, Value>,
    after: &Map<String, Value>,
) -> Vec<ChildEvent> {
    let mut events = Vec::new();
    for key in before.keys() {
        if !after.contains_key(key) {
            events.push(ChildEvent::Removed { key: key.clone() });
        }
    }
    let mut added: Vec<(&String, &Value)> = Vec::new();
    for (key, value) in after {
        match before.get(key) {
            None => added.push((key, value)),
            Some(old) if old != value => events.push(ChildEvent::Changed {
                key: key.clone(),
                value: value.clone(),
            }),
            Some(_) => {}
        }
    }
    added.sort_by(|a, b| compare_children(&query.order_by, (a.0, a.1), (b.0, b.1)));
    events.extend(added.into_iter().map(|(key, value)| ChildEvent::Added {
        key: key.clone(),
        value: value.clone(),
    }));
    events
}
