//! Live, ordered view of the messages one viewer may read.

use record_api::{ChildEvent, Query, SharedStore, Subscription};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    layout,
    model::{BoundMessage, ConversationId, DisplayKind, Message, UserId},
};

/// How the bound sequence changed after one store event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceChange {
    Inserted { index: usize },
    Updated { index: usize },
    Moved { from: usize, to: usize },
    Removed { index: usize },
}

#[derive(Clone)]
pub struct MessageBinder {
    store: SharedStore,
}

impl MessageBinder {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Bind the messages of `cid` delivered to `viewer`. Only the viewer's own
    /// index is queried, so nothing that was not delivered to them can show
    /// up here.
    pub fn bind(&self, cid: &ConversationId, viewer: &UserId) -> BoundMessages {
        let sub = match layout::message_index(cid, viewer) {
            Ok(path) => self
                .store
                .subscribe_children(Query::children(path).order_by_child(layout::MESSAGE_ORDER_FIELD)),
            Err(e) => {
                warn!(conversation = %cid, viewer = %viewer, error = %e, "cannot bind messages");
                Subscription::closed()
            }
        };
        debug!(conversation = %cid, viewer = %viewer, "messages bound");
        BoundMessages {
            conversation: cid.clone(),
            viewer: viewer.clone(),
            sub,
            messages: Vec::new(),
        }
    }
}

/// Messages in ascending timestamp order, ties broken by insertion key.
#[derive(Debug)]
pub struct BoundMessages {
    conversation: ConversationId,
    viewer: UserId,
    sub: Subscription<ChildEvent>,
    messages: Vec<BoundMessage>,
}

impl BoundMessages {
    /// Wait for the next store event that changes the sequence and apply it.
    /// `None` once the binding is closed.
    pub async fn recv(&mut self) -> Option<SequenceChange> {
        while let Some(event) = self.sub.recv().await {
            if let Some(change) = self.apply(event) {
                return Some(change);
            }
        }
        None
    }

    /// Apply every queued event without waiting. Returns how many changed
    /// the sequence.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.sub.try_recv() {
            if self.apply(event).is_some() {
                applied += 1;
            }
        }
        applied
    }

    pub fn messages(&self) -> &[BoundMessage] {
        &self.messages
    }

    /// Detach from the store. The current messages stay readable.
    pub fn close(&mut self) {
        self.sub.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.sub.is_cancelled()
    }

    fn apply(&mut self, event: ChildEvent) -> Option<SequenceChange> {
        match event {
            ChildEvent::Added { key, value } => {
                let bound = self.decode(key, value)?;
                if let Some(from) = self.position_of(&bound.key) {
                    self.messages.remove(from);
                }
                Some(SequenceChange::Inserted {
                    index: self.insert(bound),
                })
            }
            ChildEvent::Changed { key, value } => {
                let from = self.position_of(&key);
                let Some(bound) = self.decode(key, value) else {
                    let index = from?;
                    self.messages.remove(index);
                    return Some(SequenceChange::Removed { index });
                };
                let Some(from) = from else {
                    return Some(SequenceChange::Inserted {
                        index: self.insert(bound),
                    });
                };
                self.messages.remove(from);
                let to = self.insert(bound);
                Some(if from == to {
                    SequenceChange::Updated { index: to }
                } else {
                    SequenceChange::Moved { from, to }
                })
            }
            ChildEvent::Removed { key } => {
                let index = self.position_of(&key)?;
                self.messages.remove(index);
                Some(SequenceChange::Removed { index })
            }
        }
    }

    fn decode(&self, key: String, value: Value) -> Option<BoundMessage> {
        match serde_json::from_value::<Message>(value) {
            Ok(message) => {
                let display = DisplayKind::classify(&message, &self.viewer);
                Some(BoundMessage {
                    key,
                    message,
                    display,
                })
            }
            Err(e) => {
                warn!(conversation = %self.conversation, key = %key, error = %e, "skipping malformed message");
                None
            }
        }
    }

    fn position_of(&self, key: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.key == key)
    }

    fn insert(&mut self, bound: BoundMessage) -> usize {
        let at = self.messages.partition_point(|m| {
            (m.message.timestamp, m.key.as_str()) <= (bound.message.timestamp, bound.key.as_str())
        });
        self.messages.insert(at, bound);
        at
    }
}
