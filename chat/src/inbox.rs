use record_api::{ChildEvent, Query, SharedStore, Subscription};
use serde_json::Value;
use tracing::warn;

use crate::{
    layout,
    model::{ConversationId, UserId},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxEntry {
    pub conversation: ConversationId,
    pub last_message_at: i64,
}

/// Live list of the conversations `viewer` takes part in.
pub fn bind(store: &SharedStore, viewer: &UserId) -> Inbox {
    let sub = match layout::inbox(viewer) {
        Ok(path) => {
            store.subscribe_children(Query::children(path).order_by_child(layout::INBOX_ORDER_FIELD))
        }
        Err(e) => {
            warn!(viewer = %viewer, error = %e, "cannot bind inbox");
            Subscription::closed()
        }
    };
    Inbox {
        sub,
        entries: Vec::new(),
    }
}

#[derive(Debug)]
pub struct Inbox {
    sub: Subscription<ChildEvent>,
    entries: Vec<InboxEntry>,
}

impl Inbox {
    /// Wait for and apply the next change. `false` once the binding ended.
    pub async fn changed(&mut self) -> bool {
        match self.sub.recv().await {
            Some(event) => {
                self.apply(event);
                true
            }
            None => false,
        }
    }

    pub fn drain(&mut self) -> usize {
        let mut n = 0;
        while let Some(event) = self.sub.try_recv() {
            self.apply(event);
            n += 1;
        }
        n
    }

    /// Entries with the most recent activity first.
    pub fn entries(&self) -> &[InboxEntry] {
        &self.entries
    }

    fn apply(&mut self, event: ChildEvent) {
        let (key, value) = match event {
            ChildEvent::Added { key, value } | ChildEvent::Changed { key, value } => (key, value),
            ChildEvent::Removed { key } => {
                self.entries.retain(|e| e.conversation.as_str() != key);
                return;
            }
        };
        self.entries.retain(|e| e.conversation.as_str() != key);
        let entry = InboxEntry {
            conversation: ConversationId::new(key),
            last_message_at: value
                .get(layout::INBOX_ORDER_FIELD)
                .and_then(Value::as_i64)
                .unwrap_or(0),
        };
        let at = self.entries.partition_point(|e| {
            (e.last_message_at, &e.conversation) > (entry.last_message_at, &entry.conversation)
        });
        self.entries.insert(at, entry);
    }
}
