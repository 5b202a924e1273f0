//! Live conversation metadata and titles.

use record_api::{SharedStore, Subscription};
use serde_json::Value;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, info, warn};

use crate::{
    layout,
    model::{Conversation, ConversationId, ConversationKind, UserId},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEvent {
    /// Fresh snapshot; the viewer is a member.
    Updated(Conversation),
    /// The record is absent or cannot be decoded.
    Unavailable,
    /// The viewer is no longer a member. Sent once, then the watch ends.
    Removed,
}

#[derive(Clone)]
pub struct ConversationDirectory {
    store: SharedStore,
}

impl ConversationDirectory {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Watch the metadata of `cid` as seen by `viewer`.
    pub fn watch(&self, cid: &ConversationId, viewer: &UserId) -> ConversationWatch {
        let sub = match layout::conversation(cid) {
            Ok(path) => self.store.subscribe_value(&path),
            Err(e) => {
                warn!(conversation = %cid, error = %e, "cannot watch conversation");
                unavailable()
            }
        };
        ConversationWatch {
            conversation: cid.clone(),
            viewer: viewer.clone(),
            sub,
            current: None,
            removed: false,
        }
    }

    /// Follow the title `viewer` should see for `conversation`. Groups use
    /// their stored title; direct conversations use the other participant's
    /// nickname, updated as it changes.
    pub fn resolve_title(&self, conversation: &Conversation, viewer: &UserId) -> TitleWatch {
        let source = match conversation.kind {
            ConversationKind::Group => TitleSource::Fixed(Some(
                conversation
                    .title
                    .clone()
                    .unwrap_or_else(|| conversation.id.to_string()),
            )),
            ConversationKind::DirectMessage => match conversation.other_participant(viewer) {
                Some(other) => match layout::nickname(other) {
                    Ok(path) => TitleSource::Nickname {
                        fallback: other.to_string(),
                        sub: self.store.subscribe_value(&path),
                    },
                    Err(_) => TitleSource::Fixed(Some(other.to_string())),
                },
                None => TitleSource::Fixed(Some(conversation.id.to_string())),
            },
        };
        TitleWatch { source, last: None }
    }
}

/// Subscription that reports a missing record once.
fn unavailable() -> Subscription<Option<Value>> {
    let (tx, rx) = unbounded_channel();
    let _ = tx.send(None);
    Subscription::new(rx, || {})
}

/// What a title depends on. Titles only need resolving again when this
/// changes.
pub(crate) fn title_key(conversation: &Conversation, viewer: &UserId) -> (ConversationKind, Option<String>) {
    match conversation.kind {
        ConversationKind::Group => (conversation.kind, conversation.title.clone()),
        ConversationKind::DirectMessage => (
            conversation.kind,
            conversation.other_participant(viewer).map(|u| u.to_string()),
        ),
    }
}

#[derive(Debug)]
pub struct ConversationWatch {
    conversation: ConversationId,
    viewer: UserId,
    sub: Subscription<Option<Value>>,
    current: Option<Conversation>,
    removed: bool,
}

impl ConversationWatch {
    /// Next change to the conversation. `None` once closed or after
    /// [`DirectoryEvent::Removed`].
    pub async fn next(&mut self) -> Option<DirectoryEvent> {
        if self.removed {
            return None;
        }
        let value = self.sub.recv().await?;
        Some(self.apply(value))
    }

    fn apply(&mut self, value: Option<Value>) -> DirectoryEvent {
        let Some(value) = value else {
            debug!(conversation = %self.conversation, "conversation unavailable");
            self.current = None;
            return DirectoryEvent::Unavailable;
        };
        match Conversation::from_record(self.conversation.clone(), value) {
            Ok(conversation) if conversation.is_member(&self.viewer) => {
                self.current = Some(conversation.clone());
                DirectoryEvent::Updated(conversation)
            }
            Ok(_) => {
                info!(conversation = %self.conversation, viewer = %self.viewer, "viewer removed from conversation");
                self.removed = true;
                self.current = None;
                self.sub.cancel();
                DirectoryEvent::Removed
            }
            Err(e) => {
                warn!(conversation = %self.conversation, error = %e, "malformed conversation record");
                self.current = None;
                DirectoryEvent::Unavailable
            }
        }
    }

    /// Latest snapshot in which the viewer was a member.
    pub fn current(&self) -> Option<&Conversation> {
        self.current.as_ref()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn close(&mut self) {
        self.sub.cancel();
    }
}

#[derive(Debug)]
enum TitleSource {
    Fixed(Option<String>),
    Nickname {
        fallback: String,
        sub: Subscription<Option<Value>>,
    },
}

/// Live title of a conversation. Only yields when the title changes.
#[derive(Debug)]
pub struct TitleWatch {
    source: TitleSource,
    last: Option<String>,
}

impl TitleWatch {
    pub async fn next(&mut self) -> Option<String> {
        match &mut self.source {
            TitleSource::Fixed(title) => {
                let title = title.take()?;
                self.last = Some(title.clone());
                Some(title)
            }
            TitleSource::Nickname { fallback, sub } => loop {
                let nickname = sub.recv().await?;
                let title = nickname
                    .as_ref()
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| fallback.clone());
                if self.last.as_deref() != Some(title.as_str()) {
                    self.last = Some(title.clone());
                    return Some(title);
                }
            },
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.last.as_deref()
    }
}
