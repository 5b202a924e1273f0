//! Controller of one open conversation.

use record_api::SharedStore;

use crate::{
    binder::{BoundMessages, MessageBinder, SequenceChange},
    composer::{Composer, SendOutcome},
    directory::{self, ConversationDirectory, ConversationWatch, DirectoryEvent, TitleWatch},
    error::Result,
    lifecycle::{Listener, ListenerState, ScreenEvent},
    model::{BoundMessage, Conversation, ConversationId, ConversationKind, UserId},
};

/// Where the screen asks to go next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    ConversationList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenUpdate {
    Messages(SequenceChange),
    Conversation(Conversation),
    Unavailable,
    Title(String),
    Navigate(Navigation),
}

type Source<H> = Box<dyn Fn() -> H + Send + Sync>;

enum Incoming {
    Messages(SequenceChange),
    Directory(DirectoryEvent),
    Title(String),
}

pub struct ConversationScreen {
    conversation: ConversationId,
    viewer: UserId,
    directory: ConversationDirectory,
    composer: Composer,
    messages: Listener<Source<BoundMessages>>,
    metadata: Listener<Source<ConversationWatch>>,
    title: Option<TitleWatch>,
    title_key: Option<(ConversationKind, Option<String>)>,
    draft: String,
    removed: bool,
}

impl ConversationScreen {
    /// Screen for `conversation` seen by `viewer`. Nothing is subscribed
    /// until the screen becomes visible.
    pub fn new(store: SharedStore, conversation: ConversationId, viewer: UserId) -> Self {
        let binder = MessageBinder::new(store.clone());
        let directory = ConversationDirectory::new(store.clone());

        let (cid, uid) = (conversation.clone(), viewer.clone());
        let messages: Source<BoundMessages> = Box::new(move || binder.bind(&cid, &uid));
        let (cid, uid) = (conversation.clone(), viewer.clone());
        let watcher = directory.clone();
        let metadata: Source<ConversationWatch> = Box::new(move || watcher.watch(&cid, &uid));

        Self {
            conversation,
            viewer,
            directory,
            composer: Composer::new(store),
            messages: Listener::new(messages),
            metadata: Listener::new(metadata),
            title: None,
            title_key: None,
            draft: String::new(),
            removed: false,
        }
    }

    pub fn on_visible(&mut self) {
        if self.removed {
            return;
        }
        self.messages.apply(ScreenEvent::Visible);
        self.metadata.apply(ScreenEvent::Visible);
    }

    pub fn on_hidden(&mut self) {
        self.shut(ScreenEvent::Hidden);
    }

    pub fn on_destroyed(&mut self) {
        self.shut(ScreenEvent::Destroyed);
    }

    fn shut(&mut self, event: ScreenEvent) {
        self.messages.apply(event);
        self.metadata.apply(event);
        self.title = None;
        self.title_key = None;
    }

    pub fn state(&self) -> ListenerState {
        self.messages.state()
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Send the draft. It is cleared unless the send fails.
    pub async fn send_draft(&mut self) -> Result<SendOutcome> {
        let outcome = self
            .composer
            .send(&self.conversation, &self.viewer, &self.draft)
            .await?;
        self.draft.clear();
        Ok(outcome)
    }

    /// Wait for the next change worth showing. `None` when nothing is being
    /// listened to.
    pub async fn next_update(&mut self) -> Option<ScreenUpdate> {
        let incoming = tokio::select! {
            Some(change) = next_change(self.messages.handle_mut()) => Incoming::Messages(change),
            Some(event) = next_event(self.metadata.handle_mut()) => Incoming::Directory(event),
            Some(title) = next_title(self.title.as_mut()) => Incoming::Title(title),
            else => return None,
        };
        Some(match incoming {
            Incoming::Messages(change) => ScreenUpdate::Messages(change),
            Incoming::Title(title) => ScreenUpdate::Title(title),
            Incoming::Directory(DirectoryEvent::Updated(conversation)) => {
                let key = directory::title_key(&conversation, &self.viewer);
                if self.title_key.as_ref() != Some(&key) {
                    self.title = Some(self.directory.resolve_title(&conversation, &self.viewer));
                    self.title_key = Some(key);
                }
                ScreenUpdate::Conversation(conversation)
            }
            Incoming::Directory(DirectoryEvent::Unavailable) => ScreenUpdate::Unavailable,
            Incoming::Directory(DirectoryEvent::Removed) => {
                self.removed = true;
                self.shut(ScreenEvent::Destroyed);
                ScreenUpdate::Navigate(Navigation::ConversationList)
            }
        })
    }

    /// Messages bound while listening.
    pub fn messages(&self) -> &[BoundMessage] {
        self.messages.handle().map(|b| b.messages()).unwrap_or(&[])
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_ref().and_then(|t| t.current())
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

async fn next_change(handle: Option<&mut BoundMessages>) -> Option<SequenceChange> {
    handle?.recv().await
}

async fn next_event(handle: Option<&mut ConversationWatch>) -> Option<DirectoryEvent> {
    handle?.next().await
}

async fn next_title(handle: Option<&mut TitleWatch>) -> Option<String> {
    handle?.next().await
}
