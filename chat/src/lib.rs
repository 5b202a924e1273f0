//! Conversation and message synchronization on top of a realtime record
//! store.

pub mod binder;
pub mod cli;
pub mod composer;
pub mod config;
pub mod conversations;
pub mod directory;
pub mod error;
pub mod inbox;
pub mod layout;
pub mod lifecycle;
pub mod model;
pub mod screen;
pub mod users;

pub use binder::{BoundMessages, MessageBinder, SequenceChange};
pub use composer::{Composer, SendOutcome};
pub use directory::{ConversationDirectory, ConversationWatch, DirectoryEvent, TitleWatch};
pub use error::{ChatError, Result};
pub use model::{
    BoundMessage, Conversation, ConversationId, ConversationKind, DisplayKind, Message,
    MessageKind, User, UserId,
};
pub use screen::{ConversationScreen, Navigation, ScreenUpdate};
