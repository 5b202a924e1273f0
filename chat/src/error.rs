use record_api::StoreError;
use thiserror::Error;

use crate::model::{ConversationId, UserId};

/// Failures of chat operations. Empty messages are not failures; they are
/// dropped without reaching the store.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("conversation {0} not found")]
    ConversationNotFound(ConversationId),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("user {user} is not a participant of {conversation}")]
    NotParticipant {
        conversation: ConversationId,
        user: UserId,
    },
    #[error("username `{0}` is already taken")]
    UsernameTaken(String),
    #[error("invalid username `{0}`")]
    InvalidUsername(String),
    #[error("membership of {0} kept changing, giving up")]
    Contended(ConversationId),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("malformed record at {path}: {source}")]
    Malformed {
        path: String,
        source: serde_json::Error,
    },
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;
