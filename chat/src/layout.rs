//! Where the chat records live in the store.
//!
//! ```text
//! users/{uid}                          { nickname, username }
//! usernames/{username}                 uid
//! conversations/{cid}                  { type, title?, participants: { uid: true } }
//! messages/{cid}/{viewer}/{key}        { sender, text, timestamp, type }
//! user-conversations/{uid}/{cid}       { last_message_at }
//! ```
//!
//! Messages are copied into one index per entitled viewer, so a viewer's
//! query can only ever reach messages that were delivered to them.

use record_api::{RecordPath, StoreError};

use crate::model::{ConversationId, UserId};

pub fn user(uid: &UserId) -> Result<RecordPath, StoreError> {
    RecordPath::from_segments(&["users", uid.as_str()])
}

pub fn nickname(uid: &UserId) -> Result<RecordPath, StoreError> {
    RecordPath::from_segments(&["users", uid.as_str(), "nickname"])
}

pub fn username(name: &str) -> Result<RecordPath, StoreError> {
    RecordPath::from_segments(&["usernames", &name.to_ascii_lowercase()])
}

pub fn conversation(cid: &ConversationId) -> Result<RecordPath, StoreError> {
    RecordPath::from_segments(&["conversations", cid.as_str()])
}

pub fn participants(cid: &ConversationId) -> Result<RecordPath, StoreError> {
    RecordPath::from_segments(&["conversations", cid.as_str(), "participants"])
}

pub fn participant(cid: &ConversationId, uid: &UserId) -> Result<RecordPath, StoreError> {
    RecordPath::from_segments(&["conversations", cid.as_str(), "participants", uid.as_str()])
}

pub fn message_index(cid: &ConversationId, viewer: &UserId) -> Result<RecordPath, StoreError> {
    RecordPath::from_segments(&["messages", cid.as_str(), viewer.as_str()])
}

pub fn message(cid: &ConversationId, viewer: &UserId, key: &str) -> Result<RecordPath, StoreError> {
    message_index(cid, viewer)?.child(key)
}

pub fn inbox(uid: &UserId) -> Result<RecordPath, StoreError> {
    RecordPath::from_segments(&["user-conversations", uid.as_str()])
}

pub fn inbox_entry(uid: &UserId, cid: &ConversationId) -> Result<RecordPath, StoreError> {
    inbox(uid)?.child(cid.as_str())
}

/// Field messages are ordered by.
pub const MESSAGE_ORDER_FIELD: &str = "timestamp";

/// Field inbox entries are ordered by.
pub const INBOX_ORDER_FIELD: &str = "last_message_at";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths() {
        let cid = ConversationId::from("c1");
        let uid = UserId::from("u1");
        assert_eq!(message(&cid, &uid, "k").unwrap().as_str(), "messages/c1/u1/k");
        assert_eq!(participant(&cid, &uid).unwrap().as_str(), "conversations/c1/participants/u1");
        assert_eq!(username("Alice").unwrap().as_str(), "usernames/alice");
        assert_eq!(inbox_entry(&uid, &cid).unwrap().as_str(), "user-conversations/u1/c1");
        assert!(user(&UserId::from("bad/id")).is_err());
    }
}
