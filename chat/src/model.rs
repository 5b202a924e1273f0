use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ConversationId);

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    #[serde(skip)]
    pub id: UserId,
    pub nickname: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    DirectMessage,
    Group,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Conversation {
    #[serde(skip)]
    pub id: ConversationId,
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Participant id to membership flag. Removed members have no entry or a
    /// `false` flag.
    #[serde(default)]
    pub participants: BTreeMap<UserId, bool>,
}

impl Conversation {
    /// Decode a stored conversation record.
    pub fn from_record(id: ConversationId, value: Value) -> Result<Self, serde_json::Error> {
        let mut conversation: Conversation = serde_json::from_value(value)?;
        conversation.id = id;
        Ok(conversation)
    }

    pub fn is_member(&self, user: &UserId) -> bool {
        self.participants.get(user).copied().unwrap_or(false)
    }

    /// Current members, in id order.
    pub fn members(&self) -> impl Iterator<Item = &UserId> {
        self.participants
            .iter()
            .filter(|(_, flag)| **flag)
            .map(|(id, _)| id)
    }

    /// For a direct message, the participant that is not `viewer`.
    pub fn other_participant(&self, viewer: &UserId) -> Option<&UserId> {
        self.participants.keys().find(|id| *id != viewer)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Info,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: UserId,
    pub text: String,
    /// Commit time assigned by the store, in milliseconds.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

/// How a message is rendered for one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    Sent,
    Received,
    Info,
}

impl DisplayKind {
    pub fn classify(message: &Message, viewer: &UserId) -> Self {
        match message.kind {
            MessageKind::Info => DisplayKind::Info,
            MessageKind::Text if &message.sender == viewer => DisplayKind::Sent,
            MessageKind::Text => DisplayKind::Received,
        }
    }
}

/// A message as it appears in a bound sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundMessage {
    /// Insertion key assigned by the store.
    pub key: String,
    pub message: Message,
    pub display: DisplayKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conversation_membership() {
        let conv = Conversation::from_record(
            "c1".into(),
            json!({"type": "group", "title": "Family", "participants": {"a": true, "b": false}}),
        )
        .unwrap();
        assert_eq!(conv.id.as_str(), "c1");
        assert!(conv.is_member(&"a".into()));
        assert!(!conv.is_member(&"b".into()));
        assert!(!conv.is_member(&"c".into()));
        assert_eq!(conv.members().collect::<Vec<_>>(), [&UserId::from("a")]);
    }

    #[test]
    fn other_participant_of_dm() {
        let conv = Conversation::from_record(
            "dm".into(),
            json!({"type": "direct_message", "participants": {"a": true, "b": true}}),
        )
        .unwrap();
        assert_eq!(conv.kind, ConversationKind::DirectMessage);
        assert_eq!(conv.other_participant(&"a".into()), Some(&"b".into()));
        assert_eq!(conv.other_participant(&"b".into()), Some(&"a".into()));
    }

    #[test]
    fn display_kind() {
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let mut msg = Message {
            sender: alice.clone(),
            text: "hi".into(),
            timestamp: 1,
            kind: MessageKind::Text,
        };
        assert_eq!(DisplayKind::classify(&msg, &alice), DisplayKind::Sent);
        assert_eq!(DisplayKind::classify(&msg, &bob), DisplayKind::Received);
        msg.kind = MessageKind::Info;
        assert_eq!(DisplayKind::classify(&msg, &alice), DisplayKind::Info);
        assert_eq!(DisplayKind::classify(&msg, &bob), DisplayKind::Info);
    }
}
