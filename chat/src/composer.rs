use record_api::{server_timestamp, RecordPath, SharedStore};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{
    conversations,
    error::{ChatError, Result},
    layout,
    model::{ConversationId, MessageKind, UserId},
};

/// Result of a send that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written under this insertion key.
    Sent { key: String },
    /// Nothing to send once trimmed. No store write happened.
    Dropped,
}

/// New message record stamped with the store clock.
pub(crate) fn message_record(sender: &UserId, text: &str, kind: MessageKind) -> Value {
    json!({
        "sender": sender,
        "text": text,
        "timestamp": server_timestamp(),
        "type": kind,
    })
}

/// Writes delivering `message` under `key` to each member's index, together
/// with their inbox entry.
pub(crate) fn deliveries<'a>(
    cid: &ConversationId,
    members: impl IntoIterator<Item = &'a UserId>,
    key: &str,
    message: &Value,
) -> Result<Vec<(RecordPath, Option<Value>)>> {
    let mut changes = Vec::new();
    for member in members {
        changes.push((layout::message(cid, member, key)?, Some(message.clone())));
        changes.push((
            layout::inbox_entry(member, cid)?,
            Some(json!({ layout::INBOX_ORDER_FIELD: server_timestamp() })),
        ));
    }
    Ok(changes)
}

/// Turns drafts into stored messages.
#[derive(Clone)]
pub struct Composer {
    store: SharedStore,
}

impl Composer {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Send `text` to every current member of `cid` in one atomic write.
    pub async fn send(
        &self,
        cid: &ConversationId,
        sender: &UserId,
        text: &str,
    ) -> Result<SendOutcome> {
        let text = text.trim();
        if text.is_empty() {
            debug!(conversation = %cid, "empty message dropped");
            return Ok(SendOutcome::Dropped);
        }
        let key = self.store.push_key();
        let record = message_record(sender, text, MessageKind::Text);
        for attempt in 1..=conversations::MAX_ATTEMPTS {
            let snapshot = conversations::snapshot(&*self.store, cid)
                .await?
                .ok_or_else(|| ChatError::ConversationNotFound(cid.clone()))?;
            if !snapshot.conversation.is_member(sender) {
                return Err(ChatError::NotParticipant {
                    conversation: cid.clone(),
                    user: sender.clone(),
                });
            }
            // delivered only if the members are still those it was addressed to
            let changes = deliveries(cid, snapshot.conversation.members(), &key, &record)?;
            if conversations::commit_for_members(&*self.store, cid, &snapshot, changes).await? {
                info!(conversation = %cid, sender = %sender, key = %key, "message sent");
                return Ok(SendOutcome::Sent { key });
            }
            debug!(conversation = %cid, attempt, "participants changed, retrying send");
        }
        Err(ChatError::Contended(cid.clone()))
    }

    /// Send to the direct conversation between `sender` and `recipient`,
    /// creating it on first use.
    pub async fn send_direct(
        &self,
        sender: &UserId,
        recipient: &UserId,
        text: &str,
    ) -> Result<(ConversationId, SendOutcome)> {
        let cid = conversations::dm_conversation_id(sender, recipient);
        if text.trim().is_empty() {
            return Ok((cid, SendOutcome::Dropped));
        }
        conversations::open_direct(&*self.store, sender, recipient).await?;
        let outcome = self.send(&cid, sender, text).await?;
        Ok((cid, outcome))
    }
}
