//! Conversation records and membership changes.

use std::collections::BTreeMap;

use record_api::{server_timestamp, RecordPath, RecordStore};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    composer::{deliveries, message_record},
    error::{ChatError, Result},
    layout,
    model::{Conversation, ConversationId, ConversationKind, MessageKind, UserId},
    users,
};

/// Deterministic id of the direct conversation between two users.
pub fn dm_conversation_id(a: &UserId, b: &UserId) -> ConversationId {
    let (min, max) = if a <= b { (a, b) } else { (b, a) };
    let name = format!("dm:{}:{}", min, max);
    ConversationId::new(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string())
}

pub async fn get<S: RecordStore + ?Sized>(
    store: &S,
    cid: &ConversationId,
) -> Result<Option<Conversation>> {
    Ok(snapshot(store, cid).await?.map(|s| s.conversation))
}

/// How often a membership dependent write is retried when the participants
/// change under it.
pub(crate) const MAX_ATTEMPTS: usize = 5;

/// A conversation together with the stored participants it was read from.
pub(crate) struct Snapshot {
    pub(crate) conversation: Conversation,
    participants: Option<Value>,
}

pub(crate) async fn snapshot<S: RecordStore + ?Sized>(
    store: &S,
    cid: &ConversationId,
) -> Result<Option<Snapshot>> {
    let path = layout::conversation(cid)?;
    let Some(value) = store.read(&path).await? else {
        return Ok(None);
    };
    let participants = value.get("participants").cloned();
    let conversation =
        Conversation::from_record(cid.clone(), value).map_err(|source| ChatError::Malformed {
            path: path.to_string(),
            source,
        })?;
    Ok(Some(Snapshot {
        conversation,
        participants,
    }))
}

/// Commit `changes` only if the participants of `cid` are still the ones in
/// `snapshot`. `false` means nothing was written.
pub(crate) async fn commit_for_members<S: RecordStore + ?Sized>(
    store: &S,
    cid: &ConversationId,
    snapshot: &Snapshot,
    changes: Vec<(RecordPath, Option<Value>)>,
) -> Result<bool> {
    let guard = layout::participants(cid)?;
    Ok(store
        .update_if(&guard, snapshot.participants.clone(), changes)
        .await?)
}

/// Get or create the direct conversation between `a` and `b`. Concurrent
/// callers end up with the same single record.
pub async fn open_direct<S: RecordStore + ?Sized>(
    store: &S,
    a: &UserId,
    b: &UserId,
) -> Result<Conversation> {
    if a == b {
        return Err(ChatError::InvalidOperation(
            "direct conversation needs two different users".into(),
        ));
    }
    let cid = dm_conversation_id(a, b);
    let record = json!({
        "type": ConversationKind::DirectMessage,
        "participants": { a.as_str(): true, b.as_str(): true },
    });
    if store
        .create_if_absent(&layout::conversation(&cid)?, record)
        .await?
    {
        info!(conversation = %cid, "direct conversation created");
    }
    get(store, &cid)
        .await?
        .ok_or(ChatError::ConversationNotFound(cid))
}

/// Create a group holding `creator` and `members`.
pub async fn create_group<S: RecordStore + ?Sized>(
    store: &S,
    creator: &UserId,
    title: &str,
    members: &[UserId],
) -> Result<Conversation> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ChatError::InvalidOperation("group needs a title".into()));
    }
    let cid = ConversationId::new(store.push_key());
    let participants: BTreeMap<UserId, bool> = std::iter::once(creator)
        .chain(members)
        .map(|uid| (uid.clone(), true))
        .collect();
    let conversation = Conversation {
        id: cid.clone(),
        kind: ConversationKind::Group,
        title: Some(title.to_string()),
        participants,
    };

    let mut changes = vec![(
        layout::conversation(&cid)?,
        Some(json!({
            "type": conversation.kind,
            "title": title,
            "participants": conversation.participants,
        })),
    )];
    for member in conversation.members() {
        changes.push((
            layout::inbox_entry(member, &cid)?,
            Some(json!({ layout::INBOX_ORDER_FIELD: server_timestamp() })),
        ));
    }
    store.update(changes).await?;
    info!(conversation = %cid, members = conversation.participants.len(), "group created");
    Ok(conversation)
}

async fn group_for_actor<S: RecordStore + ?Sized>(
    store: &S,
    cid: &ConversationId,
    actor: &UserId,
) -> Result<Snapshot> {
    let snapshot = snapshot(store, cid)
        .await?
        .ok_or_else(|| ChatError::ConversationNotFound(cid.clone()))?;
    if snapshot.conversation.kind != ConversationKind::Group {
        return Err(ChatError::InvalidOperation(
            "direct conversations have fixed participants".into(),
        ));
    }
    if !snapshot.conversation.is_member(actor) {
        return Err(ChatError::NotParticipant {
            conversation: cid.clone(),
            user: actor.clone(),
        });
    }
    Ok(snapshot)
}

/// Add `user` to a group and tell every member, `user` included.
pub async fn add_participant<S: RecordStore + ?Sized>(
    store: &S,
    cid: &ConversationId,
    actor: &UserId,
    user: &UserId,
) -> Result<()> {
    if users::get(store, user).await?.is_none() {
        return Err(ChatError::UserNotFound(user.clone()));
    }
    let name = users::display_name(store, user).await?;
    let key = store.push_key();
    let notice = message_record(actor, &format!("{name} was added"), MessageKind::Info);

    for attempt in 1..=MAX_ATTEMPTS {
        let snapshot = group_for_actor(store, cid, actor).await?;
        if snapshot.conversation.is_member(user) {
            return Ok(());
        }
        let mut conversation = snapshot.conversation.clone();
        conversation.participants.insert(user.clone(), true);

        let mut changes = vec![(layout::participant(cid, user)?, Some(json!(true)))];
        changes.extend(deliveries(cid, conversation.members(), &key, &notice)?);
        if commit_for_members(store, cid, &snapshot, changes).await? {
            info!(conversation = %cid, user = %user, by = %actor, "participant added");
            return Ok(());
        }
        debug!(conversation = %cid, attempt, "participants changed, retrying add");
    }
    Err(ChatError::Contended(cid.clone()))
}

/// Remove `user` from a group. The remaining members get a notice; the
/// removed user keeps their history but receives nothing new.
pub async fn remove_participant<S: RecordStore + ?Sized>(
    store: &S,
    cid: &ConversationId,
    actor: &UserId,
    user: &UserId,
) -> Result<()> {
    let name = users::display_name(store, user).await?;
    let text = if actor == user {
        format!("{name} left")
    } else {
        format!("{name} was removed")
    };
    let key = store.push_key();
    let notice = message_record(actor, &text, MessageKind::Info);

    for attempt in 1..=MAX_ATTEMPTS {
        let snapshot = group_for_actor(store, cid, actor).await?;
        if !snapshot.conversation.is_member(user) {
            return Err(ChatError::NotParticipant {
                conversation: cid.clone(),
                user: user.clone(),
            });
        }
        let mut conversation = snapshot.conversation.clone();
        conversation.participants.remove(user);
        if conversation.members().next().is_none() {
            return Err(ChatError::InvalidOperation(
                "the last member cannot leave a group".into(),
            ));
        }

        let mut changes = vec![
            (layout::participant(cid, user)?, None),
            (layout::inbox_entry(user, cid)?, None),
        ];
        changes.extend(deliveries(cid, conversation.members(), &key, &notice)?);
        if commit_for_members(store, cid, &snapshot, changes).await? {
            info!(conversation = %cid, user = %user, by = %actor, "participant removed");
            return Ok(());
        }
        debug!(conversation = %cid, attempt, "participants changed, retrying removal");
    }
    Err(ChatError::Contended(cid.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dm_id_ignores_order() {
        let a = UserId::from("alice");
        let b = UserId::from("bob");
        assert_eq!(dm_conversation_id(&a, &b), dm_conversation_id(&b, &a));
        assert_ne!(dm_conversation_id(&a, &b), dm_conversation_id(&a, &a));
    }
}
