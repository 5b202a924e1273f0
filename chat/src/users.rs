//! User profiles and unique usernames.

use once_cell::sync::Lazy;
use record_api::RecordStore;
use regex::Regex;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    error::{ChatError, Result},
    layout,
    model::{User, UserId},
};

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,32}$").unwrap());

pub fn is_valid_username(name: &str) -> bool {
    USERNAME_RE.is_match(name)
}

/// Claim `username` for `uid` and store the profile. Registering the same
/// user under the same name again only refreshes the profile; a new name
/// releases the old one.
pub async fn register<S: RecordStore + ?Sized>(
    store: &S,
    uid: &UserId,
    username: &str,
    nickname: &str,
) -> Result<User> {
    if !is_valid_username(username) {
        return Err(ChatError::InvalidUsername(username.to_string()));
    }
    let nickname = nickname.trim();
    if nickname.is_empty() {
        return Err(ChatError::InvalidOperation("empty nickname".into()));
    }
    let claim = layout::username(username)?;
    if !store.create_if_absent(&claim, json!(uid.as_str())).await? {
        let owner = store.read(&claim).await?;
        if owner.as_ref().and_then(Value::as_str) != Some(uid.as_str()) {
            return Err(ChatError::UsernameTaken(username.to_string()));
        }
    }
    let user = User {
        id: uid.clone(),
        nickname: nickname.to_string(),
        username: username.to_string(),
    };
    let profile = json!({ "nickname": user.nickname, "username": user.username });
    let mut changes = vec![(layout::user(uid)?, Some(profile))];

    // a rename gives the old name back
    let previous = get(store, uid)
        .await?
        .map(|u| u.username)
        .filter(|old| !old.eq_ignore_ascii_case(username));
    if let Some(old) = previous {
        let old_claim = layout::username(&old)?;
        changes.push((old_claim.clone(), None));
        if store
            .update_if(&old_claim, Some(json!(uid.as_str())), changes.clone())
            .await?
        {
            info!(user = %uid, old = %old, new = username, "username changed");
            return Ok(user);
        }
        changes.pop();
    }
    store.update(changes).await?;
    info!(user = %uid, username, "user registered");
    Ok(user)
}

pub async fn get<S: RecordStore + ?Sized>(store: &S, uid: &UserId) -> Result<Option<User>> {
    let path = layout::user(uid)?;
    let Some(value) = store.read(&path).await? else {
        return Ok(None);
    };
    let mut user: User = serde_json::from_value(value).map_err(|source| ChatError::Malformed {
        path: path.to_string(),
        source,
    })?;
    user.id = uid.clone();
    Ok(Some(user))
}

/// Look a user up by username, ignoring case.
pub async fn find_by_username<S: RecordStore + ?Sized>(
    store: &S,
    username: &str,
) -> Result<Option<User>> {
    if !is_valid_username(username) {
        return Ok(None);
    }
    let Some(owner) = store.read(&layout::username(username)?).await? else {
        return Ok(None);
    };
    match owner.as_str() {
        Some(uid) => get(store, &UserId::from(uid)).await,
        None => Ok(None),
    }
}

pub async fn set_nickname<S: RecordStore + ?Sized>(
    store: &S,
    uid: &UserId,
    nickname: &str,
) -> Result<()> {
    let nickname = nickname.trim();
    if nickname.is_empty() {
        return Err(ChatError::InvalidOperation("empty nickname".into()));
    }
    if store.read(&layout::user(uid)?).await?.is_none() {
        return Err(ChatError::UserNotFound(uid.clone()));
    }
    store
        .write(&layout::nickname(uid)?, Some(json!(nickname)))
        .await?;
    Ok(())
}

/// Name to show for `uid`: the nickname, or the id when no profile exists.
pub async fn display_name<S: RecordStore + ?Sized>(store: &S, uid: &UserId) -> Result<String> {
    Ok(get(store, uid)
        .await?
        .map(|u| u.nickname)
        .unwrap_or_else(|| uid.to_string()))
}
