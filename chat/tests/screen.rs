mod common;

use std::sync::Arc;

use common::{seeded, shared, uid, within, FlakyStore};
use pipeline_chat::{
    conversations, lifecycle::ListenerState, users, ChatError, Composer, ConversationScreen,
    Navigation, ScreenUpdate, SendOutcome,
};
use record_api::SharedStore;
use record_store::LocalStore;

/// Pump updates until `done` accepts one.
async fn pump_until(screen: &mut ConversationScreen, mut done: impl FnMut(&ScreenUpdate) -> bool) {
    within(async {
        loop {
            let update = screen.next_update().await.expect("screen went quiet");
            if done(&update) {
                return;
            }
        }
    })
    .await
}

#[tokio::test]
async fn listeners_follow_visibility() {
    let store = seeded().await;
    let (cid, _) = Composer::new(shared(&store))
        .send_direct(&uid("alice"), &uid("bob"), "hi")
        .await
        .unwrap();
    let mut screen = ConversationScreen::new(shared(&store), cid.clone(), uid("bob"));
    assert_eq!(screen.state(), ListenerState::Stopped);
    assert_eq!(store.listener_count(), 0);
    assert!(screen.next_update().await.is_none());

    screen.on_visible();
    assert_eq!(screen.state(), ListenerState::Listening);
    screen.on_visible();
    pump_until(&mut screen, |u| matches!(u, ScreenUpdate::Messages(_))).await;
    assert_eq!(screen.messages().len(), 1);

    screen.on_hidden();
    assert_eq!(screen.state(), ListenerState::Stopped);
    assert_eq!(store.listener_count(), 0);
    Composer::new(shared(&store))
        .send(&cid, &uid("alice"), "while away")
        .await
        .unwrap();

    screen.on_visible();
    let mut inserted = 0;
    pump_until(&mut screen, |u| {
        if matches!(u, ScreenUpdate::Messages(_)) {
            inserted += 1;
        }
        inserted == 2
    })
    .await;
    let texts: Vec<&str> = screen
        .messages()
        .iter()
        .map(|m| m.message.text.as_str())
        .collect();
    assert_eq!(texts, ["hi", "while away"]);

    screen.on_destroyed();
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn dm_title_tracks_the_other_nickname() {
    let store = seeded().await;
    let conversation = conversations::open_direct(&*store, &uid("alice"), &uid("bob"))
        .await
        .unwrap();
    let mut screen = ConversationScreen::new(shared(&store), conversation.id, uid("alice"));
    screen.on_visible();
    pump_until(&mut screen, |u| u == &ScreenUpdate::Title("Bob".into())).await;
    assert_eq!(screen.title(), Some("Bob"));

    users::set_nickname(&*store, &uid("bob"), "Bobby").await.unwrap();
    pump_until(&mut screen, |u| u == &ScreenUpdate::Title("Bobby".into())).await;
    assert_eq!(screen.title(), Some("Bobby"));
}

#[tokio::test]
async fn removal_navigates_back_to_the_list() {
    let store = seeded().await;
    let group = conversations::create_group(&*store, &uid("alice"), "Team", &[uid("bob")])
        .await
        .unwrap();
    let mut screen = ConversationScreen::new(shared(&store), group.id.clone(), uid("bob"));
    screen.on_visible();
    pump_until(&mut screen, |u| u == &ScreenUpdate::Title("Team".into())).await;

    conversations::remove_participant(&*store, &group.id, &uid("alice"), &uid("bob"))
        .await
        .unwrap();
    pump_until(&mut screen, |u| {
        u == &ScreenUpdate::Navigate(Navigation::ConversationList)
    })
    .await;
    assert!(screen.is_removed());
    assert_eq!(screen.state(), ListenerState::Stopped);
    assert_eq!(store.listener_count(), 0);

    screen.on_visible();
    assert_eq!(screen.state(), ListenerState::Stopped);
    assert!(screen.next_update().await.is_none());
}

#[tokio::test]
async fn missing_conversation_is_unavailable() {
    let store = seeded().await;
    let mut screen = ConversationScreen::new(shared(&store), "gone".into(), uid("bob"));
    screen.on_visible();
    pump_until(&mut screen, |u| u == &ScreenUpdate::Unavailable).await;
    assert!(!screen.is_removed());
    assert!(screen.messages().is_empty());
}

#[tokio::test]
async fn draft_survives_a_failed_send() {
    let flaky = Arc::new(FlakyStore::new(LocalStore::in_memory().unwrap()));
    let store: SharedStore = flaky.clone();
    let conversation = conversations::open_direct(&*store, &uid("alice"), &uid("bob"))
        .await
        .unwrap();
    let mut screen = ConversationScreen::new(store, conversation.id, uid("alice"));
    screen.on_visible();

    screen.set_draft("important");
    flaky.set_offline(true);
    assert!(matches!(screen.send_draft().await, Err(ChatError::Store(_))));
    assert_eq!(screen.draft(), "important");

    flaky.set_offline(false);
    assert!(matches!(
        screen.send_draft().await,
        Ok(SendOutcome::Sent { .. })
    ));
    assert_eq!(screen.draft(), "");
    pump_until(&mut screen, |u| matches!(u, ScreenUpdate::Messages(_))).await;
    assert_eq!(screen.messages()[0].message.text, "important");

    screen.set_draft("   ");
    assert_eq!(screen.send_draft().await.unwrap(), SendOutcome::Dropped);
    assert_eq!(screen.draft(), "");
}
