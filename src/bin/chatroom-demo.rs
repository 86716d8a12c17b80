extern crate chatroom_session;

use std::sync::Arc;

use anyhow::Result;
use futures_util::StreamExt;
use log::{info, warn};

use chatroom_session::{
    services::{config::getenv, mock_backend::MockBackend},
    ChatEvent, ChatRoomSession, EventPage, EventType, JoinResponse, OutgoingMessage,
    SessionConfig, User,
};

fn speech(id: &str, ts: i64, who: &User, body: &str) -> ChatEvent {
    ChatEvent::new(id, EventType::Speech, ts)
        .with_body(body)
        .with_user(who)
}

/// Plays the part of the chat service: an opening batch, a few polls and one
/// page of history.
fn script_room(backend: &MockBackend, room_id: &str) {
    let alice = User::new("u-alice", "alice");
    let bob = User::new("u-bob", "bob");

    backend.script_join(Ok(JoinResponse {
        room_id: room_id.into(),
        initial_events: vec![
            speech("e-1", 1_000, &alice, "kick-off in five"),
            speech("e-2", 2_000, &bob, "ready"),
        ],
        previous_events_cursor: Some("page-2".into()),
    }));
    backend.script_poll(Ok(vec![speech("e-3", 3_000, &alice, "goal!")]));
    backend.script_poll(Ok(vec![
        ChatEvent::new("e-4", EventType::Reply, 4_000)
            .with_body("what a strike")
            .with_user(&bob)
            .with_replyto(speech("e-3", 3_000, &alice, "goal!")),
        ChatEvent::new("e-5", EventType::Reaction, 4_100).with_user(&bob),
    ]));
    backend.script_poll(Ok(vec![ChatEvent::new("e-6", EventType::Remove, 5_000)
        .with_replyto(speech("e-2", 2_000, &bob, "ready"))]));
    backend.script_page(Ok(EventPage {
        events: vec![speech("e-0", 500, &alice, "warming up")],
        cursor: None,
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = env_logger::try_init();
    let config = SessionConfig::from_env()?;
    let room_id = getenv("CHATROOM_ROOM_ID").unwrap_or_else(|| {
        warn!("Could not find CHATROOM_ROOM_ID environment variable. Falling back to demo-room.");
        "demo-room".to_string()
    });

    let backend = Arc::new(MockBackend::new());
    script_room(&backend, &room_id);

    let me = User::new("u-demo", "demo");
    let poll_interval = config.poll_interval;
    let session = ChatRoomSession::new(room_id, me, backend.clone(), config)?;

    let mut signals = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(signal) = signals.next().await {
            info!("Signal: {signal:?}");
        }
    });

    session.join().await;
    tokio::time::sleep(poll_interval * 4).await;

    if let Some(newest) = session.display_events().first().cloned() {
        session.react_to_event(&newest, "like").await;
        session.set_quoted_reply(newest);
    }
    session
        .send_message(OutgoingMessage::text("hello from the demo"))
        .await;
    session.load_more().await;
    session
        .bounce_user(&User::new("u-troll", "troll"), false, Some("troll is back"))
        .await;
    session.exit_room().await;

    info!("{} backend calls made", backend.calls().len());
    println!(
        "{}",
        serde_json::to_string_pretty(&session.display_events())?
    );

    drop(session);
    printer.abort();
    Ok(())
}
