use std::time::Duration;

use bytes::Bytes;
use meshroom_core::{ChatBody, ChatMessage, ClientFrame, Destination, UserId};
use meshroom_relay::RelayService;
use meshroom_session::{SessionError, SessionEvent};

use crate::integration::{init_tracing, room, start_session};

#[tokio::test(start_paused = true)]
async fn test_chat_reaches_everyone_exactly_once() {
    init_tracing();
    let relay = RelayService::new();
    let ann = start_session(&relay, "ann").await;
    let bob = start_session(&relay, "bob").await;

    eventually!(Duration::from_secs(5), ann.session.is_connected() && bob.session.is_connected());

    // our own message is logged from the room echo, like everyone else's
    let sent = ann.session.send_chat("hello bob").unwrap();

    eventually!(Duration::from_secs(5), ann.count(&sent).await == 1 && bob.count(&sent).await == 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(ann.count(&sent).await, 1);
    assert_eq!(bob.count(&sent).await, 1);

    let received = bob
        .session
        .messages()
        .await
        .into_iter()
        .find(|m| m.key() == sent.key())
        .unwrap();
    assert_eq!(received.sender_name, "ANN");
    assert_eq!(
        received.body,
        ChatBody::Chat {
            content: "hello bob".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_replayed_broadcast_is_logged_once() {
    init_tracing();
    let relay = RelayService::new();
    let ann = start_session(&relay, "ann").await;
    let mut events = ann.session.subscribe();

    eventually!(Duration::from_secs(5), ann.session.is_connected());

    let cid = UserId::from("cid");
    let replayed = ChatMessage::chat(room(), cid.clone(), "CID", "once").with_timestamp(42);
    for _ in 0..3 {
        relay
            .handle_frame(
                &cid,
                ClientFrame::Publish {
                    destination: Destination::ChatSend,
                    body: replayed.to_wire().unwrap(),
                },
            )
            .unwrap();
    }

    eventually!(Duration::from_secs(5), ann.count(&replayed).await == 1);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(ann.count(&replayed).await, 1);

    let mut announced = 0;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Message(message) = event {
            if message.key() == replayed.key() {
                announced += 1;
            }
        }
    }
    assert_eq!(announced, 1);
}

#[tokio::test(start_paused = true)]
async fn test_image_is_uploaded_then_announced() {
    init_tracing();
    let relay = RelayService::new();
    let ann = start_session(&relay, "ann").await;
    let bob = start_session(&relay, "bob").await;

    let sent = ann
        .session
        .send_image("cat.png", Bytes::from_static(b"\x89PNG"))
        .await
        .unwrap();

    assert_eq!(ann.uploads.uploads(), vec![("cat.png".to_owned(), 4)]);
    assert_eq!(
        sent.body,
        ChatBody::Image {
            image_url: "https://cdn.test/room-1/cat.png".into(),
            caption: "Sent an image".into(),
        }
    );

    eventually!(Duration::from_secs(5), bob.count(&sent).await == 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_upload_sends_nothing() {
    init_tracing();
    let relay = RelayService::new();
    let ann = start_session(&relay, "ann").await;
    let bob = start_session(&relay, "bob").await;

    eventually!(Duration::from_secs(5), ann.session.is_connected() && bob.session.is_connected());

    let result = ann.session.send_image("empty.png", Bytes::new()).await;
    assert!(matches!(result, Err(SessionError::Upload(_))));

    tokio::time::sleep(Duration::from_secs(1)).await;
    let images = bob
        .session
        .messages()
        .await
        .into_iter()
        .filter(|m| matches!(m.body, ChatBody::Image { .. }))
        .count();
    assert_eq!(images, 0);
}
