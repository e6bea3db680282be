use meshroom_core::{SessionDescription, SignalKind, UserId};
use meshroom_session::{PeerConfig, PeerState};

use crate::integration::{create_peer_harness, create_peer_harness_with, init_tracing};

#[tokio::test(start_paused = true)]
async fn test_unexpected_answer_restarts_negotiation() {
    init_tracing();
    let h = create_peer_harness("ann");
    let bob = UserId::from("bob");

    // we answered bob, so nothing of ours is pending
    h.manager
        .handle_offer(SessionDescription::offer("v=0 bob"), &bob);
    h.manager.settle(&bob).await;
    let old = h.links.latest(&bob).unwrap();

    h.manager
        .handle_answer(SessionDescription::answer("v=0 stray"), &bob);
    h.manager.settle(&bob).await;

    assert_eq!(old.close_count(), 1);
    assert_eq!(h.links.opened(&bob), 2);
    assert_eq!(h.sink.sent_to(&bob, SignalKind::Offer).await.len(), 1);
    assert_eq!(h.manager.state(&bob), Some(PeerState::Negotiating));
}

#[tokio::test(start_paused = true)]
async fn test_answer_without_session_is_dropped() {
    init_tracing();
    let h = create_peer_harness("ann");
    let bob = UserId::from("bob");

    h.manager
        .handle_answer(SessionDescription::answer("v=0 bob"), &bob);
    h.manager.settle(&bob).await;

    assert_eq!(h.links.opened(&bob), 0);
    assert!(h.sink.get_signals().await.is_empty());
    assert_eq!(h.manager.state(&bob), None);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_budget_is_bounded() {
    init_tracing();
    let h = create_peer_harness("ann");
    let bob = UserId::from("bob");

    h.manager.create_offer(&bob);
    for _ in 0..4 {
        h.manager
            .handle_answer(SessionDescription::answer("bad answer"), &bob);
    }
    h.manager.settle(&bob).await;

    // initial offer plus one per recovery
    assert_eq!(h.sink.sent_to(&bob, SignalKind::Offer).await.len(), 4);
    assert_eq!(h.manager.state(&bob), Some(PeerState::Failed));
    assert!(h.links.links_for(&bob).iter().all(|l| l.close_count() == 1));

    // further violations do not produce offers
    h.manager
        .handle_answer(SessionDescription::answer("bad answer"), &bob);
    h.manager.settle(&bob).await;
    assert_eq!(h.sink.sent_to(&bob, SignalKind::Offer).await.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_successful_answer_restores_the_budget() {
    init_tracing();
    let config = PeerConfig {
        heal_attempts: 1,
        ..PeerConfig::default()
    };
    let h = create_peer_harness_with("ann", config);
    let bob = UserId::from("bob");

    h.manager.create_offer(&bob);
    h.manager
        .handle_answer(SessionDescription::answer("bad answer"), &bob);
    h.manager
        .handle_answer(SessionDescription::answer("v=0 bob"), &bob);
    h.manager.settle(&bob).await;
    assert_eq!(h.manager.state(&bob), Some(PeerState::Connected));

    // budget is back to one: a renegotiation may fail once more and still recover
    h.manager.create_offer(&bob);
    h.manager
        .handle_answer(SessionDescription::answer("bad answer"), &bob);
    h.manager.settle(&bob).await;

    assert_eq!(h.manager.state(&bob), Some(PeerState::Negotiating));
    assert_eq!(h.sink.sent_to(&bob, SignalKind::Offer).await.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_offer_falls_back_to_our_own_offer() {
    init_tracing();
    let h = create_peer_harness("ann");
    let bob = UserId::from("bob");

    h.manager
        .handle_offer(SessionDescription::offer("bad sdp"), &bob);
    h.manager.settle(&bob).await;

    let links = h.links.links_for(&bob);
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].close_count(), 1);
    assert_eq!(links[1].close_count(), 0);
    assert_eq!(h.sink.sent_to(&bob, SignalKind::Offer).await.len(), 1);
    assert!(h.sink.sent_to(&bob, SignalKind::Answer).await.is_empty());
    assert_eq!(h.manager.state(&bob), Some(PeerState::Negotiating));
}

#[tokio::test(start_paused = true)]
async fn test_failed_answer_falls_back_to_our_own_offer() {
    init_tracing();
    let h = create_peer_harness("ann");
    let bob = UserId::from("bob");

    h.manager
        .handle_offer(SessionDescription::offer("unanswerable sdp"), &bob);
    h.manager.settle(&bob).await;

    let links = h.links.links_for(&bob);
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].close_count(), 1);
    assert_eq!(links[1].close_count(), 0);
    assert_eq!(h.sink.sent_to(&bob, SignalKind::Offer).await.len(), 1);
    assert!(h.sink.sent_to(&bob, SignalKind::Answer).await.is_empty());
    assert_eq!(h.manager.state(&bob), Some(PeerState::Negotiating));

    // bob answering our offer completes the exchange
    h.manager
        .handle_answer(SessionDescription::answer("v=0 bob"), &bob);
    h.manager.settle(&bob).await;
    assert_eq!(h.manager.state(&bob), Some(PeerState::Connected));
}
