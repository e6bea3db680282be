use meshroom_core::{Channel, UserId};
use meshroom_session::{SignalingTransport, TransportConfig, TransportEvent};

use crate::integration::{identity, init_tracing, room};
use crate::utils::{ConnectOutcome, ScriptedConnector};

#[tokio::test(start_paused = true)]
async fn test_failed_direct_subscription_fails_the_whole_attempt() {
    init_tracing();

    let connector = ScriptedConnector::new(
        vec![ConnectOutcome::FailSubscribe(1), ConnectOutcome::Accept],
        ConnectOutcome::Refuse,
    );
    let (handle, mut events) =
        SignalingTransport::spawn(connector.clone(), identity("ann"), TransportConfig::default());

    assert!(matches!(events.recv().await, Some(TransportEvent::ConnectivityChanged(true))));
    assert!(matches!(events.recv().await, Some(TransportEvent::InitialConnect)));
    assert_eq!(connector.attempts(), 2);

    let first = connector.probe(0).unwrap();
    assert!(first.is_closed(), "half-subscribed link must be closed");
    assert_eq!(first.subscriptions(), vec![Channel::Room(room())]);

    let second = connector.probe(1).unwrap();
    assert!(!second.is_closed());
    assert_eq!(
        second.subscriptions(),
        vec![Channel::Room(room()), Channel::User(UserId::from("ann"))]
    );

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_subscription_failures_count_towards_the_limit() {
    init_tracing();

    let connector = ScriptedConnector::always(ConnectOutcome::FailSubscribe(0));
    let (_handle, mut events) =
        SignalingTransport::spawn(connector.clone(), identity("ann"), TransportConfig::default());

    match events.recv().await {
        Some(TransportEvent::PermanentFailure { attempts, .. }) => assert_eq!(attempts, 5),
        other => panic!("expected permanent failure, got {other:?}"),
    }
    assert!(connector.probes().iter().all(|p| p.is_closed()));
}
