use meshroom_core::{Channel, UserId};
use meshroom_session::{SignalingTransport, TransportConfig, TransportEvent};

use crate::integration::{identity, init_tracing, room};
use crate::utils::{ConnectOutcome, ScriptedConnector};

#[tokio::test(start_paused = true)]
async fn test_reconnect_resubscribes_and_announces_initial_connect_once() {
    init_tracing();

    let connector = ScriptedConnector::always(ConnectOutcome::Accept);
    let (handle, mut events) =
        SignalingTransport::spawn(connector.clone(), identity("ann"), TransportConfig::default());

    assert!(matches!(events.recv().await, Some(TransportEvent::ConnectivityChanged(true))));
    assert!(matches!(events.recv().await, Some(TransportEvent::InitialConnect)));
    assert!(handle.is_connected());

    for drop_index in 0..2 {
        connector.probe(drop_index).unwrap().sever();

        assert!(matches!(events.recv().await, Some(TransportEvent::ConnectivityChanged(false))));
        assert!(!handle.is_connected());
        assert!(matches!(events.recv().await, Some(TransportEvent::ConnectivityChanged(true))));
        assert!(handle.is_connected());
    }

    let expected = vec![Channel::Room(room()), Channel::User(UserId::from("ann"))];
    let probes = connector.probes();
    assert_eq!(probes.len(), 3);
    for probe in &probes {
        assert_eq!(probe.subscriptions(), expected);
    }

    handle.shutdown().await;

    while let Ok(event) = events.try_recv() {
        assert!(
            !matches!(event, TransportEvent::InitialConnect),
            "initial-connect fired on a reconnect"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_successful_connection_resets_failure_count() {
    init_tracing();

    let connector = ScriptedConnector::new(
        vec![
            ConnectOutcome::Refuse,
            ConnectOutcome::Refuse,
            ConnectOutcome::Refuse,
            ConnectOutcome::Refuse,
            ConnectOutcome::Accept,
        ],
        ConnectOutcome::Refuse,
    );
    let (_handle, mut events) =
        SignalingTransport::spawn(connector.clone(), identity("ann"), TransportConfig::default());

    assert!(matches!(events.recv().await, Some(TransportEvent::ConnectivityChanged(true))));
    assert!(matches!(events.recv().await, Some(TransportEvent::InitialConnect)));
    assert_eq!(connector.attempts(), 5);

    connector.probe(0).unwrap().sever();
    assert!(matches!(events.recv().await, Some(TransportEvent::ConnectivityChanged(false))));

    match events.recv().await {
        Some(TransportEvent::PermanentFailure { attempts, .. }) => assert_eq!(attempts, 5),
        other => panic!("expected permanent failure, got {other:?}"),
    }
    assert_eq!(connector.attempts(), 10);
}
