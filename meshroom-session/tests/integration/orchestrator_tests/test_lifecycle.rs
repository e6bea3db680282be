use std::sync::Arc;
use std::time::Duration;

use meshroom_core::UserId;
use meshroom_session::{
    SessionConfig, SessionDeps, SessionError, SessionEvent, SessionOrchestrator,
};

use crate::integration::{init_tracing, room, start_session_with};
use crate::utils::{
    ConnectOutcome, FakeLinkFactory, MockMediaSource, MockMembership, MockUpload,
    ScriptedConnector,
};

fn deps(
    connector: Arc<ScriptedConnector>,
    media: MockMediaSource,
    membership: MockMembership,
) -> SessionDeps {
    SessionDeps {
        connector,
        links: Arc::new(FakeLinkFactory::new()),
        media: Arc::new(media),
        membership: Arc::new(membership),
        uploads: Arc::new(MockUpload::new()),
    }
}

#[tokio::test(start_paused = true)]
async fn test_denied_media_aborts_before_connecting() {
    init_tracing();
    let connector = ScriptedConnector::always(ConnectOutcome::Accept);
    let membership = MockMembership::new();
    let media = MockMediaSource::denied();

    let config = SessionConfig::new(room(), UserId::from("ann"), "ANN");
    let result =
        SessionOrchestrator::start(config, deps(connector.clone(), media.clone(), membership.clone())).await;

    assert!(matches!(result, Err(SessionError::Media(_))));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(media.captures(), 1);
    assert_eq!(connector.attempts(), 0);
    assert!(membership.joins().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_refused_membership_fails_the_start() {
    init_tracing();
    let connector = ScriptedConnector::always(ConnectOutcome::Accept);

    let config = SessionConfig::new(room(), UserId::from("ann"), "ANN");
    let result = SessionOrchestrator::start(
        config,
        deps(connector.clone(), MockMediaSource::new(), MockMembership::refusing()),
    )
    .await;

    assert!(matches!(result, Err(SessionError::Membership(_))));
    tokio::time::sleep(Duration::from_secs(5)).await;
    for probe in connector.probes() {
        assert!(probe.is_closed());
        assert!(probe.published().is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_is_rejected() {
    init_tracing();
    let connector = ScriptedConnector::always(ConnectOutcome::Accept);
    let media = MockMediaSource::new();

    let config = SessionConfig::new(room(), UserId::from(""), "ANN");
    let result = SessionOrchestrator::start(config, deps(connector, media.clone(), MockMembership::new())).await;

    assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    assert_eq!(media.captures(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_signaling_ends_the_session() {
    init_tracing();
    let connector = ScriptedConnector::always(ConnectOutcome::Refuse);
    let ann = start_session_with(connector.clone(), "ann", MockMembership::new()).await;
    let mut events = ann.session.subscribe();

    let fatal = tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Fatal { reason }) => return reason,
                Ok(_) => continue,
                Err(e) => panic!("event bus closed: {e}"),
            }
        }
    })
    .await
    .expect("no fatal event");

    assert!(fatal.contains('5'), "reason should name the attempts: {fatal}");
    // our JOIN never left
    assert!(fatal.contains("1 messages undelivered"), "reason should count lost messages: {fatal}");
    assert_eq!(connector.attempts(), 5);
    assert!(!ann.session.is_connected());
    ann.session.leave().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_participants_fetched_once_on_first_connect() {
    init_tracing();
    let connector = ScriptedConnector::always(ConnectOutcome::Accept);
    let membership = MockMembership::with_participants(&["ann", "bob"]);
    let ann = start_session_with(connector.clone(), "ann", membership.clone()).await;

    eventually!(Duration::from_secs(5), ann.session.participants() == vec![UserId::from("ann"), UserId::from("bob")]);
    assert_eq!(membership.joins(), vec![(room(), UserId::from("ann"))]);

    connector.probe(0).unwrap().sever();
    eventually!(Duration::from_secs(10), connector.probes().len() == 2 && ann.session.is_connected());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(membership.fetches(), 1);

    // our JOIN went out on the first connection only
    let joins: usize = connector
        .probes()
        .iter()
        .map(|p| {
            p.published()
                .iter()
                .filter(|(d, _)| *d == meshroom_core::Destination::ChatJoin)
                .count()
        })
        .sum();
    assert_eq!(joins, 1);
}

#[tokio::test(start_paused = true)]
async fn test_leave_announces_and_releases() {
    init_tracing();
    let connector = ScriptedConnector::always(ConnectOutcome::Accept);
    let ann = start_session_with(connector.clone(), "ann", MockMembership::new()).await;
    eventually!(Duration::from_secs(5), ann.session.is_connected());

    ann.session.leave().await.unwrap();

    let probe = connector.probe(0).unwrap();
    let destinations: Vec<_> = probe.published().into_iter().map(|(d, _)| d).collect();
    assert_eq!(
        destinations,
        vec![
            meshroom_core::Destination::ChatJoin,
            meshroom_core::Destination::ChatLeave
        ]
    );
    assert!(probe.is_closed());
    assert!(ann.session.send_chat("anyone?").is_err());
}
