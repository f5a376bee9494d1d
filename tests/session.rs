//! Session engine semantics against a scripted link, with no real peer
//! connection behind it.

use async_trait::async_trait;
use roomcast::config::SessionConfig;
use roomcast::error::LinkError;
use roomcast::media::{LocalMediaSource, MediaComponent, MediaKind};
use roomcast::protocol::{ClientMessage, ServerMessage};
use roomcast::session::{
    EngineEvent, LinkEvent, LinkEventSender, LinkFactory, LinkState, NegotiationState, PeerLink,
    SdpKind, SessionManager,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

struct ScriptedLink {
    calls: Mutex<Vec<String>>,
    fail_create_answer: bool,
}

impl ScriptedLink {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }
}

#[async_trait]
impl PeerLink for ScriptedLink {
    async fn create_offer(&self) -> Result<String, LinkError> {
        self.record("create_offer");
        Ok("sdp-offer".to_string())
    }

    async fn create_answer(&self) -> Result<String, LinkError> {
        self.record("create_answer");
        if self.fail_create_answer {
            return Err(LinkError::Closed);
        }
        Ok("sdp-answer".to_string())
    }

    async fn set_local(&self, kind: SdpKind, _sdp: &str) -> Result<(), LinkError> {
        self.record(format!("set_local:{kind:?}"));
        Ok(())
    }

    async fn set_remote(&self, kind: SdpKind, _sdp: &str) -> Result<(), LinkError> {
        self.record(format!("set_remote:{kind:?}"));
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: &str) -> Result<(), LinkError> {
        self.record(format!("candidate:{candidate}"));
        Ok(())
    }

    async fn close(&self) {
        self.record("close");
    }
}

#[derive(Default)]
struct ScriptedFactory {
    fail_create_answer: bool,
    links: Mutex<HashMap<String, Arc<ScriptedLink>>>,
}

impl ScriptedFactory {
    fn link(&self, peer_id: &str) -> Arc<ScriptedLink> {
        self.links
            .lock()
            .unwrap()
            .get(peer_id)
            .expect("no link created for peer")
            .clone()
    }
}

#[async_trait]
impl LinkFactory for ScriptedFactory {
    async fn create(
        &self,
        peer_id: &str,
        _events: LinkEventSender,
        _media: &LocalMediaSource,
    ) -> Result<Arc<dyn PeerLink>, LinkError> {
        let link = Arc::new(ScriptedLink {
            calls: Mutex::new(Vec::new()),
            fail_create_answer: self.fail_create_answer,
        });
        self.links
            .lock()
            .unwrap()
            .insert(peer_id.to_string(), link.clone());
        Ok(link)
    }
}

struct Harness {
    manager: SessionManager,
    factory: Arc<ScriptedFactory>,
    media: Arc<LocalMediaSource>,
    out_rx: UnboundedReceiver<ClientMessage>,
    ev_tx: UnboundedSender<EngineEvent>,
    ev_rx: UnboundedReceiver<EngineEvent>,
}

fn harness_with(factory: ScriptedFactory) -> Harness {
    let factory = Arc::new(factory);
    let media = Arc::new(LocalMediaSource::new(vec![
        MediaComponent::new(MediaKind::Audio, "mic"),
        MediaComponent::new(MediaKind::Video, "camera"),
    ]));
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (ev_tx, ev_rx) = mpsc::unbounded_channel();
    let manager = SessionManager::new(
        "abc123".to_string(),
        out_tx,
        ev_tx.clone(),
        factory.clone(),
        media.clone(),
        &SessionConfig::default(),
    );
    Harness {
        manager,
        factory,
        media,
        out_rx,
        ev_tx,
        ev_rx,
    }
}

fn harness() -> Harness {
    harness_with(ScriptedFactory::default())
}

fn drain(rx: &mut UnboundedReceiver<ClientMessage>) -> Vec<ClientMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

async fn signal(h: &mut Harness, msg: ServerMessage) {
    h.manager.dispatch(EngineEvent::Signal(msg)).await;
}

async fn link_state(h: &mut Harness, peer: &str, state: LinkState) {
    h.manager
        .dispatch(EngineEvent::Link {
            peer_id: peer.to_string(),
            event: LinkEvent::StateChanged(state),
        })
        .await;
}

#[tokio::test]
async fn newcomer_offers_to_every_existing_member() {
    let mut h = harness();

    signal(
        &mut h,
        ServerMessage::Connected {
            member_id: "me".into(),
        },
    )
    .await;
    assert!(matches!(
        drain(&mut h.out_rx).as_slice(),
        [ClientMessage::Join { room_id }] if room_id == "abc123"
    ));

    signal(
        &mut h,
        ServerMessage::ExistingUsers {
            users: vec!["peer-a".into(), "peer-b".into()],
        },
    )
    .await;

    assert_eq!(h.manager.session_count(), 2);
    for peer in ["peer-a", "peer-b"] {
        assert_eq!(
            h.manager.negotiation_of(peer),
            Some(NegotiationState::HaveLocalOffer)
        );
        assert_eq!(
            h.factory.link(peer).calls(),
            vec!["create_offer", "set_local:Offer"]
        );
    }

    let sent = drain(&mut h.out_rx);
    let offer_targets: Vec<&str> = sent
        .iter()
        .filter_map(|m| match m {
            ClientMessage::Offer { target, .. } => Some(target.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(offer_targets, vec!["peer-a", "peer-b"]);
}

#[tokio::test]
async fn member_with_empty_room_initiates_toward_no_one() {
    let mut h = harness();
    signal(
        &mut h,
        ServerMessage::Connected {
            member_id: "me".into(),
        },
    )
    .await;
    signal(&mut h, ServerMessage::ExistingUsers { users: vec![] }).await;
    assert_eq!(h.manager.session_count(), 0);

    // The join notification alone never starts a negotiation.
    signal(
        &mut h,
        ServerMessage::UserJoined {
            member_id: "late".into(),
        },
    )
    .await;
    assert_eq!(h.manager.session_count(), 0);
}

#[tokio::test]
async fn incoming_offer_is_answered_to_stable() {
    let mut h = harness();

    signal(
        &mut h,
        ServerMessage::Offer {
            from: "caller".into(),
            sdp: "v=0".into(),
        },
    )
    .await;

    assert_eq!(
        h.manager.negotiation_of("caller"),
        Some(NegotiationState::Stable)
    );
    assert_eq!(
        h.factory.link("caller").calls(),
        vec!["set_remote:Offer", "create_answer", "set_local:Answer"]
    );
    assert!(matches!(
        drain(&mut h.out_rx).as_slice(),
        [ClientMessage::Answer { target, sdp }] if target == "caller" && sdp == "sdp-answer"
    ));
}

#[tokio::test]
async fn full_negotiation_reaches_stable_and_connected() {
    let mut h = harness();
    signal(
        &mut h,
        ServerMessage::ExistingUsers {
            users: vec!["peer-a".into()],
        },
    )
    .await;

    signal(
        &mut h,
        ServerMessage::Answer {
            from: "peer-a".into(),
            sdp: "v=0".into(),
        },
    )
    .await;
    assert_eq!(
        h.manager.negotiation_of("peer-a"),
        Some(NegotiationState::Stable)
    );

    link_state(&mut h, "peer-a", LinkState::Connecting).await;
    link_state(&mut h, "peer-a", LinkState::Connected).await;
    assert_eq!(h.manager.link_state_of("peer-a"), Some(LinkState::Connected));
    assert_eq!(h.manager.session_count(), 1);
}

#[tokio::test]
async fn stale_answer_is_ignored_without_state_change() {
    let mut h = harness();

    // Answer for a peer we never spoke to: no session appears.
    signal(
        &mut h,
        ServerMessage::Answer {
            from: "stranger".into(),
            sdp: "v=0".into(),
        },
    )
    .await;
    assert_eq!(h.manager.session_count(), 0);

    // Duplicate answer after negotiation settled: state must not move.
    signal(
        &mut h,
        ServerMessage::ExistingUsers {
            users: vec!["peer-a".into()],
        },
    )
    .await;
    signal(
        &mut h,
        ServerMessage::Answer {
            from: "peer-a".into(),
            sdp: "v=0".into(),
        },
    )
    .await;
    signal(
        &mut h,
        ServerMessage::Answer {
            from: "peer-a".into(),
            sdp: "v=0 again".into(),
        },
    )
    .await;

    assert_eq!(
        h.manager.negotiation_of("peer-a"),
        Some(NegotiationState::Stable)
    );
    assert_eq!(h.factory.link("peer-a").count("set_remote:Answer"), 1);
}

#[tokio::test]
async fn competing_offer_is_dropped_while_one_is_pending() {
    let mut h = harness_with(ScriptedFactory {
        fail_create_answer: true,
        ..Default::default()
    });

    // The failed answer leaves the session parked in HaveRemoteOffer.
    signal(
        &mut h,
        ServerMessage::Offer {
            from: "caller".into(),
            sdp: "first".into(),
        },
    )
    .await;
    assert_eq!(
        h.manager.negotiation_of("caller"),
        Some(NegotiationState::HaveRemoteOffer)
    );

    signal(
        &mut h,
        ServerMessage::Offer {
            from: "caller".into(),
            sdp: "second".into(),
        },
    )
    .await;

    assert_eq!(
        h.manager.negotiation_of("caller"),
        Some(NegotiationState::HaveRemoteOffer)
    );
    assert_eq!(h.factory.link("caller").count("set_remote:Offer"), 1);
    assert!(drain(&mut h.out_rx).is_empty());
}

#[tokio::test]
async fn teardown_is_idempotent() {
    let mut h = harness();
    signal(
        &mut h,
        ServerMessage::ExistingUsers {
            users: vec!["peer-a".into()],
        },
    )
    .await;
    assert_eq!(h.manager.session_count(), 1);

    signal(
        &mut h,
        ServerMessage::UserLeft {
            member_id: "peer-a".into(),
        },
    )
    .await;
    signal(
        &mut h,
        ServerMessage::UserLeft {
            member_id: "peer-a".into(),
        },
    )
    .await;

    assert_eq!(h.manager.session_count(), 0);
    assert_eq!(h.factory.link("peer-a").count("close"), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_recovering_within_grace_survives() {
    let mut h = harness();
    signal(
        &mut h,
        ServerMessage::ExistingUsers {
            users: vec!["peer-a".into()],
        },
    )
    .await;

    link_state(&mut h, "peer-a", LinkState::Disconnected).await;
    tokio::time::advance(Duration::from_secs(2)).await;
    link_state(&mut h, "peer-a", LinkState::Connected).await;

    // Let the armed timer fire and prove it is ignored.
    tokio::time::advance(Duration::from_secs(2)).await;
    let event = h.ev_rx.recv().await.expect("grace timer event");
    h.manager.dispatch(event).await;

    assert_eq!(h.manager.session_count(), 1);
    assert_eq!(h.manager.link_state_of("peer-a"), Some(LinkState::Connected));
}

#[tokio::test(start_paused = true)]
async fn disconnect_past_grace_tears_down_exactly_once() {
    let mut h = harness();
    signal(
        &mut h,
        ServerMessage::ExistingUsers {
            users: vec!["peer-a".into()],
        },
    )
    .await;

    link_state(&mut h, "peer-a", LinkState::Disconnected).await;
    tokio::time::advance(Duration::from_millis(3100)).await;
    let event = h.ev_rx.recv().await.expect("grace timer event");
    h.manager.dispatch(event).await;

    assert_eq!(h.manager.session_count(), 0);
    assert_eq!(h.factory.link("peer-a").count("close"), 1);

    // A straggling timer for the same peer changes nothing.
    h.manager
        .dispatch(EngineEvent::GraceElapsed {
            peer_id: "peer-a".into(),
            epoch: 99,
        })
        .await;
    assert_eq!(h.factory.link("peer-a").count("close"), 1);
}

#[tokio::test]
async fn failed_link_tears_down_immediately() {
    let mut h = harness();
    signal(
        &mut h,
        ServerMessage::ExistingUsers {
            users: vec!["peer-a".into()],
        },
    )
    .await;

    link_state(&mut h, "peer-a", LinkState::Failed).await;

    assert_eq!(h.manager.session_count(), 0);
    assert_eq!(h.factory.link("peer-a").count("close"), 1);
}

#[tokio::test]
async fn candidates_flow_in_both_directions() {
    let mut h = harness();

    // A remote candidate may outrun its offer; the session is created for it.
    signal(
        &mut h,
        ServerMessage::IceCandidate {
            from: "early".into(),
            candidate: "cand-1".into(),
        },
    )
    .await;
    assert_eq!(h.manager.session_count(), 1);
    assert_eq!(h.factory.link("early").calls(), vec!["candidate:cand-1"]);

    // A locally discovered candidate is relayed to its owning peer.
    h.manager
        .dispatch(EngineEvent::Link {
            peer_id: "early".into(),
            event: LinkEvent::LocalCandidate("cand-2".into()),
        })
        .await;
    assert!(matches!(
        drain(&mut h.out_rx).as_slice(),
        [ClientMessage::IceCandidate { target, candidate }]
            if target == "early" && candidate == "cand-2"
    ));
}

#[tokio::test]
async fn media_toggle_has_no_network_side_effect() {
    let mut h = harness();
    signal(
        &mut h,
        ServerMessage::ExistingUsers {
            users: vec!["peer-a".into()],
        },
    )
    .await;
    drain(&mut h.out_rx);

    assert!(h.manager.set_media_enabled(MediaKind::Video, false));
    assert!(!h.media.components(MediaKind::Video)[0].is_enabled());
    assert!(h.media.components(MediaKind::Audio)[0].is_enabled());

    assert_eq!(
        h.manager.negotiation_of("peer-a"),
        Some(NegotiationState::HaveLocalOffer)
    );
    assert_eq!(h.manager.session_count(), 1);
    assert!(drain(&mut h.out_rx).is_empty());
}

#[tokio::test]
async fn transport_loss_cleans_up_everything() {
    let mut h = harness();
    signal(
        &mut h,
        ServerMessage::ExistingUsers {
            users: vec!["peer-a".into(), "peer-b".into()],
        },
    )
    .await;
    assert_eq!(h.manager.session_count(), 2);

    h.manager.dispatch(EngineEvent::TransportClosed).await;

    assert!(h.manager.is_closed());
    assert_eq!(h.manager.session_count(), 0);
    assert_eq!(h.factory.link("peer-a").count("close"), 1);
    assert_eq!(h.factory.link("peer-b").count("close"), 1);
    for component in h.media.all_components() {
        assert!(component.is_stopped());
    }
    // No leave message goes out; the hub learns from its own socket.
    let sent = drain(&mut h.out_rx);
    assert!(
        !sent
            .iter()
            .any(|m| matches!(m, ClientMessage::Leave { .. })),
        "{sent:?}"
    );
}

#[tokio::test]
async fn leave_notifies_and_releases() {
    let mut h = harness();
    signal(
        &mut h,
        ServerMessage::ExistingUsers {
            users: vec!["peer-a".into()],
        },
    )
    .await;
    drain(&mut h.out_rx);

    h.manager.leave().await;

    assert_eq!(h.manager.session_count(), 0);
    let sent = drain(&mut h.out_rx);
    assert!(matches!(
        sent.as_slice(),
        [ClientMessage::Leave { room_id }] if room_id == "abc123"
    ));
    for component in h.media.all_components() {
        assert!(component.is_stopped());
    }
    let _ = &h.ev_tx;
}
