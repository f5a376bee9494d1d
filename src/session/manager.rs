//! Peer session engine
//!
//! One `SessionManager` per client context drives exactly one negotiation per
//! known remote member to a connected state, or cleans it up. All inputs
//! (relayed signaling, link callbacks, grace timers, transport loss) arrive
//! on a single event queue, so handlers run strictly one at a time and every
//! suspension point is followed by a liveness and state re-check before any
//! commit.

use crate::config::SessionConfig;
use crate::media::{LocalMediaSource, MediaKind};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::link::{LinkEvent, LinkEventSender, LinkFactory, LinkState, SdpKind};
use crate::session::peer::{NegotiationState, PeerSession};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Everything the engine reacts to.
#[derive(Debug)]
pub enum EngineEvent {
    /// A decoded message from the signaling hub.
    Signal(ServerMessage),
    /// A callback from one session's link.
    Link { peer_id: String, event: LinkEvent },
    /// The disconnect grace period armed under `epoch` ran out.
    GraceElapsed { peer_id: String, epoch: u64 },
    /// The signaling socket is gone.
    TransportClosed,
}

pub struct SessionManager {
    room_id: String,
    member_id: Option<String>,
    sessions: HashMap<String, PeerSession>,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    link_events: LinkEventSender,
    factory: Arc<dyn LinkFactory>,
    media: Arc<LocalMediaSource>,
    grace: Duration,
    closed: bool,
}

impl SessionManager {
    pub fn new(
        room_id: String,
        outbound: mpsc::UnboundedSender<ClientMessage>,
        events_tx: mpsc::UnboundedSender<EngineEvent>,
        factory: Arc<dyn LinkFactory>,
        media: Arc<LocalMediaSource>,
        config: &SessionConfig,
    ) -> Self {
        // Link callbacks land on their own channel and are folded into the
        // main queue, keeping the trait seam free of engine types.
        let (link_events, mut link_rx) = mpsc::unbounded_channel::<(String, LinkEvent)>();
        let forward = events_tx.clone();
        tokio::spawn(async move {
            while let Some((peer_id, event)) = link_rx.recv().await {
                if forward.send(EngineEvent::Link { peer_id, event }).is_err() {
                    break;
                }
            }
        });

        Self {
            room_id,
            member_id: None,
            sessions: HashMap::new(),
            outbound,
            events_tx,
            link_events,
            factory,
            media,
            grace: Duration::from_millis(config.disconnect_grace_ms),
            closed: false,
        }
    }

    /// Drains the queue until the transport is lost.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<EngineEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
            if self.closed {
                break;
            }
        }
    }

    pub async fn dispatch(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Signal(msg) => self.on_signal(msg).await,
            EngineEvent::Link { peer_id, event } => match event {
                LinkEvent::StateChanged(state) => self.on_link_state(&peer_id, state).await,
                LinkEvent::LocalCandidate(candidate) => {
                    // Candidate discovery is uncorrelated with negotiation
                    // state; each one is forwarded as it fires.
                    let _ = self.outbound.send(ClientMessage::IceCandidate {
                        target: peer_id,
                        candidate,
                    });
                }
            },
            EngineEvent::GraceElapsed { peer_id, epoch } => {
                self.on_grace_elapsed(&peer_id, epoch).await
            }
            EngineEvent::TransportClosed => {
                tracing::warn!("Signaling transport lost, tearing down all sessions");
                self.teardown_all().await;
                self.media.release();
                self.closed = true;
            }
        }
    }

    async fn on_signal(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Connected { member_id } => {
                tracing::info!(member_id = %member_id, room_id = %self.room_id, "Joining room");
                self.member_id = Some(member_id);
                let _ = self.outbound.send(ClientMessage::Join {
                    room_id: self.room_id.clone(),
                });
            }
            ServerMessage::ExistingUsers { users } => {
                // The joining side offers to everyone already present; the
                // notified side only answers.
                for peer_id in users {
                    self.initiate(&peer_id).await;
                }
            }
            ServerMessage::UserJoined { member_id } => {
                tracing::info!(peer_id = %member_id, "Peer joined, awaiting their offer");
            }
            ServerMessage::UserLeft { member_id } => {
                self.teardown(&member_id).await;
            }
            ServerMessage::Offer { from, sdp } => self.on_remote_offer(&from, &sdp).await,
            ServerMessage::Answer { from, sdp } => self.on_remote_answer(&from, &sdp).await,
            ServerMessage::IceCandidate { from, candidate } => {
                self.on_remote_candidate(&from, &candidate).await
            }
            ServerMessage::HeartbeatAck => {}
            // Broadcast-channel traffic is handled by the application layer,
            // not the negotiation engine.
            ServerMessage::StreamStarted { .. }
            | ServerMessage::StreamEnded
            | ServerMessage::Chat { .. }
            | ServerMessage::ViewerCount { .. } => {}
        }
    }

    /// Starts a negotiation toward `peer_id`. Only legal from `Stable`; the
    /// offer is discarded if the state moved while it was being created.
    async fn initiate(&mut self, peer_id: &str) {
        if !self.ensure_session(peer_id).await {
            return;
        }

        let (observed, link) = {
            let Some(session) = self.sessions.get(peer_id) else {
                return;
            };
            if session.negotiation() != NegotiationState::Stable {
                tracing::warn!(
                    peer_id = %peer_id,
                    state = ?session.negotiation(),
                    "Not initiating, negotiation already in progress"
                );
                return;
            }
            (NegotiationState::Stable, session.link.clone())
        };

        let offer = match link.create_offer().await {
            Ok(offer) => offer,
            Err(err) => {
                tracing::warn!(peer_id = %peer_id, error = %err, "Offer creation failed");
                return;
            }
        };

        let Some(session) = self.sessions.get(peer_id) else {
            tracing::warn!(peer_id = %peer_id, "Session gone before offer could apply");
            return;
        };
        if session.negotiation() != observed {
            tracing::warn!(peer_id = %peer_id, "State moved while creating offer, discarding");
            return;
        }
        if let Err(err) = link.set_local(SdpKind::Offer, &offer).await {
            tracing::warn!(peer_id = %peer_id, error = %err, "Applying local offer failed");
            return;
        }

        let Some(session) = self.sessions.get_mut(peer_id) else {
            return;
        };
        if !session.commit(observed, NegotiationState::HaveLocalOffer) {
            tracing::warn!(peer_id = %peer_id, "State moved while applying offer, discarding");
            return;
        }

        let _ = self.outbound.send(ClientMessage::Offer {
            target: peer_id.to_string(),
            sdp: offer,
        });
    }

    async fn on_remote_offer(&mut self, from: &str, sdp: &str) {
        if !self.ensure_session(from).await {
            return;
        }

        let (observed, link) = {
            let Some(session) = self.sessions.get(from) else {
                return;
            };
            match session.negotiation() {
                NegotiationState::HaveRemoteOffer => {
                    // Glare: a competing offer while one is already pending
                    // is dropped rather than tie-broken.
                    tracing::warn!(peer_id = %from, "Dropping offer, one is already pending");
                    return;
                }
                NegotiationState::Closed => return,
                state => (state, session.link.clone()),
            }
        };

        if let Err(err) = link.set_remote(SdpKind::Offer, sdp).await {
            tracing::warn!(peer_id = %from, error = %err, "Applying remote offer failed");
            return;
        }
        {
            let Some(session) = self.sessions.get_mut(from) else {
                return;
            };
            if !session.commit(observed, NegotiationState::HaveRemoteOffer) {
                tracing::warn!(peer_id = %from, "State moved while applying remote offer");
                return;
            }
        }

        let answer = match link.create_answer().await {
            Ok(answer) => answer,
            Err(err) => {
                tracing::warn!(peer_id = %from, error = %err, "Answer creation failed");
                return;
            }
        };

        let Some(session) = self.sessions.get(from) else {
            return;
        };
        if session.negotiation() != NegotiationState::HaveRemoteOffer {
            tracing::warn!(peer_id = %from, "State moved while creating answer, discarding");
            return;
        }
        if let Err(err) = link.set_local(SdpKind::Answer, &answer).await {
            tracing::warn!(peer_id = %from, error = %err, "Applying local answer failed");
            return;
        }

        let Some(session) = self.sessions.get_mut(from) else {
            return;
        };
        if !session.commit(NegotiationState::HaveRemoteOffer, NegotiationState::Stable) {
            tracing::warn!(peer_id = %from, "State moved while applying answer, discarding");
            return;
        }

        let _ = self.outbound.send(ClientMessage::Answer {
            target: from.to_string(),
            sdp: answer,
        });
    }

    async fn on_remote_answer(&mut self, from: &str, sdp: &str) {
        let Some(session) = self.sessions.get(from) else {
            tracing::warn!(peer_id = %from, "Answer for unknown session ignored");
            return;
        };
        if session.negotiation() != NegotiationState::HaveLocalOffer {
            // Stale or duplicate answer; must not move the state.
            tracing::warn!(
                peer_id = %from,
                state = ?session.negotiation(),
                "Ignoring answer without a pending local offer"
            );
            return;
        }
        let link = session.link.clone();

        if let Err(err) = link.set_remote(SdpKind::Answer, sdp).await {
            tracing::warn!(peer_id = %from, error = %err, "Applying remote answer failed");
            return;
        }

        let Some(session) = self.sessions.get_mut(from) else {
            return;
        };
        if !session.commit(NegotiationState::HaveLocalOffer, NegotiationState::Stable) {
            tracing::warn!(peer_id = %from, "State moved while applying remote answer");
        }
    }

    async fn on_remote_candidate(&mut self, from: &str, candidate: &str) {
        // Candidates may outrun the offer; the session is created on first
        // contact and the link queues until a remote description lands.
        if !self.ensure_session(from).await {
            return;
        }
        let Some(session) = self.sessions.get(from) else {
            return;
        };
        let link = session.link.clone();
        if let Err(err) = link.add_remote_candidate(candidate).await {
            tracing::warn!(peer_id = %from, error = %err, "Rejected remote candidate");
        }
    }

    async fn on_link_state(&mut self, peer_id: &str, state: LinkState) {
        let epoch = {
            let Some(session) = self.sessions.get_mut(peer_id) else {
                return;
            };
            session.set_link_state(state)
        };
        tracing::debug!(peer_id = %peer_id, state = ?state, "Link state changed");

        if state.is_fatal() {
            self.teardown(peer_id).await;
        } else if state == LinkState::Disconnected {
            let tx = self.events_tx.clone();
            let peer = peer_id.to_string();
            let grace = self.grace;
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                let _ = tx.send(EngineEvent::GraceElapsed {
                    peer_id: peer,
                    epoch,
                });
            });
        }
    }

    /// The timer only proposes; current state decides. A session that
    /// recovered (or bounced) since the timer was armed is left alone.
    async fn on_grace_elapsed(&mut self, peer_id: &str, epoch: u64) {
        let expired = match self.sessions.get(peer_id) {
            Some(session) => {
                session.link_state() == LinkState::Disconnected && session.epoch() == epoch
            }
            None => false,
        };
        if expired {
            tracing::info!(peer_id = %peer_id, "Disconnected past the grace period");
            self.teardown(peer_id).await;
        }
    }

    /// Removes the session and closes its link. Tearing down an absent peer
    /// is a harmless no-op.
    pub async fn teardown(&mut self, peer_id: &str) {
        match self.sessions.remove(peer_id) {
            Some(mut session) => {
                session.force(NegotiationState::Closed);
                session.link.close().await;
                tracing::info!(peer_id = %peer_id, "Session torn down");
            }
            None => {
                tracing::debug!(peer_id = %peer_id, "Teardown for absent session");
            }
        }
    }

    async fn teardown_all(&mut self) {
        let peers: Vec<String> = self.sessions.keys().cloned().collect();
        for peer_id in peers {
            self.teardown(&peer_id).await;
        }
    }

    /// Leaves the room: every session goes down and the media source stops.
    pub async fn leave(&mut self) {
        let _ = self.outbound.send(ClientMessage::Leave {
            room_id: self.room_id.clone(),
        });
        self.teardown_all().await;
        self.media.release();
    }

    /// Local-only toggle; no renegotiation, no network side effect. Returns
    /// `false` when the source has no component of that kind.
    pub fn set_media_enabled(&self, kind: MediaKind, enabled: bool) -> bool {
        self.media.set_enabled(kind, enabled)
    }

    async fn ensure_session(&mut self, peer_id: &str) -> bool {
        if self.sessions.contains_key(peer_id) {
            return true;
        }
        match self
            .factory
            .create(peer_id, self.link_events.clone(), &self.media)
            .await
        {
            Ok(link) => {
                self.sessions
                    .insert(peer_id.to_string(), PeerSession::new(peer_id.to_string(), link));
                tracing::info!(peer_id = %peer_id, "Session created");
                true
            }
            Err(err) => {
                tracing::warn!(peer_id = %peer_id, error = %err, "Link creation failed");
                false
            }
        }
    }

    pub fn member_id(&self) -> Option<&str> {
        self.member_id.as_deref()
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn negotiation_of(&self, peer_id: &str) -> Option<NegotiationState> {
        self.sessions.get(peer_id).map(|s| s.negotiation())
    }

    pub fn link_state_of(&self, peer_id: &str) -> Option<LinkState> {
        self.sessions.get(peer_id).map(|s| s.link_state())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
