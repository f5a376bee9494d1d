//! Per-peer session state
//!
//! Every asynchronous negotiation step observes the state it started from and
//! commits only if that state is still current when the step's continuation
//! runs. Intervening events (a competing offer, a teardown) make the commit
//! fail and the step is discarded.

use crate::session::link::{LinkState, PeerLink};
use std::sync::Arc;

/// Offer/answer position of one session, mirroring the standard state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

/// One remote member's session: the negotiation handle plus both state axes.
pub struct PeerSession {
    pub peer_id: String,
    pub link: Arc<dyn PeerLink>,
    negotiation: NegotiationState,
    link_state: LinkState,
    /// Bumped on every link-state change; outstanding grace timers carry the
    /// epoch they were armed under and are ignored once it moves on.
    epoch: u64,
}

impl PeerSession {
    pub fn new(peer_id: String, link: Arc<dyn PeerLink>) -> Self {
        Self {
            peer_id,
            link,
            negotiation: NegotiationState::Stable,
            link_state: LinkState::New,
            epoch: 0,
        }
    }

    pub fn negotiation(&self) -> NegotiationState {
        self.negotiation
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Commits a negotiation transition if the state observed when the step
    /// began is still current. Returns `false` (and changes nothing) when an
    /// intervening event moved the state.
    pub fn commit(&mut self, observed: NegotiationState, next: NegotiationState) -> bool {
        if self.negotiation != observed {
            return false;
        }
        self.negotiation = next;
        true
    }

    /// Unconditional transition, for remote-driven steps validated by the
    /// caller and for closing.
    pub fn force(&mut self, next: NegotiationState) {
        self.negotiation = next;
    }

    /// Records a link-state change and returns the new epoch.
    pub fn set_link_state(&mut self, state: LinkState) -> u64 {
        self.link_state = state;
        self.epoch += 1;
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkError;
    use crate::session::link::SdpKind;
    use async_trait::async_trait;

    struct InertLink;

    #[async_trait]
    impl PeerLink for InertLink {
        async fn create_offer(&self) -> Result<String, LinkError> {
            Ok(String::new())
        }
        async fn create_answer(&self) -> Result<String, LinkError> {
            Ok(String::new())
        }
        async fn set_local(&self, _: SdpKind, _: &str) -> Result<(), LinkError> {
            Ok(())
        }
        async fn set_remote(&self, _: SdpKind, _: &str) -> Result<(), LinkError> {
            Ok(())
        }
        async fn add_remote_candidate(&self, _: &str) -> Result<(), LinkError> {
            Ok(())
        }
        async fn close(&self) {}
    }

    fn session() -> PeerSession {
        PeerSession::new("peer".into(), Arc::new(InertLink))
    }

    #[test]
    fn commit_applies_only_from_observed_state() {
        let mut s = session();
        let observed = s.negotiation();
        assert!(s.commit(observed, NegotiationState::HaveLocalOffer));
        assert_eq!(s.negotiation(), NegotiationState::HaveLocalOffer);

        // A step that observed Stable before the first one landed must lose.
        assert!(!s.commit(NegotiationState::Stable, NegotiationState::HaveRemoteOffer));
        assert_eq!(s.negotiation(), NegotiationState::HaveLocalOffer);
    }

    #[test]
    fn link_state_changes_bump_the_epoch() {
        let mut s = session();
        let first = s.set_link_state(LinkState::Disconnected);
        let second = s.set_link_state(LinkState::Connected);
        assert!(second > first);
        assert_eq!(s.link_state(), LinkState::Connected);
    }
}
