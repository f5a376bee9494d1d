//! Local media source model
//!
//! Device capture and rendering live outside this crate; what the session
//! engine needs is the ownership and sharing model: one source per client,
//! holding independently toggleable audio/video components that every peer
//! session references without copying. Disabling a component is one atomic
//! store observed by all sessions at once, with no renegotiation.

use crate::error::MediaError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

/// One audio or video component of the local source. Shared by reference into
/// every session's outbound attachment set.
pub struct MediaComponent {
    kind: MediaKind,
    label: String,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl MediaComponent {
    pub fn new(kind: MediaKind, label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            label: label.into(),
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// A disabled component keeps flowing with a muted payload; a stopped one
    /// is gone for good.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst) && !self.is_stopped()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// The client's one local media source.
pub struct LocalMediaSource {
    components: Vec<Arc<MediaComponent>>,
}

impl LocalMediaSource {
    pub fn new(components: Vec<Arc<MediaComponent>>) -> Self {
        Self { components }
    }

    /// Live references to the components of one kind.
    pub fn components(&self, kind: MediaKind) -> Vec<Arc<MediaComponent>> {
        self.components
            .iter()
            .filter(|c| c.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn all_components(&self) -> &[Arc<MediaComponent>] {
        &self.components
    }

    /// Toggles every component of one kind. Local-only and synchronous.
    /// Returns `false` when the source has no component of that kind, in
    /// which case the control is permanently unavailable and nothing changes.
    pub fn set_enabled(&self, kind: MediaKind, enabled: bool) -> bool {
        let targets = self.components(kind);
        if targets.is_empty() {
            return false;
        }
        for component in targets {
            component.set_enabled(enabled);
        }
        true
    }

    /// Stops every component. Called on leave.
    pub fn release(&self) {
        for component in &self.components {
            component.stop();
        }
    }
}

/// Collaborator interface to whatever actually opens capture devices.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    async fn acquire(&self) -> Result<LocalMediaSource, MediaError>;
}

/// Provider for environments without real capture: yields a source with the
/// requested component kinds, or `PermissionDenied` when configured to refuse.
pub struct FixedMediaProvider {
    pub audio: bool,
    pub video: bool,
    pub deny: bool,
}

impl FixedMediaProvider {
    pub fn audio_video() -> Self {
        Self {
            audio: true,
            video: true,
            deny: false,
        }
    }
}

#[async_trait]
impl MediaProvider for FixedMediaProvider {
    async fn acquire(&self) -> Result<LocalMediaSource, MediaError> {
        if self.deny {
            return Err(MediaError::PermissionDenied);
        }
        let mut components = Vec::new();
        if self.audio {
            components.push(MediaComponent::new(MediaKind::Audio, "mic"));
        }
        if self.video {
            components.push(MediaComponent::new(MediaKind::Video, "camera"));
        }
        Ok(LocalMediaSource::new(components))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_is_visible_through_shared_references() {
        let source = LocalMediaSource::new(vec![
            MediaComponent::new(MediaKind::Audio, "mic"),
            MediaComponent::new(MediaKind::Video, "camera"),
        ]);
        let attached = source.components(MediaKind::Video);

        assert!(source.set_enabled(MediaKind::Video, false));
        assert!(!attached[0].is_enabled());
        assert!(source.components(MediaKind::Audio)[0].is_enabled());

        assert!(source.set_enabled(MediaKind::Video, true));
        assert!(attached[0].is_enabled());
    }

    #[test]
    fn missing_kind_reports_unavailable() {
        let source = LocalMediaSource::new(vec![MediaComponent::new(MediaKind::Audio, "mic")]);
        assert!(!source.set_enabled(MediaKind::Video, false));
        assert!(source.components(MediaKind::Audio)[0].is_enabled());
    }

    #[test]
    fn release_stops_everything() {
        let source = LocalMediaSource::new(vec![
            MediaComponent::new(MediaKind::Audio, "mic"),
            MediaComponent::new(MediaKind::Video, "camera"),
        ]);
        source.release();
        for component in source.all_components() {
            assert!(component.is_stopped());
            assert!(!component.is_enabled());
        }
    }

    #[tokio::test]
    async fn provider_can_deny_permission() {
        let provider = FixedMediaProvider {
            audio: true,
            video: true,
            deny: true,
        };
        assert!(matches!(
            provider.acquire().await,
            Err(crate::error::MediaError::PermissionDenied)
        ));
    }
}
