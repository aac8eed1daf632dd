//! Event types for the SSAI event system
//!
//! Provides the outward player event definitions and the EventBus shells
//! subscribe to.

// Sub-modules (supporting types)
mod ad_types;
mod media_types;

pub use ad_types::{AdBreakDescriptor, AdBreakType, AdInfo, CuePoint};
pub use media_types::{MediaEvent, MediaEventKind, MediaPayload, MetadataSample, TimedMetadata};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Outward player events
///
/// Everything a surrounding player shell observes: mediated native media
/// events plus the ad lifecycle notifications raised by the coordinator.
/// Events are broadcast via EventBus and serialize with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Native media event that passed mediation (live or replayed)
    Media(MediaEvent),

    /// Stream manifest loaded; positions are cue starts in content seconds
    AdManifestLoaded { ad_break_positions: Vec<f64> },

    /// Ad break started
    AdBreakStart { ad_break: AdBreakDescriptor },

    /// Ad break ended
    AdBreakEnd,

    /// Ad creative loaded
    AdLoaded { ad: AdInfo },

    /// Ad creative started playing
    AdStarted { ad: AdInfo },

    /// Ad paused by the viewer
    AdPaused,

    /// Ad resumed by the viewer
    AdResumed,

    /// Periodic ad progress
    AdProgress { current_time: f64, duration: f64 },

    AdFirstQuartile,
    AdMidpoint,
    AdThirdQuartile,

    /// Single ad finished
    AdCompleted,

    /// Viewer clicked the ad surface
    AdClicked,

    /// Viewer muted during an ad
    AdMuted,

    /// Viewer changed volume during an ad
    AdVolumeChanged { volume: f64 },

    /// Every scheduled ad break has played
    AllAdsCompleted,
}

impl PlayerEvent {
    /// Native media kind for `Media` events
    pub fn media_kind(&self) -> Option<MediaEventKind> {
        match self {
            PlayerEvent::Media(event) => Some(event.kind),
            _ => None,
        }
    }
}

impl From<MediaEvent> for PlayerEvent {
    fn from(event: MediaEvent) -> Self {
        PlayerEvent::Media(event)
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast for one-to-many delivery. Subscribers only see
/// events emitted after they subscribe.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer per subscriber before the
    ///   slowest receiver starts lagging
    ///
    /// # Examples
    ///
    /// ```
    /// use ssai_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// # Examples
    ///
    /// ```
    /// use ssai_common::events::{EventBus, PlayerEvent};
    ///
    /// let event_bus = EventBus::new(16);
    ///
    /// // No subscriber yet - not an error
    /// event_bus.emit_lossy(PlayerEvent::AdBreakEnd);
    /// ```
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);

        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(16);
        assert!(bus.emit(PlayerEvent::AdBreakEnd).is_err());
        // Lossy variant must not panic
        bus.emit_lossy(PlayerEvent::AdBreakEnd);
    }

    #[tokio::test]
    async fn test_emit_preserves_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit_lossy(PlayerEvent::AdBreakStart {
            ad_break: AdBreakDescriptor::preroll(),
        });
        bus.emit_lossy(MediaEvent::new(MediaEventKind::Play).into());
        bus.emit_lossy(PlayerEvent::AdBreakEnd);

        assert!(matches!(
            rx.recv().await.unwrap(),
            PlayerEvent::AdBreakStart { .. }
        ));
        assert_eq!(
            rx.recv().await.unwrap().media_kind(),
            Some(MediaEventKind::Play)
        );
        assert_eq!(rx.recv().await.unwrap(), PlayerEvent::AdBreakEnd);
    }

    #[test]
    fn test_player_event_serializes_with_type_tag() {
        let event = PlayerEvent::AdBreakStart {
            ad_break: AdBreakDescriptor::postroll(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "AdBreakStart");
        assert_eq!(json["ad_break"]["type"], "post");
        assert_eq!(json["ad_break"]["position"], -1.0);
    }

    #[test]
    fn test_media_event_kind_names() {
        for kind in MediaEventKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }

    #[test]
    fn test_cue_point_contains_is_half_open() {
        let cue = CuePoint::new(10.0, 40.0, false);
        assert!(cue.contains(10.0));
        assert!(cue.contains(39.9));
        assert!(!cue.contains(40.0));
        assert_eq!(cue.duration(), 30.0);
    }

    #[test]
    fn test_timed_metadata_accessor() {
        let event = MediaEvent::timed_metadata(TimedMetadata::Cues(vec![(
            "TXXX".to_string(),
            "google_1234".to_string(),
        )]));
        assert_eq!(event.kind, MediaEventKind::TimedMetadata);
        assert!(event.metadata().is_some());
        assert!(MediaEvent::new(MediaEventKind::Play).metadata().is_none());
    }
}
