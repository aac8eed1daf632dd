//! Native media event mediation
//!
//! Every native media event passes through the mediator before reaching the
//! outward bus. The decision depends on the event kind's class, the current
//! suppression set and whether an ad break is active:
//!
//! | Class       | No ad break | Ad break active |
//! |-------------|-------------|-----------------|
//! | Suppressed  | dropped     | dropped         |
//! | Parallel    | delivered   | delivered       |
//! | Deferrable  | delivered   | queued          |
//!
//! Queued events replay in arrival order when the break ends.

use super::event_queue::EventQueue;
use ssai_common::events::{AdBreakDescriptor, EventBus, MediaEvent, MediaEventKind, PlayerEvent};
use std::collections::HashSet;
use std::convert::Infallible;
use tracing::debug;

/// Static delivery class of a media event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// Never delayed; the UI needs these synchronously
    Parallel,
    /// Held back while an ad break is active
    Deferrable,
}

/// What happened to one incoming event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Suppressed,
    Parallel,
    Deferred,
    Immediate,
}

/// Class table
pub fn event_class(kind: MediaEventKind) -> EventClass {
    match kind {
        MediaEventKind::VolumeChange | MediaEventKind::Seeked | MediaEventKind::TimedMetadata => {
            EventClass::Parallel
        }
        _ => EventClass::Deferrable,
    }
}

/// Kinds suppressed once a postroll begins
pub const POSTROLL_SUPPRESSED: [MediaEventKind; 3] = [
    MediaEventKind::Ended,
    MediaEventKind::TimeUpdate,
    MediaEventKind::Seeking,
];

/// Whether an incoming `trigger` event lifts suppression of `suppressed`
fn lifts_suppression(
    suppressed: MediaEventKind,
    trigger: MediaEventKind,
    ad_break_active: bool,
) -> bool {
    match (suppressed, trigger) {
        // Content restarted after the postroll
        (_, MediaEventKind::Play) => !ad_break_active,
        (MediaEventKind::Seeking, MediaEventKind::Pause) => true,
        _ => false,
    }
}

/// Gatekeeper between the media engine and the outward event bus
#[derive(Debug, Default)]
pub struct EventMediator {
    queue: EventQueue,
    suppressed: HashSet<MediaEventKind>,
}

impl EventMediator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decision for `kind` given the current suppression set
    pub fn classify(&self, kind: MediaEventKind, ad_break_active: bool) -> Disposition {
        if self.suppressed.contains(&kind) {
            return Disposition::Suppressed;
        }
        match (event_class(kind), ad_break_active) {
            (EventClass::Parallel, _) => Disposition::Parallel,
            (EventClass::Deferrable, true) => Disposition::Deferred,
            (EventClass::Deferrable, false) => Disposition::Immediate,
        }
    }

    /// Route one native event
    pub fn dispatch(
        &mut self,
        event: MediaEvent,
        ad_break_active: bool,
        bus: &EventBus,
    ) -> Disposition {
        let kind = event.kind;
        if !self.suppressed.is_empty() {
            let before = self.suppressed.len();
            self.suppressed
                .retain(|&s| !lifts_suppression(s, kind, ad_break_active));
            if self.suppressed.len() != before {
                debug!("Suppression lifted by {}: {:?}", kind, self.suppressed);
            }
        }

        let disposition = self.classify(kind, ad_break_active);
        match disposition {
            Disposition::Suppressed => {
                debug!("Event dispatching terminated: {}", kind);
            }
            Disposition::Immediate if kind == MediaEventKind::Play && !self.queue.is_empty() => {
                // First play outside a break releases anything still held
                self.flush(bus);
                bus.emit_lossy(PlayerEvent::Media(event));
            }
            Disposition::Parallel | Disposition::Immediate => {
                bus.emit_lossy(PlayerEvent::Media(event));
            }
            Disposition::Deferred => {
                self.queue.push(event);
            }
        }
        disposition
    }

    /// Break start hook
    ///
    /// For a postroll the native end signal will never mean end-of-content
    /// (the element keeps playing the stitched ad), so a substitute `Ended`
    /// is delivered now and the native one is suppressed.
    pub fn on_ad_break_start(&mut self, ad_break: &AdBreakDescriptor, bus: &EventBus) {
        if ad_break.is_postroll() {
            debug!("Postroll is playing, trigger ENDED event");
            self.suppressed.extend(POSTROLL_SUPPRESSED);
            bus.emit_lossy(PlayerEvent::Media(MediaEvent::new(MediaEventKind::Ended)));
        }
    }

    /// Break end hook: replay deferred events in arrival order
    pub fn on_ad_break_end(&mut self, bus: &EventBus) -> usize {
        self.flush(bus)
    }

    fn flush(&mut self, bus: &EventBus) -> usize {
        self.queue
            .drain_all(|event| {
                bus.emit_lossy(PlayerEvent::Media(event.clone()));
                Ok::<(), Infallible>(())
            })
            .unwrap_or_else(|never| match never {})
    }

    pub fn is_suppressed(&self, kind: MediaEventKind) -> bool {
        self.suppressed.contains(&kind)
    }

    /// Whether the synthetic end of content has been delivered
    pub fn ended(&self) -> bool {
        self.is_suppressed(MediaEventKind::Ended)
    }

    pub fn queued(&self) -> usize {
        self.queue.size()
    }

    /// Clear suppression and drop queued events without delivering them
    pub fn reset(&mut self) {
        self.queue.clear();
        self.suppressed.clear();
    }

    pub fn destroy(&mut self) {
        self.reset();
    }
}
