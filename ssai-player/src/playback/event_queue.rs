//! Deferred media event queue
//!
//! FIFO buffer for native media events intercepted while an ad break is
//! active. High-frequency progress kinds are never buffered: a stale time
//! update is meaningless once the break is over.

use crate::error::{Error, Result};
use ssai_common::events::{MediaEvent, MediaEventKind};
use std::collections::VecDeque;
use tracing::debug;

/// A buffered native event awaiting replay
pub type QueuedEvent = MediaEvent;

/// Kinds dropped on push
pub const DROPPED_KINDS: [MediaEventKind; 2] = [MediaEventKind::TimeUpdate, MediaEventKind::Progress];

/// Ordered buffer of pending media events
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<QueuedEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `kind` is on the drop list
    pub fn is_dropped(kind: MediaEventKind) -> bool {
        DROPPED_KINDS.contains(&kind)
    }

    /// Append an event unless its kind is on the drop list
    ///
    /// Returns `true` if the event was buffered.
    pub fn push(&mut self, event: QueuedEvent) -> bool {
        if Self::is_dropped(event.kind) {
            return false;
        }
        debug!("Push event to queue: {}", event.kind);
        self.events.push_back(event);
        true
    }

    /// Remove and return the oldest event
    ///
    /// # Errors
    ///
    /// `Error::EmptyQueue` if nothing is buffered. Callers check
    /// `is_empty()` first or use `drain_all`.
    pub fn pop(&mut self) -> Result<QueuedEvent> {
        let event = self.events.pop_front().ok_or(Error::EmptyQueue)?;
        debug!("Pop event from queue: {}", event.kind);
        Ok(event)
    }

    /// Deliver every buffered event in arrival order
    ///
    /// An event is removed only after `deliver` accepts it. If `deliver`
    /// fails, the drain stops and the failed event stays at the head, so a
    /// retry delivers it again.
    pub fn drain_all<F, E>(&mut self, mut deliver: F) -> std::result::Result<usize, E>
    where
        F: FnMut(&QueuedEvent) -> std::result::Result<(), E>,
    {
        let mut delivered = 0;
        while let Some(event) = self.events.front() {
            deliver(event)?;
            self.events.pop_front();
            delivered += 1;
        }
        if delivered > 0 {
            debug!("Drained {} events from queue", delivered);
        }
        Ok(delivered)
    }

    /// Discard all buffered events without delivering them
    pub fn clear(&mut self) {
        debug!("Empty queue ({} events discarded)", self.events.len());
        self.events.clear();
    }

    pub fn size(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn event(kind: MediaEventKind) -> QueuedEvent {
        MediaEvent::new(kind)
    }

    #[test]
    fn test_push_pop_fifo() {
        let mut queue = EventQueue::new();
        assert!(queue.push(event(MediaEventKind::Pause)));
        assert!(queue.push(event(MediaEventKind::Seeking)));
        assert!(queue.push(event(MediaEventKind::Play)));
        assert_eq!(queue.size(), 3);

        assert_eq!(queue.pop().unwrap().kind, MediaEventKind::Pause);
        assert_eq!(queue.pop().unwrap().kind, MediaEventKind::Seeking);
        assert_eq!(queue.pop().unwrap().kind, MediaEventKind::Play);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drop_list_never_grows_queue() {
        let mut queue = EventQueue::new();
        queue.push(event(MediaEventKind::Pause));

        for _ in 0..50 {
            for kind in DROPPED_KINDS {
                assert!(!queue.push(event(kind)));
                assert_eq!(queue.size(), 1);
            }
        }
    }

    #[test]
    fn test_drop_list_checked_by_kind_not_payload() {
        let mut queue = EventQueue::new();
        let with_payload = MediaEvent::with_value(
            MediaEventKind::TimeUpdate,
            serde_json::json!({ "currentTime": 12.0 }),
        );
        assert!(!queue.push(with_payload));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_empty_is_error() {
        let mut queue = EventQueue::new();
        assert!(matches!(queue.pop(), Err(Error::EmptyQueue)));
    }

    #[test]
    fn test_drain_empty_is_noop() {
        let mut queue = EventQueue::new();
        let mut calls = 0;
        let delivered = queue
            .drain_all(|_| {
                calls += 1;
                Ok::<(), Infallible>(())
            })
            .unwrap();
        assert_eq!(delivered, 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_drain_preserves_order() {
        let mut queue = EventQueue::new();
        let kinds = [
            MediaEventKind::Pause,
            MediaEventKind::Seeking,
            MediaEventKind::RateChange,
            MediaEventKind::Play,
            MediaEventKind::Playing,
        ];
        for kind in kinds {
            queue.push(event(kind));
        }

        let mut seen = Vec::new();
        queue
            .drain_all(|e| {
                seen.push(e.kind);
                Ok::<(), Infallible>(())
            })
            .unwrap();
        assert_eq!(seen, kinds);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_failure_keeps_remaining_events() {
        let mut queue = EventQueue::new();
        queue.push(event(MediaEventKind::Pause));
        queue.push(event(MediaEventKind::Seeking));
        queue.push(event(MediaEventKind::Play));

        let result = queue.drain_all(|e| {
            if e.kind == MediaEventKind::Seeking {
                Err("bus closed")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("bus closed"));
        // Failed event is still at the head
        assert_eq!(queue.size(), 2);

        let mut seen = Vec::new();
        queue
            .drain_all(|e| {
                seen.push(e.kind);
                Ok::<(), Infallible>(())
            })
            .unwrap();
        assert_eq!(seen, [MediaEventKind::Seeking, MediaEventKind::Play]);
    }

    #[test]
    fn test_clear_discards() {
        let mut queue = EventQueue::new();
        queue.push(event(MediaEventKind::Pause));
        queue.push(event(MediaEventKind::Play));
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.size(), 0);
    }
}
