//! Test helpers for ssai-player integration tests
//!
//! Standard stitched layout used across the suites: 600s of content with a
//! 30s preroll, a 30s midroll at content 100 and a 30s postroll.
//!
//! | Break    | Stream interval | Content position |
//! |----------|-----------------|------------------|
//! | preroll  | 0..30           | 0                |
//! | midroll  | 130..160        | 100              |
//! | postroll | 660..690        | 600              |

#![allow(dead_code)]

use ssai_common::events::{CuePoint, PlayerEvent};
use ssai_common::AdInsertionConfig;
use ssai_player::sim::{ScriptedSession, SimulatedEngine};
use ssai_player::{AdBreakCoordinator, SdkBootstrap};
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;

pub const STREAM_DURATION: f64 = 690.0;
pub const CONTENT_DURATION: f64 = 600.0;

pub fn vod_cue_points() -> Vec<CuePoint> {
    vec![
        CuePoint::new(0.0, 30.0, false),
        CuePoint::new(130.0, 160.0, false),
        CuePoint::new(660.0, 690.0, false),
    ]
}

pub type SimCoordinator = AdBreakCoordinator<SimulatedEngine>;

/// Coordinator over a scripted session; nothing loaded yet
pub fn coordinator_with(
    config: AdInsertionConfig,
    session: Arc<ScriptedSession>,
    engine: SimulatedEngine,
) -> SimCoordinator {
    AdBreakCoordinator::new(config, engine, SdkBootstrap::ready(session))
}

/// Loaded coordinator on the standard layout, plus a receiver subscribed
/// before the load
pub async fn loaded(
    config: AdInsertionConfig,
    cue_points: Vec<CuePoint>,
    start_time: Option<f64>,
) -> (SimCoordinator, Arc<ScriptedSession>, Receiver<PlayerEvent>) {
    let session = Arc::new(ScriptedSession::new(cue_points));
    let mut coordinator =
        coordinator_with(config, session.clone(), SimulatedEngine::new(STREAM_DURATION));
    let rx = coordinator.subscribe();
    coordinator.load(start_time).await.unwrap();
    (coordinator, session, rx)
}

/// Everything currently buffered on the receiver
pub fn drain(rx: &mut Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn count(events: &[PlayerEvent], wanted: &PlayerEvent) -> usize {
    events.iter().filter(|e| *e == wanted).count()
}
