//! Ad break coordinator
//!
//! Top-level orchestrator sitting between the media engine and the player
//! shell. Owns the plugin state, the cue point list and the saved seek
//! target; translates playback control through the [`TimeMapper`] and routes
//! native events through the [`EventMediator`].
//!
//! # Threading
//!
//! All mutation happens through `&mut self` on the host's event loop; handlers
//! never interleave. The only asynchronous part is [`PendingLoad::resolve`],
//! which holds no borrow of the coordinator. Its outcome is applied by
//! [`AdBreakCoordinator::complete_load`] only if no reset, destroy or newer
//! load happened in between.
//!
//! # Failure policy
//!
//! Ad insertion is best effort. A bootstrap failure, a rejected stream
//! request or a timeout disables ad handling for the session and loads plain
//! content at the requested start time.

use super::event_mediator::{Disposition, EventMediator};
use super::state::PluginState;
use super::time_mapper::TimeMapper;
use crate::backend::{SdkBootstrap, StreamData, StreamEvent, StreamRequest, StreamSession};
use crate::engine::MediaEngine;
use crate::error::{Error, Result};
use ssai_common::events::{
    AdBreakDescriptor, AdInfo, CuePoint, EventBus, MediaEvent, MediaEventKind, PlayerEvent,
    TimedMetadata,
};
use ssai_common::AdInsertionConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Positions below this (content seconds) count as the start of content
const PREROLL_WINDOW_SECS: f64 = 1.0;

/// Positions within this distance of the content duration count as the end
const POSTROLL_WINDOW_SECS: f64 = 1.0;

/// Classify an ad break from the content position at which it starts
pub fn classify_ad_break(position: f64, content_duration: Option<f64>) -> AdBreakDescriptor {
    if position < PREROLL_WINDOW_SECS {
        return AdBreakDescriptor::preroll();
    }
    match content_duration {
        Some(duration) if duration > 0.0 && duration - position <= POSTROLL_WINDOW_SECS => {
            AdBreakDescriptor::postroll()
        }
        _ => AdBreakDescriptor::midroll(position),
    }
}

/// Stream request in flight for one load cycle
pub struct PendingLoad {
    epoch: u64,
    token: CancellationToken,
    bootstrap: Option<SdkBootstrap>,
    request: StreamRequest,
    timeout: Duration,
    start_time: Option<f64>,
}

/// Result of a resolved [`PendingLoad`]
pub struct LoadOutcome {
    epoch: u64,
    token: CancellationToken,
    start_time: Option<f64>,
    result: Result<(Arc<dyn StreamSession>, StreamData)>,
}

impl LoadOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&Error> {
        self.result.as_ref().err()
    }
}

impl PendingLoad {
    /// Wait for the ad library, then request the stream
    ///
    /// Completes early with `Error::LoadCancelled` when the load cycle is
    /// superseded.
    pub async fn resolve(self) -> LoadOutcome {
        let PendingLoad {
            epoch,
            token,
            bootstrap,
            request,
            timeout,
            start_time,
        } = self;

        let result = match bootstrap {
            None => Err(Error::Bootstrap(
                "ad insertion disabled for this session".to_string(),
            )),
            Some(bootstrap) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(Error::LoadCancelled),
                    result = fetch_stream(bootstrap, request, timeout) => result,
                }
            }
        };

        LoadOutcome {
            epoch,
            token,
            start_time,
            result,
        }
    }
}

async fn fetch_stream(
    bootstrap: SdkBootstrap,
    request: StreamRequest,
    timeout: Duration,
) -> Result<(Arc<dyn StreamSession>, StreamData)> {
    let session = bootstrap.session().await?;
    debug!("Ad library version: {}", session.version());

    let data = tokio::time::timeout(timeout, session.request_stream(request))
        .await
        .map_err(|_| Error::StreamRequestTimeout(timeout))??;
    Ok((session, data))
}

/// Orchestrates ad breaks over a decorated media engine
pub struct AdBreakCoordinator<E: MediaEngine> {
    config: AdInsertionConfig,
    engine: E,
    bootstrap: SdkBootstrap,
    bus: EventBus,
    mediator: EventMediator,

    /// Stream session, present once a stitched stream is loaded
    session: Option<Arc<dyn StreamSession>>,
    state: PluginState,
    cue_points: Vec<CuePoint>,
    saved_seek_time: Option<f64>,
    /// Active ad break, `None` outside breaks
    ad_break: Option<AdBreakDescriptor>,
    current_ad: Option<AdInfo>,

    /// Swallow backend events until the ignored preroll ends
    ignore_preroll: bool,
    /// Ad handling off for this session (bootstrap or stream failure)
    ads_disabled: bool,
    /// Content reached its end (postroll started)
    content_ended: bool,
    /// Postroll finished; completion waits for the native end signal
    completion_pending: bool,
    saved_playback_rate: Option<f64>,
    overlay_visible: bool,
    start_time: Option<f64>,

    epoch: u64,
    load_token: CancellationToken,
    destroyed: bool,
}

impl<E: MediaEngine> AdBreakCoordinator<E> {
    pub fn new(config: AdInsertionConfig, engine: E, bootstrap: SdkBootstrap) -> Self {
        let bus = EventBus::new(config.event_bus_capacity.max(1));
        Self::with_event_bus(config, engine, bootstrap, bus)
    }

    /// Construct on an existing bus shared with the player shell
    pub fn with_event_bus(
        config: AdInsertionConfig,
        engine: E,
        bootstrap: SdkBootstrap,
        bus: EventBus,
    ) -> Self {
        Self {
            config,
            engine,
            bootstrap,
            bus,
            mediator: EventMediator::new(),
            session: None,
            state: PluginState::Idle,
            cue_points: Vec::new(),
            saved_seek_time: None,
            ad_break: None,
            current_ad: None,
            ignore_preroll: false,
            ads_disabled: false,
            content_ended: false,
            completion_pending: false,
            saved_playback_rate: None,
            overlay_visible: false,
            start_time: None,
            epoch: 0,
            load_token: CancellationToken::new(),
            destroyed: false,
        }
    }

    // ========================================
    // Load
    // ========================================

    /// Load the stitched stream, falling back to plain content on failure
    pub async fn load(&mut self, start_time: Option<f64>) -> Result<()> {
        let pending = self.prepare_load(start_time)?;
        let outcome = pending.resolve().await;
        self.complete_load(outcome)
    }

    /// Start a load cycle, superseding any in-flight one
    pub fn prepare_load(&mut self, start_time: Option<f64>) -> Result<PendingLoad> {
        self.ensure_alive()?;
        self.begin_epoch();
        self.start_time = start_time;

        let bootstrap = if self.ads_disabled {
            None
        } else {
            self.state = PluginState::Loading;
            Some(self.bootstrap.clone())
        };
        debug!("load start_time={:?} epoch={}", start_time, self.epoch);

        Ok(PendingLoad {
            epoch: self.epoch,
            token: self.load_token.clone(),
            bootstrap,
            request: StreamRequest::from_identity(&self.config.stream),
            timeout: self.config.stream_request_timeout(),
            start_time,
        })
    }

    /// Apply a resolved load; stale outcomes are discarded
    pub fn complete_load(&mut self, outcome: LoadOutcome) -> Result<()> {
        if outcome.epoch != self.epoch || outcome.token.is_cancelled() {
            debug!("Discarding stale load outcome (epoch {})", outcome.epoch);
            return Ok(());
        }
        self.ensure_alive()?;

        match outcome.result {
            Ok((session, data)) => {
                info!("Stream url has been fetched: {}", data.url);
                self.engine.set_source(&data.url);
                self.cue_points = data.cue_points;
                self.session = Some(session);
                self.state = PluginState::Loaded;

                let positions = self.mapper().ad_break_positions();
                self.bus.emit_lossy(PlayerEvent::AdManifestLoaded {
                    ad_break_positions: positions,
                });

                // A zero start keeps the preroll in front of the playhead
                let stream_start = outcome.start_time.map(|t| {
                    if t > 0.0 {
                        self.mapper().stream_time_for_content(t, false).stream_time
                    } else {
                        t
                    }
                });
                self.engine.load(stream_start);
            }
            Err(Error::LoadCancelled) => {
                debug!("Load cancelled");
            }
            Err(e) => {
                match &e {
                    Error::Bootstrap(_) if !self.ads_disabled => {
                        warn!("Ad insertion unavailable: {}", e)
                    }
                    _ => debug!("Falling back to content playback: {}", e),
                }
                self.disable_ads();
                self.engine.load(outcome.start_time);
            }
        }
        Ok(())
    }

    // ========================================
    // Playback control
    // ========================================

    pub fn play(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.play_internal();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.pause_internal();
        Ok(())
    }

    fn play_internal(&mut self) {
        if !self.ads_disabled && self.is_ad_break() {
            self.resume_ad();
        }
        self.engine.play();
    }

    fn pause_internal(&mut self) {
        if !self.ads_disabled && self.is_ad_break() {
            self.pause_ad();
        }
        self.engine.pause();
    }

    fn resume_ad(&mut self) {
        if self.state == PluginState::Paused {
            self.state = PluginState::Playing;
            self.bus.emit_lossy(PlayerEvent::AdResumed);
        } else {
            debug!("resume_ad ignored in state {}", self.state);
        }
    }

    fn pause_ad(&mut self) {
        if self.state == PluginState::Playing {
            self.state = PluginState::Paused;
            self.bus.emit_lossy(PlayerEvent::AdPaused);
        } else {
            debug!("pause_ad ignored in state {}", self.state);
        }
    }

    /// Seek to a content time
    ///
    /// Seeks past an unplayed ad break snap back to the break; the original
    /// target is restored once that break ends.
    pub fn set_current_time(&mut self, content_time: f64) -> Result<()> {
        self.ensure_alive()?;
        if self.ads_disabled || self.session.is_none() {
            self.engine.set_current_time(content_time);
            return Ok(());
        }

        let seek = {
            let mapper = self.mapper();
            let seek = mapper.stream_time_for_content(content_time, self.snapback_armed());
            // The preroll of a deep-linked load is never played
            if seek.snapped_back()
                && self.deep_linked()
                && mapper.content_time_or_fallback(seek.stream_time) < PREROLL_WINDOW_SECS
            {
                debug!("Skipping snapback into ignored preroll");
                mapper.stream_time_for_content(content_time, false)
            } else {
                seek
            }
        };
        if let Some(saved) = seek.saved_seek_time {
            info!("Snapback to ad break at {:.3}s, saving {:.3}s", seek.stream_time, saved);
            self.saved_seek_time = Some(saved);
        }
        self.engine.set_current_time(seek.stream_time);
        Ok(())
    }

    /// Current content time
    pub fn current_time(&self) -> f64 {
        let stream_time = self.engine.current_time();
        if self.ads_disabled {
            return stream_time;
        }
        self.mapper().content_time_or_fallback(stream_time)
    }

    /// Content duration
    pub fn duration(&self) -> Option<f64> {
        let stream_duration = self.engine.duration()?;
        if self.ads_disabled {
            return Some(stream_duration);
        }
        Some(self.mapper().content_time_or_fallback(stream_duration))
    }

    /// Content is not advancing while an ad break plays
    pub fn paused(&self) -> bool {
        if self.ads_disabled {
            return self.engine.paused();
        }
        self.is_ad_break() || self.engine.paused()
    }

    pub fn ended(&self) -> bool {
        self.engine.ended() || (!self.ads_disabled && self.content_ended)
    }

    // ========================================
    // Native media events
    // ========================================

    /// Intercept a native media event before it reaches the outward bus
    pub fn handle_media_event(&mut self, event: MediaEvent) -> Option<Disposition> {
        if self.destroyed {
            return None;
        }
        if self.ads_disabled {
            self.bus.emit_lossy(PlayerEvent::Media(event));
            return None;
        }

        let kind = event.kind;
        match kind {
            MediaEventKind::TimedMetadata => {
                if let Some(metadata) = event.metadata() {
                    self.forward_metadata(metadata);
                }
            }
            MediaEventKind::Play if !self.is_ad_break() => {
                self.content_ended = false;
            }
            _ => {}
        }

        let in_break = self.is_ad_break();
        let disposition = self.mediator.dispatch(event, in_break, &self.bus);

        match kind {
            MediaEventKind::Ended if self.completion_pending => {
                self.completion_pending = false;
                self.complete_all_ads();
            }
            MediaEventKind::VolumeChange if in_break => {
                if self.engine.muted() {
                    self.bus.emit_lossy(PlayerEvent::AdMuted);
                }
                self.bus.emit_lossy(PlayerEvent::AdVolumeChanged {
                    volume: self.engine.volume(),
                });
            }
            _ => {}
        }
        Some(disposition)
    }

    fn forward_metadata(&self, metadata: &TimedMetadata) {
        let Some(session) = self.session.as_deref() else {
            return;
        };
        match metadata {
            TimedMetadata::Id3(samples) => {
                for sample in samples {
                    session.process_metadata("ID3", &sample.data, sample.pts);
                }
            }
            TimedMetadata::Cues(cues) => {
                for (key, value) in cues {
                    if key.is_empty() {
                        debug!("Skipping timed metadata cue without key");
                        continue;
                    }
                    let entry = HashMap::from([(key.clone(), value.clone())]);
                    session.on_timed_metadata(&entry);
                }
            }
        }
    }

    // ========================================
    // Backend events
    // ========================================

    /// Handle an event pushed by the backend session
    pub fn handle_stream_event(&mut self, event: StreamEvent) {
        if self.destroyed || self.ads_disabled {
            debug!("Ignoring stream event {:?}", event);
            return;
        }

        if self.ignore_preroll {
            match event {
                StreamEvent::Error { message } => {
                    warn!("Stream error during ignored preroll: {}", message);
                    self.engine.play();
                }
                StreamEvent::AdBreakEnded => {
                    debug!("Ignored preroll ended");
                    self.ignore_preroll = false;
                }
                StreamEvent::CuePointsChanged(cue_points) => self.cue_points = cue_points,
                other => debug!("Ignored preroll event {:?}", other),
            }
            return;
        }

        match event {
            StreamEvent::Loaded => debug!("Stream loaded"),
            StreamEvent::Error { message } => {
                warn!("Stream error: {}", message);
                self.engine.play();
            }
            StreamEvent::CuePointsChanged(cue_points) => {
                debug!("Cue points changed ({} cues)", cue_points.len());
                self.cue_points = cue_points;
            }
            StreamEvent::AdBreakStarted => self.on_ad_break_started(),
            StreamEvent::AdBreakEnded => self.on_ad_break_ended(),
            StreamEvent::AdProgress {
                current_time,
                duration,
            } => {
                if !self.state.ad_in_progress() {
                    let ad = self.current_ad.clone().unwrap_or_default();
                    self.start_ad(ad);
                }
                self.bus.emit_lossy(PlayerEvent::AdProgress {
                    current_time,
                    duration,
                });
            }
            StreamEvent::Started(ad) => self.start_ad(ad),
            StreamEvent::FirstQuartile => self.bus.emit_lossy(PlayerEvent::AdFirstQuartile),
            StreamEvent::Midpoint => self.bus.emit_lossy(PlayerEvent::AdMidpoint),
            StreamEvent::ThirdQuartile => self.bus.emit_lossy(PlayerEvent::AdThirdQuartile),
            StreamEvent::Complete => {
                self.state = PluginState::Idle;
                self.current_ad = None;
                self.bus.emit_lossy(PlayerEvent::AdCompleted);
            }
            StreamEvent::Click => self.handle_click(),
        }
    }

    fn start_ad(&mut self, ad: AdInfo) {
        if self.state.ad_in_progress() {
            return;
        }
        self.state = PluginState::Playing;
        self.current_ad = Some(ad.clone());
        self.bus.emit_lossy(PlayerEvent::AdLoaded { ad: ad.clone() });
        self.bus.emit_lossy(PlayerEvent::AdStarted { ad });
    }

    fn on_ad_break_started(&mut self) {
        if self.is_ad_break() {
            debug!("Ad break already active");
            return;
        }

        let ad_break = classify_ad_break(self.current_time(), self.duration());
        if ad_break.is_preroll() && self.deep_linked() {
            info!("Ignoring preroll, playback starts at {:?}", self.start_time);
            self.ignore_preroll = true;
            return;
        }

        info!("Ad break started: {:?}", ad_break);
        self.ad_break = Some(ad_break);
        self.overlay_visible = true;

        let rate = self.engine.playback_rate();
        self.saved_playback_rate = Some(rate);
        if rate != 1.0 {
            self.engine.set_playback_rate(1.0);
        }
        if ad_break.is_postroll() {
            self.content_ended = true;
        }

        self.bus.emit_lossy(PlayerEvent::AdBreakStart { ad_break });
        self.mediator.on_ad_break_start(&ad_break, &self.bus);
    }

    fn on_ad_break_ended(&mut self) {
        let Some(ad_break) = self.ad_break.take() else {
            debug!("Ad break end without active break");
            return;
        };
        info!("Ad break ended: {:?}", ad_break);

        let stream_time = self.engine.current_time();
        let just_ended = self
            .session
            .as_deref()
            .and_then(|s| s.previous_cue_point_for_stream_time(stream_time))
            .or_else(|| self.mapper().previous_cue_point(stream_time).copied());
        let all_played = self.mapper().all_played_except(just_ended.as_ref());

        if let Some(rate) = self.saved_playback_rate.take() {
            if rate != self.engine.playback_rate() {
                self.engine.set_playback_rate(rate);
            }
        }
        self.overlay_visible = false;
        if self.state.ad_in_progress() {
            self.state = PluginState::Idle;
        }
        self.current_ad = None;

        self.bus.emit_lossy(PlayerEvent::AdBreakEnd);
        let replayed = self.mediator.on_ad_break_end(&self.bus);
        if replayed > 0 {
            debug!("Replayed {} deferred events", replayed);
        }

        if let Some(target) = self.saved_seek_time.take() {
            let stream_time = self.mapper().stream_time_for_content(target, false).stream_time;
            info!("Restoring seek target {:.3}s", target);
            self.engine.set_current_time(stream_time);
        }

        if ad_break.is_postroll() && !self.engine.ended() {
            debug!("Postroll finished, waiting for content end");
            self.completion_pending = true;
        } else if ad_break.is_postroll() || all_played {
            self.complete_all_ads();
        }
    }

    fn complete_all_ads(&mut self) {
        info!("All ads completed");
        self.state = PluginState::Done;
        self.bus.emit_lossy(PlayerEvent::AllAdsCompleted);
    }

    /// Click on the ad surface
    ///
    /// Toggles ad playback on touch devices or for on-demand content; a tap
    /// on a live broadcast only reports the click.
    pub fn handle_click(&mut self) {
        if self.destroyed || self.ads_disabled || !self.is_ad_break() {
            return;
        }
        self.bus.emit_lossy(PlayerEvent::AdClicked);

        if self.config.touch_device || !self.engine.is_live() {
            match self.state {
                PluginState::Playing => self.pause_internal(),
                PluginState::Paused => self.play_internal(),
                _ => {}
            }
        }
    }

    // ========================================
    // Lifecycle
    // ========================================

    /// Return to construction-time state; safe to call repeatedly
    pub fn reset(&mut self) {
        if self.destroyed {
            return;
        }
        debug!("reset");
        self.teardown();
        self.engine.reset();
    }

    /// Terminal teardown; only reconstruction is valid afterwards
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        debug!("destroy");
        self.teardown();
        self.mediator.destroy();
        self.engine.destroy();
        self.destroyed = true;
    }

    fn teardown(&mut self) {
        self.begin_epoch();
        self.mediator.reset();
        self.overlay_visible = false;
        if let Some(session) = self.session.take() {
            session.reset();
        }
        self.state = PluginState::Idle;
        self.cue_points.clear();
        self.saved_seek_time = None;
        self.ad_break = None;
        self.current_ad = None;
        self.ignore_preroll = false;
        self.ads_disabled = false;
        self.content_ended = false;
        self.completion_pending = false;
        self.saved_playback_rate = None;
        self.start_time = None;
    }

    fn disable_ads(&mut self) {
        self.ads_disabled = true;
        self.mediator.reset();
        if let Some(session) = self.session.take() {
            session.reset();
        }
        self.state = PluginState::Idle;
        self.cue_points.clear();
        self.ad_break = None;
        self.overlay_visible = false;
    }

    /// Cancel any in-flight load and start a new liveness epoch
    fn begin_epoch(&mut self) {
        self.load_token.cancel();
        self.load_token = CancellationToken::new();
        self.epoch += 1;
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            return Err(Error::Destroyed);
        }
        Ok(())
    }

    /// Load started past the head of content
    fn deep_linked(&self) -> bool {
        self.start_time.is_some_and(|t| t > 0.0)
    }

    fn snapback_armed(&self) -> bool {
        self.config.snapback && !self.is_ad_break()
    }

    fn mapper(&self) -> TimeMapper<'_> {
        TimeMapper::new(
            self.session.as_deref(),
            &self.cue_points,
            self.config.time_fallback,
        )
    }

    // ========================================
    // Accessors
    // ========================================

    pub fn state(&self) -> PluginState {
        self.state
    }

    pub fn is_ad_break(&self) -> bool {
        self.ad_break.is_some()
    }

    pub fn ad_break(&self) -> Option<AdBreakDescriptor> {
        self.ad_break
    }

    pub fn cue_points(&self) -> &[CuePoint] {
        &self.cue_points
    }

    pub fn saved_seek_time(&self) -> Option<f64> {
        self.saved_seek_time
    }

    pub fn ads_enabled(&self) -> bool {
        !self.ads_disabled
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn queued_events(&self) -> usize {
        self.mediator.queued()
    }

    pub fn config(&self) -> &AdInsertionConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssai_common::events::AdBreakType;

    #[test]
    fn test_classify_preroll() {
        assert_eq!(classify_ad_break(0.0, Some(600.0)), AdBreakDescriptor::preroll());
        assert_eq!(classify_ad_break(0.0, None).break_type, AdBreakType::Pre);
    }

    #[test]
    fn test_classify_postroll_within_one_second() {
        let ad_break = classify_ad_break(599.5, Some(600.0));
        assert_eq!(ad_break.position, -1.0);
        assert_eq!(ad_break.break_type, AdBreakType::Post);
        assert!(classify_ad_break(599.0, Some(600.0)).is_postroll());
    }

    #[test]
    fn test_classify_midroll() {
        let ad_break = classify_ad_break(300.0, Some(600.0));
        assert_eq!(ad_break, AdBreakDescriptor::midroll(300.0));
        // Unknown duration cannot be a postroll
        assert!(!classify_ad_break(599.5, None).is_postroll());
    }
}
