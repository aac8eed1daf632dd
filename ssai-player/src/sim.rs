//! Simulated backend and media engine
//!
//! Deterministic stand-ins for the ad library and the media element, used by
//! the `ssai-sim` binary and the test suites. [`Playthrough`] drives a
//! coordinator tick by tick, raising the backend and native events a real
//! stitched stream would produce as playback crosses cue points.

use crate::backend::{SdkBootstrap, StreamData, StreamEvent, StreamRequest, StreamSession};
use crate::engine::MediaEngine;
use crate::error::{Error, Result};
use crate::playback::AdBreakCoordinator;
use futures::future::{BoxFuture, FutureExt};
use ssai_common::events::{AdInfo, CuePoint, MediaEvent, MediaEventKind};
use ssai_common::AdInsertionConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// URL handed out by a scripted session
pub const SIM_STREAM_URL: &str = "https://ssai.sim.invalid/stitched/master.m3u8";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How a scripted session answers stream requests
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Succeed(StreamData),
    Fail(String),
    /// Never resolves
    Hang,
}

/// Metadata forwarded to a scripted session
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataCall {
    Sample { kind: String, data: Vec<u8>, pts: f64 },
    Timed(HashMap<String, String>),
}

/// Backend session with a fixed ad layout
pub struct ScriptedSession {
    cue_points: Mutex<Vec<CuePoint>>,
    response: Mutex<ScriptedResponse>,
    requests: Mutex<Vec<StreamRequest>>,
    metadata: Mutex<Vec<MetadataCall>>,
    resets: AtomicUsize,
}

impl ScriptedSession {
    /// Session answering with a stitched stream laid out as `cue_points`
    pub fn new(cue_points: Vec<CuePoint>) -> Self {
        let data = StreamData {
            url: SIM_STREAM_URL.to_string(),
            stream_id: Some("sim-stream".to_string()),
            cue_points: cue_points.clone(),
        };
        Self {
            cue_points: Mutex::new(cue_points),
            response: Mutex::new(ScriptedResponse::Succeed(data)),
            requests: Mutex::new(Vec::new()),
            metadata: Mutex::new(Vec::new()),
            resets: AtomicUsize::new(0),
        }
    }

    pub fn with_response(self, response: ScriptedResponse) -> Self {
        *lock(&self.response) = response;
        self
    }

    pub fn cue_points(&self) -> Vec<CuePoint> {
        lock(&self.cue_points).clone()
    }

    /// Flag the cue point at `index` as played; returns the updated list
    pub fn mark_played(&self, index: usize) -> Vec<CuePoint> {
        let mut cue_points = lock(&self.cue_points);
        if let Some(cue) = cue_points.get_mut(index) {
            cue.played = true;
        }
        cue_points.clone()
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        lock(&self.requests).clone()
    }

    pub fn metadata_calls(&self) -> Vec<MetadataCall> {
        lock(&self.metadata).clone()
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl StreamSession for ScriptedSession {
    fn version(&self) -> String {
        format!("ssai-sim/{}", env!("CARGO_PKG_VERSION"))
    }

    fn request_stream(&self, request: StreamRequest) -> BoxFuture<'static, Result<StreamData>> {
        debug!("Scripted stream request: {:?}", request.kind);
        lock(&self.requests).push(request);
        match lock(&self.response).clone() {
            ScriptedResponse::Succeed(data) => futures::future::ready(Ok(data)).boxed(),
            ScriptedResponse::Fail(message) => {
                futures::future::ready(Err(Error::StreamRequest(message))).boxed()
            }
            ScriptedResponse::Hang => futures::future::pending().boxed(),
        }
    }

    fn stream_time_for_content_time(&self, content_time: f64) -> f64 {
        let mut stream_time = content_time;
        for cue in lock(&self.cue_points).iter() {
            if cue.start > stream_time {
                break;
            }
            stream_time += cue.duration();
        }
        stream_time
    }

    fn content_time_for_stream_time(&self, stream_time: f64) -> f64 {
        let mut content_time = stream_time;
        for cue in lock(&self.cue_points).iter() {
            if cue.end <= stream_time {
                content_time -= cue.duration();
            } else {
                if cue.start <= stream_time {
                    content_time -= stream_time - cue.start;
                }
                break;
            }
        }
        content_time
    }

    fn previous_cue_point_for_stream_time(&self, stream_time: f64) -> Option<CuePoint> {
        lock(&self.cue_points)
            .iter()
            .rev()
            .find(|cue| cue.start <= stream_time)
            .copied()
    }

    fn process_metadata(&self, kind: &str, data: &[u8], pts: f64) {
        lock(&self.metadata).push(MetadataCall::Sample {
            kind: kind.to_string(),
            data: data.to_vec(),
            pts,
        });
    }

    fn on_timed_metadata(&self, metadata: &HashMap<String, String>) {
        lock(&self.metadata).push(MetadataCall::Timed(metadata.clone()));
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// One call made on a [`SimulatedEngine`]
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Play,
    Pause,
    Load(Option<f64>),
    SetSource(String),
    Seek(f64),
    SetRate(f64),
    Reset,
    Destroy,
}

/// In-memory media element over a stream of known length
#[derive(Debug, Clone)]
pub struct SimulatedEngine {
    source: Option<String>,
    stream_duration: f64,
    current_time: f64,
    paused: bool,
    ended: bool,
    playback_rate: f64,
    volume: f64,
    muted: bool,
    live: bool,
    calls: Vec<EngineCall>,
}

impl SimulatedEngine {
    pub fn new(stream_duration: f64) -> Self {
        Self {
            source: None,
            stream_duration,
            current_time: 0.0,
            paused: true,
            ended: false,
            playback_rate: 1.0,
            volume: 1.0,
            muted: false,
            live: false,
            calls: Vec::new(),
        }
    }

    pub fn live(mut self) -> Self {
        self.live = true;
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Seeks issued so far, in order
    pub fn seeks(&self) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Seek(t) => Some(*t),
                _ => None,
            })
            .collect()
    }

    pub fn set_volume(&mut self, volume: f64, muted: bool) {
        self.volume = volume.clamp(0.0, 1.0);
        self.muted = muted;
    }

    /// Advance the playhead by `dt` wall seconds
    ///
    /// Reaching the end of the stream flags `ended` on the following tick,
    /// the way a media element reports end of stream after its last update.
    pub fn advance(&mut self, dt: f64) -> bool {
        if self.paused || self.ended {
            return false;
        }
        if self.current_time >= self.stream_duration {
            self.ended = true;
            self.paused = true;
            return false;
        }
        self.current_time = (self.current_time + dt * self.playback_rate).min(self.stream_duration);
        true
    }
}

impl MediaEngine for SimulatedEngine {
    fn play(&mut self) {
        self.calls.push(EngineCall::Play);
        if self.ended {
            self.ended = false;
            self.current_time = 0.0;
        }
        self.paused = false;
    }

    fn pause(&mut self) {
        self.calls.push(EngineCall::Pause);
        self.paused = true;
    }

    fn load(&mut self, start_time: Option<f64>) {
        self.calls.push(EngineCall::Load(start_time));
        self.current_time = start_time.unwrap_or(0.0).clamp(0.0, self.stream_duration);
        self.ended = false;
        self.paused = true;
    }

    fn set_source(&mut self, url: &str) {
        self.calls.push(EngineCall::SetSource(url.to_string()));
        self.source = Some(url.to_string());
    }

    fn reset(&mut self) {
        self.calls.push(EngineCall::Reset);
        self.source = None;
        self.current_time = 0.0;
        self.paused = true;
        self.ended = false;
        self.playback_rate = 1.0;
    }

    fn destroy(&mut self) {
        self.calls.push(EngineCall::Destroy);
        self.source = None;
        self.paused = true;
    }

    fn current_time(&self) -> f64 {
        self.current_time
    }

    fn set_current_time(&mut self, time: f64) {
        self.calls.push(EngineCall::Seek(time));
        self.current_time = time.clamp(0.0, self.stream_duration);
        self.ended = false;
    }

    fn duration(&self) -> Option<f64> {
        Some(self.stream_duration)
    }

    fn paused(&self) -> bool {
        self.paused
    }

    fn ended(&self) -> bool {
        self.ended
    }

    fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.calls.push(EngineCall::SetRate(rate));
        self.playback_rate = rate;
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn muted(&self) -> bool {
        self.muted
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

/// Ad break the playthrough is currently inside
#[derive(Debug, Clone, Copy)]
struct ActiveBreak {
    index: usize,
    cue: CuePoint,
    quartiles_sent: u8,
}

/// Tick-driven playback of a stitched stream
pub struct Playthrough {
    coordinator: AdBreakCoordinator<SimulatedEngine>,
    session: Arc<ScriptedSession>,
    tick: f64,
    active: Option<ActiveBreak>,
    ended_sent: bool,
}

impl Playthrough {
    /// Content of `content_duration` seconds with ad breaks at `cue_points`
    pub fn new(config: AdInsertionConfig, cue_points: Vec<CuePoint>, content_duration: f64) -> Self {
        let ad_total: f64 = cue_points.iter().map(CuePoint::duration).sum();
        let session = Arc::new(ScriptedSession::new(cue_points));
        let bootstrap = SdkBootstrap::ready(session.clone());
        let engine = SimulatedEngine::new(content_duration + ad_total);
        Self {
            coordinator: AdBreakCoordinator::new(config, engine, bootstrap),
            session,
            tick: 1.0,
            active: None,
            ended_sent: false,
        }
    }

    /// Wall seconds per step
    pub fn with_tick(mut self, tick: f64) -> Self {
        self.tick = tick;
        self
    }

    pub fn coordinator(&self) -> &AdBreakCoordinator<SimulatedEngine> {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut AdBreakCoordinator<SimulatedEngine> {
        &mut self.coordinator
    }

    pub fn session(&self) -> &Arc<ScriptedSession> {
        &self.session
    }

    pub async fn load(&mut self, start_time: Option<f64>) -> Result<()> {
        self.coordinator.load(start_time).await?;
        self.coordinator
            .handle_stream_event(StreamEvent::CuePointsChanged(self.session.cue_points()));
        self.coordinator.handle_stream_event(StreamEvent::Loaded);
        self.coordinator
            .handle_media_event(MediaEvent::new(MediaEventKind::LoadedMetadata));
        Ok(())
    }

    pub fn play(&mut self) -> Result<()> {
        self.coordinator.play()?;
        self.coordinator.handle_media_event(MediaEventKind::Play.into());
        self.coordinator
            .handle_media_event(MediaEventKind::Playing.into());
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.coordinator.pause()?;
        self.coordinator.handle_media_event(MediaEventKind::Pause.into());
        Ok(())
    }

    /// Viewer seek to a content time
    pub fn seek(&mut self, content_time: f64) -> Result<()> {
        self.coordinator
            .handle_media_event(MediaEventKind::Seeking.into());
        self.coordinator.set_current_time(content_time)?;
        self.coordinator
            .handle_media_event(MediaEventKind::Seeked.into());
        Ok(())
    }

    /// Advance one tick and raise the events it produces
    pub fn step(&mut self) {
        let moved = self.coordinator.engine_mut().advance(self.tick);
        let now = self.coordinator.engine().current_time();

        if moved {
            self.coordinator
                .handle_media_event(MediaEventKind::TimeUpdate.into());
        }

        match self.active {
            None => self.maybe_enter_break(now),
            Some(active) => self.progress_break(active, now),
        }

        if self.coordinator.engine().ended() && !self.ended_sent {
            self.ended_sent = true;
            self.coordinator.handle_media_event(MediaEventKind::Ended.into());
        }
    }

    /// Step until the stream ends or `max_steps` is reached; returns steps taken
    pub fn run(&mut self, max_steps: usize) -> usize {
        let mut steps = 0;
        while steps < max_steps && !self.ended_sent {
            self.step();
            steps += 1;
        }
        steps
    }

    pub fn finished(&self) -> bool {
        self.ended_sent
    }

    fn maybe_enter_break(&mut self, now: f64) {
        let cue_points = self.session.cue_points();
        let Some((index, cue)) = cue_points
            .iter()
            .enumerate()
            .find(|(_, cue)| !cue.played && cue.contains(now))
        else {
            return;
        };

        self.active = Some(ActiveBreak {
            index,
            cue: *cue,
            quartiles_sent: 0,
        });
        self.coordinator.handle_stream_event(StreamEvent::AdBreakStarted);
        self.coordinator.handle_stream_event(StreamEvent::Started(AdInfo {
            ad_id: Some(format!("sim-ad-{}", index)),
            title: Some(format!("Simulated ad {}", index + 1)),
            duration: Some(cue.duration()),
            position_in_break: Some(1),
            total_in_break: Some(1),
        }));
    }

    fn progress_break(&mut self, mut active: ActiveBreak, now: f64) {
        let duration = active.cue.duration();
        let elapsed = (now - active.cue.start).clamp(0.0, duration);
        self.coordinator.handle_stream_event(StreamEvent::AdProgress {
            current_time: elapsed,
            duration,
        });

        let quartiles = [
            StreamEvent::FirstQuartile,
            StreamEvent::Midpoint,
            StreamEvent::ThirdQuartile,
        ];
        while (active.quartiles_sent as usize) < quartiles.len()
            && elapsed >= duration * f64::from(active.quartiles_sent + 1) / 4.0
        {
            self.coordinator
                .handle_stream_event(quartiles[active.quartiles_sent as usize].clone());
            active.quartiles_sent += 1;
        }

        if !active.cue.contains(now) {
            self.active = None;
            self.coordinator.handle_stream_event(StreamEvent::Complete);
            let cue_points = self.session.mark_played(active.index);
            self.coordinator
                .handle_stream_event(StreamEvent::CuePointsChanged(cue_points));
            self.coordinator.handle_stream_event(StreamEvent::AdBreakEnded);
        } else {
            self.active = Some(active);
        }
    }
}
