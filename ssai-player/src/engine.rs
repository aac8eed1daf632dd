//! Media engine interface
//!
//! The raw media element the coordinator decorates. Ads are stitched into the
//! stream, so ad creatives play through this same engine.

/// Playback control surface of the underlying media engine
///
/// All times are in stream seconds (the engine knows nothing about ads).
pub trait MediaEngine {
    fn play(&mut self);
    fn pause(&mut self);

    /// Load the current source, optionally starting at `start_time`
    fn load(&mut self, start_time: Option<f64>);

    /// Replace the media source URL
    fn set_source(&mut self, url: &str);

    fn reset(&mut self);
    fn destroy(&mut self);

    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, time: f64);

    /// Stream duration, `None` until metadata is known
    fn duration(&self) -> Option<f64>;

    fn paused(&self) -> bool;
    fn ended(&self) -> bool;

    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&mut self, rate: f64);

    /// Volume in 0.0-1.0
    fn volume(&self) -> f64;
    fn muted(&self) -> bool;

    /// Whether the loaded source is a live broadcast
    fn is_live(&self) -> bool;
}
