//! Native media event type definitions
//!
//! Events raised by the underlying media engine before they are mediated
//! against ad break state.

use serde::{Deserialize, Serialize};

/// Native media engine event kinds
///
/// Closed set of signals the media element can raise. `TimedMetadata` is the
/// in-band metadata carrier (ID3 samples or text cues) used by the ad backend
/// to track stitched ad positions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaEventKind {
    Play,
    Playing,
    Pause,
    Ended,
    TimeUpdate,
    Progress,
    Seeking,
    Seeked,
    VolumeChange,
    DurationChange,
    LoadedMetadata,
    LoadedData,
    CanPlay,
    Waiting,
    RateChange,
    Error,
    TimedMetadata,
}

impl MediaEventKind {
    /// Every kind, in declaration order
    pub const ALL: [MediaEventKind; 17] = [
        MediaEventKind::Play,
        MediaEventKind::Playing,
        MediaEventKind::Pause,
        MediaEventKind::Ended,
        MediaEventKind::TimeUpdate,
        MediaEventKind::Progress,
        MediaEventKind::Seeking,
        MediaEventKind::Seeked,
        MediaEventKind::VolumeChange,
        MediaEventKind::DurationChange,
        MediaEventKind::LoadedMetadata,
        MediaEventKind::LoadedData,
        MediaEventKind::CanPlay,
        MediaEventKind::Waiting,
        MediaEventKind::RateChange,
        MediaEventKind::Error,
        MediaEventKind::TimedMetadata,
    ];

    /// Lowercase wire name of the kind (matches serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaEventKind::Play => "play",
            MediaEventKind::Playing => "playing",
            MediaEventKind::Pause => "pause",
            MediaEventKind::Ended => "ended",
            MediaEventKind::TimeUpdate => "timeupdate",
            MediaEventKind::Progress => "progress",
            MediaEventKind::Seeking => "seeking",
            MediaEventKind::Seeked => "seeked",
            MediaEventKind::VolumeChange => "volumechange",
            MediaEventKind::DurationChange => "durationchange",
            MediaEventKind::LoadedMetadata => "loadedmetadata",
            MediaEventKind::LoadedData => "loadeddata",
            MediaEventKind::CanPlay => "canplay",
            MediaEventKind::Waiting => "waiting",
            MediaEventKind::RateChange => "ratechange",
            MediaEventKind::Error => "error",
            MediaEventKind::TimedMetadata => "timedmetadata",
        }
    }
}

impl std::fmt::Display for MediaEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ID3 sample lifted from the transport stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSample {
    /// Raw ID3 frame bytes
    pub data: Vec<u8>,
    /// Presentation timestamp in seconds
    pub pts: f64,
}

/// In-band timed metadata carried by a `TimedMetadata` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "entries", rename_all = "lowercase")]
pub enum TimedMetadata {
    /// ID3 samples (HLS transport streams)
    Id3(Vec<MetadataSample>),
    /// Text track cues as key/value pairs
    Cues(Vec<(String, String)>),
}

/// Event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaPayload {
    Metadata(TimedMetadata),
    Value(serde_json::Value),
}

/// A native media engine event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEvent {
    pub kind: MediaEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<MediaPayload>,
}

impl MediaEvent {
    /// Create an event with no payload
    pub fn new(kind: MediaEventKind) -> Self {
        Self { kind, payload: None }
    }

    /// Create an event carrying a JSON payload
    pub fn with_value(kind: MediaEventKind, value: serde_json::Value) -> Self {
        Self {
            kind,
            payload: Some(MediaPayload::Value(value)),
        }
    }

    /// Create a timed metadata event
    pub fn timed_metadata(metadata: TimedMetadata) -> Self {
        Self {
            kind: MediaEventKind::TimedMetadata,
            payload: Some(MediaPayload::Metadata(metadata)),
        }
    }

    /// Timed metadata carried by this event, if any
    pub fn metadata(&self) -> Option<&TimedMetadata> {
        match &self.payload {
            Some(MediaPayload::Metadata(metadata)) => Some(metadata),
            _ => None,
        }
    }
}

impl From<MediaEventKind> for MediaEvent {
    fn from(kind: MediaEventKind) -> Self {
        MediaEvent::new(kind)
    }
}
