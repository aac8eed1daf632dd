//! Ad break type definitions
//!
//! Cue points as declared by the ad-decision backend and the descriptors
//! derived from them when a break starts.

use serde::{Deserialize, Serialize};

/// Backend-declared interval of one stitched ad break, in stream time seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CuePoint {
    pub start: f64,
    pub end: f64,
    pub played: bool,
}

impl CuePoint {
    pub fn new(start: f64, end: f64, played: bool) -> Self {
        Self { start, end, played }
    }

    /// Whether `stream_time` falls inside `[start, end)`
    pub fn contains(&self, stream_time: f64) -> bool {
        stream_time >= self.start && stream_time < self.end
    }

    /// Length of the break in seconds
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Ad break position classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdBreakType {
    Pre,
    Mid,
    Post,
}

impl std::fmt::Display for AdBreakType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdBreakType::Pre => write!(f, "pre"),
            AdBreakType::Mid => write!(f, "mid"),
            AdBreakType::Post => write!(f, "post"),
        }
    }
}

/// Position and type of an ad break, computed when the break starts
///
/// `position` is in content seconds: `0` for a preroll, `-1` for a postroll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdBreakDescriptor {
    pub position: f64,
    #[serde(rename = "type")]
    pub break_type: AdBreakType,
}

impl AdBreakDescriptor {
    /// Position value encoding a postroll
    pub const POSTROLL_POSITION: f64 = -1.0;

    pub fn preroll() -> Self {
        Self {
            position: 0.0,
            break_type: AdBreakType::Pre,
        }
    }

    pub fn midroll(position: f64) -> Self {
        Self {
            position,
            break_type: AdBreakType::Mid,
        }
    }

    pub fn postroll() -> Self {
        Self {
            position: Self::POSTROLL_POSITION,
            break_type: AdBreakType::Post,
        }
    }

    pub fn is_preroll(&self) -> bool {
        self.break_type == AdBreakType::Pre
    }

    pub fn is_postroll(&self) -> bool {
        self.break_type == AdBreakType::Post
    }
}

/// Creative details reported by the backend when an ad starts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdInfo {
    #[serde(default)]
    pub ad_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Creative duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    /// 1-based index of the ad within its break
    #[serde(default)]
    pub position_in_break: Option<u32>,
    /// Number of ads in the break
    #[serde(default)]
    pub total_in_break: Option<u32>,
}
