//! Ad plugin state management

use serde::{Deserialize, Serialize};

/// Ad plugin lifecycle state
///
/// Single authoritative state owned by the coordinator:
/// `Idle → Loading → Loaded → Playing ⇄ Paused → Idle ... → Done`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    #[default]
    Idle,
    /// Stream request in flight
    Loading,
    /// Stitched stream loaded, no ad playing
    Loaded,
    /// An ad creative is playing
    Playing,
    /// An ad creative is paused
    Paused,
    /// Every scheduled ad break has played
    Done,
}

impl PluginState {
    /// Whether an ad creative is currently started (playing or paused)
    pub fn ad_in_progress(&self) -> bool {
        matches!(self, PluginState::Playing | PluginState::Paused)
    }
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginState::Idle => write!(f, "idle"),
            PluginState::Loading => write!(f, "loading"),
            PluginState::Loaded => write!(f, "loaded"),
            PluginState::Playing => write!(f, "playing"),
            PluginState::Paused => write!(f, "paused"),
            PluginState::Done => write!(f, "done"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(PluginState::default(), PluginState::Idle);
    }

    #[test]
    fn test_ad_in_progress() {
        assert!(PluginState::Playing.ad_in_progress());
        assert!(PluginState::Paused.ad_in_progress());
        assert!(!PluginState::Loaded.ad_in_progress());
        assert!(!PluginState::Done.ad_in_progress());
    }

    #[test]
    fn test_display_matches_serde() {
        for state in [
            PluginState::Idle,
            PluginState::Loading,
            PluginState::Loaded,
            PluginState::Playing,
            PluginState::Paused,
            PluginState::Done,
        ] {
            let json = serde_json::to_value(state).unwrap();
            assert_eq!(json, state.to_string());
        }
    }
}
