//! Content time ↔ stream time translation
//!
//! Stream time includes stitched ad durations, content time does not. The
//! mapper is a borrowed view over the backend session and the current cue
//! point list; it owns nothing and advances no state, so the same input
//! with the same cue points always yields the same output.
//!
//! # Snapback
//!
//! When snapback is requested and the last cue point starting at or before
//! the translated stream time is unplayed, the seek is redirected to that
//! cue point's start and the original content time is handed back as the
//! saved seek target. Because `played` flips as breaks finish, callers
//! re-derive after every break end instead of caching results.

use crate::backend::StreamSession;
use ssai_common::events::CuePoint;
use ssai_common::TimeFallback;
use tracing::debug;

/// Result of translating a content-time seek
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamSeek {
    /// Where the engine should actually go
    pub stream_time: f64,
    /// Viewer's original target when snapback redirected the seek
    pub saved_seek_time: Option<f64>,
}

impl StreamSeek {
    fn direct(stream_time: f64) -> Self {
        Self {
            stream_time,
            saved_seek_time: None,
        }
    }

    pub fn snapped_back(&self) -> bool {
        self.saved_seek_time.is_some()
    }
}

/// Borrowed translation view
#[derive(Clone, Copy)]
pub struct TimeMapper<'a> {
    session: Option<&'a dyn StreamSession>,
    cue_points: &'a [CuePoint],
    fallback: TimeFallback,
}

impl<'a> TimeMapper<'a> {
    pub fn new(
        session: Option<&'a dyn StreamSession>,
        cue_points: &'a [CuePoint],
        fallback: TimeFallback,
    ) -> Self {
        Self {
            session,
            cue_points,
            fallback,
        }
    }

    /// Whether a stream session exists to translate against
    pub fn has_mapping(&self) -> bool {
        self.session.is_some()
    }

    /// Translate a content time into the stream time to seek to
    ///
    /// Without a session the fallback policy applies to the input.
    pub fn stream_time_for_content(&self, content_time: f64, snapback: bool) -> StreamSeek {
        let Some(session) = self.session else {
            return StreamSeek::direct(self.fallback.apply(content_time));
        };

        let stream_time = session.stream_time_for_content_time(content_time);
        if snapback {
            if let Some(cue) = self.previous_cue_point(stream_time) {
                if !cue.played {
                    debug!(
                        "Snapback: content {:.3}s -> cue start {:.3}s (target stream {:.3}s)",
                        content_time, cue.start, stream_time
                    );
                    return StreamSeek {
                        stream_time: cue.start,
                        saved_seek_time: Some(content_time),
                    };
                }
            }
        }
        StreamSeek::direct(stream_time)
    }

    /// Translate a stream time into content time; `None` without a session
    pub fn content_time_for_stream(&self, stream_time: f64) -> Option<f64> {
        self.session
            .map(|session| session.content_time_for_stream_time(stream_time))
    }

    /// Content time for `stream_time`, falling back per policy
    pub fn content_time_or_fallback(&self, stream_time: f64) -> f64 {
        self.content_time_for_stream(stream_time)
            .unwrap_or_else(|| self.fallback.apply(stream_time))
    }

    /// Last cue point starting at or before `stream_time`
    pub fn previous_cue_point(&self, stream_time: f64) -> Option<&'a CuePoint> {
        self.cue_points
            .iter()
            .rev()
            .find(|cue| cue.start <= stream_time)
    }

    /// Cue point whose interval contains `stream_time`
    pub fn cue_point_at(&self, stream_time: f64) -> Option<&'a CuePoint> {
        self.cue_points.iter().find(|cue| cue.contains(stream_time))
    }

    /// Cue point starts expressed in content time
    pub fn ad_break_positions(&self) -> Vec<f64> {
        self.cue_points
            .iter()
            .map(|cue| self.content_time_or_fallback(cue.start))
            .collect()
    }

    /// Whether every cue point other than `just_ended` has played
    pub fn all_played_except(&self, just_ended: Option<&CuePoint>) -> bool {
        self.cue_points
            .iter()
            .all(|cue| cue.played || Some(cue) == just_ended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedSession;

    fn cues() -> Vec<CuePoint> {
        vec![
            CuePoint::new(0.0, 30.0, false),
            CuePoint::new(130.0, 160.0, false),
            CuePoint::new(360.0, 390.0, false),
        ]
    }

    #[test]
    fn test_no_session_passthrough() {
        let cue_points = cues();
        let mapper = TimeMapper::new(None, &cue_points, TimeFallback::Passthrough);
        assert!(!mapper.has_mapping());
        assert_eq!(
            mapper.stream_time_for_content(42.0, true),
            StreamSeek::direct(42.0)
        );
        assert_eq!(mapper.content_time_for_stream(42.0), None);
        assert_eq!(mapper.content_time_or_fallback(42.0), 42.0);
    }

    #[test]
    fn test_no_session_zero_fallback() {
        let mapper = TimeMapper::new(None, &[], TimeFallback::Zero);
        assert_eq!(mapper.stream_time_for_content(42.0, false).stream_time, 0.0);
        assert_eq!(mapper.content_time_or_fallback(42.0), 0.0);
    }

    #[test]
    fn test_translation_without_snapback() {
        let cue_points = cues();
        let session = ScriptedSession::new(cue_points.clone());
        let mapper = TimeMapper::new(Some(&session), &cue_points, TimeFallback::Passthrough);

        // Preroll (30s) precedes content 0
        assert_eq!(mapper.stream_time_for_content(0.0, false).stream_time, 30.0);
        // A break position maps past the break, like content 0 past the preroll
        assert_eq!(mapper.stream_time_for_content(100.0, false).stream_time, 160.0);
        assert_eq!(mapper.stream_time_for_content(99.0, false).stream_time, 129.0);
        // 150s of content + preroll + first midroll
        assert_eq!(mapper.stream_time_for_content(150.0, false).stream_time, 210.0);

        assert_eq!(mapper.content_time_for_stream(210.0), Some(150.0));
        // Inside a break, content time is pinned at the break position
        assert_eq!(mapper.content_time_for_stream(145.0), Some(100.0));
    }

    #[test]
    fn test_snapback_into_unplayed_interval() {
        let cue_points = vec![
            CuePoint::new(0.0, 30.0, true),
            CuePoint::new(130.0, 160.0, false),
        ];
        let session = ScriptedSession::new(cue_points.clone());
        let mapper = TimeMapper::new(Some(&session), &cue_points, TimeFallback::Passthrough);

        let seek = mapper.stream_time_for_content(150.0, true);
        assert_eq!(seek.stream_time, 130.0);
        assert_eq!(seek.saved_seek_time, Some(150.0));
        assert!(seek.snapped_back());
    }

    #[test]
    fn test_snapback_skips_played_breaks() {
        let cue_points = vec![
            CuePoint::new(0.0, 30.0, true),
            CuePoint::new(130.0, 160.0, true),
        ];
        let session = ScriptedSession::new(cue_points.clone());
        let mapper = TimeMapper::new(Some(&session), &cue_points, TimeFallback::Passthrough);

        let seek = mapper.stream_time_for_content(150.0, true);
        assert_eq!(seek, StreamSeek::direct(210.0));
    }

    #[test]
    fn test_seek_before_any_unplayed_break_is_direct() {
        let cue_points = vec![
            CuePoint::new(0.0, 30.0, true),
            CuePoint::new(130.0, 160.0, false),
        ];
        let session = ScriptedSession::new(cue_points.clone());
        let mapper = TimeMapper::new(Some(&session), &cue_points, TimeFallback::Passthrough);

        assert_eq!(mapper.stream_time_for_content(50.0, true), StreamSeek::direct(80.0));
    }

    #[test]
    fn test_translation_is_idempotent() {
        let cue_points = cues();
        let session = ScriptedSession::new(cue_points.clone());
        let mapper = TimeMapper::new(Some(&session), &cue_points, TimeFallback::Passthrough);

        let first = mapper.stream_time_for_content(250.0, true);
        let second = mapper.stream_time_for_content(250.0, true);
        assert_eq!(first, second);
    }

    #[test]
    fn test_played_flag_changes_output() {
        let unplayed = vec![CuePoint::new(130.0, 160.0, false)];
        let played = vec![CuePoint::new(130.0, 160.0, true)];
        let session = ScriptedSession::new(unplayed.clone());

        let before = TimeMapper::new(Some(&session), &unplayed, TimeFallback::Passthrough)
            .stream_time_for_content(150.0, true);
        let after = TimeMapper::new(Some(&session), &played, TimeFallback::Passthrough)
            .stream_time_for_content(150.0, true);
        assert_eq!(before.stream_time, 130.0);
        assert_eq!(after.stream_time, 180.0);
    }

    #[test]
    fn test_ad_break_positions_in_content_time() {
        let cue_points = cues();
        let session = ScriptedSession::new(cue_points.clone());
        let mapper = TimeMapper::new(Some(&session), &cue_points, TimeFallback::Passthrough);
        assert_eq!(mapper.ad_break_positions(), vec![0.0, 100.0, 300.0]);
    }

    #[test]
    fn test_all_played_except() {
        let cue_points = vec![
            CuePoint::new(0.0, 30.0, true),
            CuePoint::new(130.0, 160.0, false),
        ];
        let mapper = TimeMapper::new(None, &cue_points, TimeFallback::Passthrough);
        assert!(!mapper.all_played_except(None));
        assert!(mapper.all_played_except(Some(&cue_points[1])));
        assert_eq!(mapper.cue_point_at(140.0), Some(&cue_points[1]));
        assert_eq!(mapper.cue_point_at(100.0), None);
    }
}
