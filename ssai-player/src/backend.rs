//! Ad-decision backend interface
//!
//! The ad library is an injected capability: an [`SdkBootstrap`] resolves
//! once to a shared [`StreamSession`], which the coordinator holds for the
//! lifetime of a playback session. Backend pushes arrive as [`StreamEvent`]s.

use crate::error::{Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use ssai_common::events::{AdInfo, CuePoint};
use ssai_common::StreamIdentity;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Which stream the backend should stitch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
    Live {
        asset_key: Option<String>,
    },
    Vod {
        content_source_id: Option<String>,
        video_id: Option<String>,
    },
}

/// Stream request, built verbatim from the configured backend identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub kind: StreamKind,
    pub api_key: Option<String>,
    pub auth_token: Option<String>,
    pub locale: Option<String>,
    pub format: Option<String>,
}

impl StreamRequest {
    pub fn from_identity(identity: &StreamIdentity) -> Self {
        let kind = if identity.live {
            StreamKind::Live {
                asset_key: identity.asset_key.clone(),
            }
        } else {
            StreamKind::Vod {
                content_source_id: identity.content_source_id.clone(),
                video_id: identity.video_id.clone(),
            }
        };
        Self {
            kind,
            api_key: identity.api_key.clone(),
            auth_token: identity.auth_token.clone(),
            locale: identity.locale.clone(),
            format: identity.format.clone(),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.kind, StreamKind::Live { .. })
    }
}

/// Successful stream request response
#[derive(Debug, Clone, PartialEq)]
pub struct StreamData {
    /// Playable stitched stream URL
    pub url: String,
    pub stream_id: Option<String>,
    /// Ad break layout, sorted by start
    pub cue_points: Vec<CuePoint>,
}

/// Events pushed by the backend session
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Loaded,
    Error { message: String },
    CuePointsChanged(Vec<CuePoint>),
    AdBreakStarted,
    AdBreakEnded,
    AdProgress { current_time: f64, duration: f64 },
    Started(AdInfo),
    FirstQuartile,
    Midpoint,
    ThirdQuartile,
    Complete,
    Click,
}

/// Backend stream session (the ad library's stream manager)
///
/// Implementations use interior mutability; the session is shared between
/// the coordinator and in-flight stream requests.
pub trait StreamSession: Send + Sync {
    /// Library version string, logged at bootstrap
    fn version(&self) -> String;

    /// Request a stitched stream
    fn request_stream(&self, request: StreamRequest) -> BoxFuture<'static, Result<StreamData>>;

    fn stream_time_for_content_time(&self, content_time: f64) -> f64;

    fn content_time_for_stream_time(&self, stream_time: f64) -> f64;

    fn previous_cue_point_for_stream_time(&self, stream_time: f64) -> Option<CuePoint>;

    /// Feed one in-band metadata sample (e.g. kind `"ID3"`)
    fn process_metadata(&self, kind: &str, data: &[u8], pts: f64);

    /// Feed parsed text-track metadata
    fn on_timed_metadata(&self, metadata: &HashMap<String, String>);

    /// Drop the current stream session
    fn reset(&self);
}

type SessionOutcome = std::result::Result<Arc<dyn StreamSession>, String>;

/// Deferred ad library acquisition
///
/// Cloneable handle to a shared one-shot future. Every waiter observes the
/// same outcome; waiting before resolution queues behind it.
#[derive(Clone)]
pub struct SdkBootstrap {
    inner: Shared<BoxFuture<'static, SessionOutcome>>,
}

impl SdkBootstrap {
    /// Bootstrap that resolves when `future` does
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Arc<dyn StreamSession>>> + Send + 'static,
    {
        let inner = async move { future.await.map_err(|e| e.to_string()) }
            .boxed()
            .shared();
        Self { inner }
    }

    /// Library already present
    pub fn ready(session: Arc<dyn StreamSession>) -> Self {
        Self::pending(async move { Ok(session) })
    }

    /// Library failed to load
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        let inner = async move { SessionOutcome::Err(message) }.boxed().shared();
        Self { inner }
    }

    /// Wait for the library
    pub async fn session(&self) -> Result<Arc<dyn StreamSession>> {
        self.inner.clone().await.map_err(Error::Bootstrap)
    }

    /// Session if bootstrap already succeeded, without waiting
    pub fn ready_session(&self) -> Option<Arc<dyn StreamSession>> {
        match self.inner.peek() {
            Some(Ok(session)) => Some(session.clone()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for SdkBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self.inner.peek() {
            None => "pending",
            Some(Ok(_)) => "ready",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("SdkBootstrap").field("status", &status).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vod_request_from_identity() {
        let identity = StreamIdentity {
            content_source_id: Some("2528370".to_string()),
            video_id: Some("tears-of-steel".to_string()),
            api_key: Some("key".to_string()),
            ..Default::default()
        };
        let request = StreamRequest::from_identity(&identity);
        assert!(!request.is_live());
        assert_eq!(
            request.kind,
            StreamKind::Vod {
                content_source_id: Some("2528370".to_string()),
                video_id: Some("tears-of-steel".to_string()),
            }
        );
        assert_eq!(request.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_live_request_from_identity() {
        let identity = StreamIdentity {
            live: true,
            asset_key: Some("sN_IYUG8STe1ZzhIIE_ksA".to_string()),
            ..Default::default()
        };
        let request = StreamRequest::from_identity(&identity);
        assert!(request.is_live());
        assert_eq!(request.api_key, None);
    }

    #[tokio::test]
    async fn test_failed_bootstrap_reports_error() {
        let bootstrap = SdkBootstrap::failed("blocked by client");
        let result = bootstrap.session().await;
        assert!(matches!(result, Err(Error::Bootstrap(msg)) if msg.contains("blocked by client")));
        assert!(bootstrap.ready_session().is_none());
    }

    #[tokio::test]
    async fn test_pending_bootstrap_shared_between_clones() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let bootstrap = SdkBootstrap::pending(async move {
            let _ = rx.await;
            Err(Error::Bootstrap("script error".to_string()))
        });
        let clone = bootstrap.clone();
        assert_eq!(format!("{:?}", clone), "SdkBootstrap { status: \"pending\" }");

        tx.send(()).unwrap();
        assert!(bootstrap.session().await.is_err());
        assert!(clone.session().await.is_err());
    }
}
