//! # SSAI Player Library (ssai-player)
//!
//! Ad break mediation for server-side ad insertion streams.
//!
//! **Purpose:** Decorate a media engine playing a stitched stream so that the
//! surrounding player sees content time, never seeks past unplayed ad breaks
//! and receives native media events in an order that makes sense around ads.
//!
//! **Architecture:** [`AdBreakCoordinator`] owns the plugin state and routes
//! control through a borrowed [`TimeMapper`] and native events through the
//! [`EventMediator`]. The ad-decision backend is injected through
//! [`SdkBootstrap`]; outward events go out on an `EventBus`.

pub mod backend;
pub mod engine;
pub mod error;
pub mod playback;
pub mod sim;

pub use backend::{SdkBootstrap, StreamData, StreamEvent, StreamRequest, StreamSession};
pub use engine::MediaEngine;
pub use error::{Error, Result};
pub use playback::{AdBreakCoordinator, EventMediator, EventQueue, PluginState, TimeMapper};
