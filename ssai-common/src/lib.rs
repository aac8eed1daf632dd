//! # SSAI Common Library
//!
//! Shared code for the server-side ad insertion crates including:
//! - Outward player event types (PlayerEvent enum) and the EventBus
//! - Native media event types consumed from the media engine
//! - Cue point and ad break descriptors
//! - Configuration loading

pub mod config;
pub mod error;
pub mod events;

pub use config::{AdInsertionConfig, StreamIdentity, TimeFallback};
pub use error::{Error, Result};
pub use events::{EventBus, PlayerEvent};
