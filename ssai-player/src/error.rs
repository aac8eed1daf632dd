//! Error types for ssai-player
//!
//! Ad subsystem faults (bootstrap, stream request) are recovered inside the
//! coordinator and only surface here so they can be logged; the one loud
//! error is popping an empty event queue.

use std::time::Duration;
use thiserror::Error;

/// Main error type for ssai-player
#[derive(Error, Debug)]
pub enum Error {
    /// Pop called on an empty event queue (caller contract violation)
    #[error("Event queue is empty")]
    EmptyQueue,

    /// Ad library could not be loaded (blocked, network failure)
    #[error("Ad library bootstrap failed: {0}")]
    Bootstrap(String),

    /// Backend rejected or failed the stream request
    #[error("Stream request failed: {0}")]
    StreamRequest(String),

    /// Stream request did not resolve in time
    #[error("Stream request timed out after {0:?}")]
    StreamRequestTimeout(Duration),

    /// Load superseded by reset/destroy or a newer load
    #[error("Load cancelled")]
    LoadCancelled,

    /// Operation on a destroyed coordinator
    #[error("Invalid state: coordinator destroyed")]
    Destroyed,
}

/// Convenience Result type using ssai-player Error
pub type Result<T> = std::result::Result<T, Error>;
