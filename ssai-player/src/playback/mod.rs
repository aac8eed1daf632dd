//! Ad break coordination, time mapping and event mediation

pub mod coordinator;
pub mod event_mediator;
pub mod event_queue;
pub mod state;
pub mod time_mapper;

pub use coordinator::{classify_ad_break, AdBreakCoordinator, LoadOutcome, PendingLoad};
pub use event_mediator::{Disposition, EventClass, EventMediator};
pub use event_queue::{EventQueue, QueuedEvent};
pub use state::PluginState;
pub use time_mapper::{StreamSeek, TimeMapper};
