// Shared types for the beatgrid crates

pub mod error;
pub mod events;
pub mod model;
pub mod time;

pub use error::{AudioError, Result, SequencerError};
pub use events::{EventBus, SequencerEvent, SharedEventBus};
pub use model::{default_kit, Instrument, TempoRange};
pub use time::ScheduledTime;
