pub mod error;
pub mod loader;
pub mod model;

pub use error::ConfigError;
pub use loader::{get_session_path, load_or_default, load_session, parse_session};
pub use model::{InstrumentEntry, SessionFile, SessionSettings};
