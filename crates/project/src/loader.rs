use std::fs;
use std::path::{Path, PathBuf};

use dirs::config_dir;
use log::{info, warn};

use crate::error::ConfigError;
use crate::model::SessionFile;

/// Where a named session lives: `sessions/<name>.toml` during development,
/// otherwise under the user's config directory
pub fn get_session_path(session_name: &str) -> PathBuf {
    let file_name = format!("{}.toml", session_name);
    let dev_path = PathBuf::from("sessions").join(&file_name);
    if dev_path.exists() {
        return dev_path;
    }

    let base = config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("beatgrid").join(file_name)
}

/// Parse and validate a session document
pub fn parse_session(text: &str) -> Result<SessionFile, ConfigError> {
    let mut session: SessionFile = toml::from_str(text)?;
    session.validate()?;

    let range = session.tempo_range();
    if !range.contains(session.session.bpm) {
        let clamped = range.clamp(session.session.bpm);
        warn!(
            "Session tempo {} is outside {}..={}, using {}",
            session.session.bpm, range.min, range.max, clamped
        );
        session.session.bpm = clamped;
    }
    Ok(session)
}

pub fn load_session<P: AsRef<Path>>(path: P) -> Result<SessionFile, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let session = parse_session(&text)?;
    info!(
        "Loaded session '{}' from {} ({} instruments)",
        session.session.name,
        path.display(),
        session.instruments.len()
    );
    Ok(session)
}

/// Load the given file, or the default session path, or fall back to the built-in kit
pub fn load_or_default(path: Option<&Path>) -> Result<SessionFile, ConfigError> {
    if let Some(path) = path {
        return load_session(path);
    }

    let default_path = get_session_path("session");
    if default_path.exists() {
        load_session(default_path)
    } else {
        info!("No session file found, using the built-in kit");
        Ok(SessionFile::default())
    }
}
