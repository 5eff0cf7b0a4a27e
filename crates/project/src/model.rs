use std::collections::HashSet;

use grid_core::{default_kit, Instrument, TempoRange};
use serde::Deserialize;

use crate::error::ConfigError;

/// A session file: transport settings plus the instrument rows
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionFile {
    pub session: SessionSettings,
    pub instruments: Vec<InstrumentEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionSettings {
    pub name: String,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default = "default_bpm")]
    pub bpm: u32,
    #[serde(default = "default_min_bpm")]
    pub min_bpm: u32,
    #[serde(default = "default_max_bpm")]
    pub max_bpm: u32,
    #[serde(default = "default_steps_per_beat")]
    pub steps_per_beat: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstrumentEntry {
    pub id: String,
    pub label: Option<String>,
    /// Preset cells, one character per step: 'x' on, '.' off
    pub pattern: Option<String>,
}

fn default_steps() -> usize {
    16
}

fn default_bpm() -> u32 {
    120
}

fn default_min_bpm() -> u32 {
    60
}

fn default_max_bpm() -> u32 {
    180
}

fn default_steps_per_beat() -> u32 {
    4
}

impl Default for SessionFile {
    fn default() -> Self {
        Self {
            session: SessionSettings {
                name: "Untitled".to_string(),
                steps: default_steps(),
                bpm: default_bpm(),
                min_bpm: default_min_bpm(),
                max_bpm: default_max_bpm(),
                steps_per_beat: default_steps_per_beat(),
            },
            instruments: default_kit()
                .into_iter()
                .map(|instrument| InstrumentEntry {
                    id: instrument.id,
                    label: Some(instrument.label),
                    pattern: None,
                })
                .collect(),
        }
    }
}

impl SessionFile {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let settings = &self.session;
        if self.instruments.is_empty() {
            return Err(ConfigError::Invalid("at least one instrument is required".into()));
        }
        if settings.steps == 0 {
            return Err(ConfigError::Invalid("steps must be at least 1".into()));
        }
        if settings.steps_per_beat == 0 {
            return Err(ConfigError::Invalid("steps_per_beat must be at least 1".into()));
        }
        if settings.min_bpm == 0 || settings.min_bpm > settings.max_bpm {
            return Err(ConfigError::Invalid(format!(
                "tempo range {}..={} is not valid",
                settings.min_bpm, settings.max_bpm
            )));
        }

        let mut seen = HashSet::new();
        for entry in &self.instruments {
            if !seen.insert(entry.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate instrument id '{}'", entry.id)));
            }
            if let Some(pattern) = &entry.pattern {
                parse_pattern(pattern, settings.steps).map_err(|reason| {
                    ConfigError::Invalid(format!("pattern for '{}': {}", entry.id, reason))
                })?;
            }
        }
        Ok(())
    }

    pub fn instruments(&self) -> Vec<Instrument> {
        self.instruments
            .iter()
            .map(|entry| {
                let label = entry.label.clone().unwrap_or_else(|| entry.id.clone());
                Instrument::new(entry.id.clone(), label)
            })
            .collect()
    }

    pub fn tempo_range(&self) -> TempoRange {
        TempoRange::new(self.session.min_bpm, self.session.max_bpm)
    }

    /// Preset rows if any instrument carries a pattern; rows without one are empty.
    /// A pattern that does not fit the session is an error, never an empty row.
    pub fn initial_pattern(&self) -> Result<Option<Vec<Vec<bool>>>, ConfigError> {
        if self.instruments.iter().all(|entry| entry.pattern.is_none()) {
            return Ok(None);
        }
        let steps = self.session.steps;
        self.instruments
            .iter()
            .map(|entry| match &entry.pattern {
                Some(pattern) => parse_pattern(pattern, steps).map_err(|reason| {
                    ConfigError::Invalid(format!("pattern for '{}': {}", entry.id, reason))
                }),
                None => Ok(vec![false; steps]),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

/// Parse "x...x..." into cells. Whitespace is ignored so long rows can be grouped.
pub fn parse_pattern(text: &str, steps: usize) -> Result<Vec<bool>, String> {
    let cells = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            'x' | 'X' => Ok(true),
            '.' | '-' => Ok(false),
            other => Err(format!("unexpected character '{}'", other)),
        })
        .collect::<Result<Vec<bool>, String>>()?;

    if cells.len() != steps {
        return Err(format!("expected {} steps, found {}", steps, cells.len()));
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pattern() {
        assert_eq!(parse_pattern("x..X", 4), Ok(vec![true, false, false, true]));
        assert_eq!(parse_pattern("x-x- x-x-", 8).unwrap().len(), 8);
        assert!(parse_pattern("x..", 4).is_err());
        assert!(parse_pattern("x.o.", 4).is_err());
    }

    #[test]
    fn test_default_session_is_valid() {
        let session = SessionFile::default();
        assert!(session.validate().is_ok());
        assert_eq!(session.instruments().len(), 4);
        assert_eq!(session.initial_pattern().unwrap(), None);
        assert_eq!(session.tempo_range(), TempoRange::default());
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut session = SessionFile::default();
        session.instruments[1].id = "kick".into();
        assert!(matches!(session.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_short_preset_is_an_error() {
        let mut session = SessionFile::default();
        session.session.steps = 8;
        session.instruments[0].pattern = Some("x...".into());
        match session.initial_pattern() {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("kick"), "{}", msg),
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }
}
