/// A sound source with a stable identifier and a display label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub id: String,
    pub label: String,
}

impl Instrument {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// The standard four-piece kit used when no session file is given
pub fn default_kit() -> Vec<Instrument> {
    vec![
        Instrument::new("kick", "Kick"),
        Instrument::new("snare", "Snare"),
        Instrument::new("hihat", "Hi-Hat"),
        Instrument::new("clap", "Clap"),
    ]
}

/// Inclusive tempo bounds in beats per minute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoRange {
    pub min: u32,
    pub max: u32,
}

impl TempoRange {
    /// Build a range; bounds given in the wrong order are swapped and zero is lifted to 1
    pub fn new(min: u32, max: u32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min: min.max(1),
            max: max.max(1),
        }
    }

    pub fn clamp(&self, bpm: u32) -> u32 {
        bpm.clamp(self.min, self.max)
    }

    pub fn contains(&self, bpm: u32) -> bool {
        (self.min..=self.max).contains(&bpm)
    }
}

impl Default for TempoRange {
    fn default() -> Self {
        Self { min: 60, max: 180 }
    }
}
