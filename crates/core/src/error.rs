use thiserror::Error;

/// Failures reported by the audio backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("audio engine refused to resume the context")]
    UnlockDenied,

    #[error("audio engine did not answer the resume request within {0} ms")]
    UnlockTimedOut(u64),

    #[error("audio engine is disconnected")]
    EngineDisconnected,
}

/// Errors returned by sequencer operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencerError {
    /// Row or step outside the configured pattern. Callers never clamp this.
    #[error("cell ({row}, {step}) is outside the {rows}x{steps} pattern")]
    InvalidIndex {
        row: usize,
        step: usize,
        rows: usize,
        steps: usize,
    },

    /// Column read outside the configured pattern
    #[error("step {step} is outside the {steps}-step pattern")]
    InvalidStep { step: usize, steps: usize },

    #[error("step count must be at least 1, got {0}")]
    InvalidStepCount(usize),

    #[error("invalid pattern: {0}")]
    InvalidPattern(&'static str),

    /// A second start would subscribe the tick handler twice
    #[error("transport is already running")]
    AlreadyRunning,

    #[error("could not unlock audio: {0}")]
    AudioUnlock(#[from] AudioError),
}

pub type Result<T> = std::result::Result<T, SequencerError>;
