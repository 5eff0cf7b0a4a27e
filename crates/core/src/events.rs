// Core event system for beatgrid
// Observers (status lines, loggers, tests) subscribe here; playback never depends on them.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::AudioError;
use crate::time::ScheduledTime;

/// Event type for the sequencer session
#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEvent {
    /// The cursor reached a step that is about to sound
    StepAdvanced(usize),

    /// An instrument was triggered (instrument_idx, scheduled time)
    Triggered(usize, ScheduledTime),

    /// Playback state changed (is_playing)
    PlaybackStateChanged(bool),

    /// Start was refused because the audio backend stayed locked
    StartFailed(AudioError),

    /// Tempo has been changed (clamped bpm)
    TempoChanged(u32),

    /// A cell was toggled (instrument_idx, step_idx, active)
    CellToggled(usize, usize, bool),

    /// The number of steps per pattern changed
    StepCountChanged(usize),

    /// Every cell was reset to inactive
    PatternCleared,
}

type Listener = Box<dyn Fn(&SequencerEvent) + Send + Sync>;

/// A simple event bus implementation
pub struct EventBus {
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribe to events, returns the listener id
    pub fn subscribe<F>(&self, listener: F) -> usize
    where
        F: Fn(&SequencerEvent) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let id = listeners.len();
        listeners.push(Box::new(listener));
        id
    }

    /// Emit an event to all listeners
    pub fn emit(&self, event: SequencerEvent) {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A reference counted, thread-safe event bus
pub type SharedEventBus = Arc<EventBus>;

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}
