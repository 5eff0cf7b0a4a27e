// sequencer module

pub mod clock;
pub mod controller;
pub mod highlight;
pub mod pattern;
pub mod realtime;
pub mod transport;


use grid_core::{
    default_kit, AudioError, EventBus, Instrument, Result, ScheduledTime, SequencerError,
    SequencerEvent, SharedEventBus, TempoRange,
};
use log::{debug, info, warn};
use std::sync::Arc;

pub use clock::{
    ClockTick, ManualClock, Subdivision, SubscriptionHandle, SubscriptionId, TransportClock,
};
pub use highlight::{GridView, RenderSurface, SharedGridView, StepHighlightReporter};
pub use pattern::PatternStore;
pub use realtime::ThreadClock;
pub use transport::{PlayState, Transport};

/// Represents one instrument firing at a clock-domain time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    pub instrument: usize,
    pub scheduled_time: ScheduledTime,
}

/// Whatever turns trigger events into sound
pub trait SoundTrigger {
    /// Make the backend ready to play. May block until the backend answers.
    fn unlock(&mut self) -> std::result::Result<(), AudioError>;

    /// Dispatch a trigger. Must not block; backend failures are not reported here.
    fn trigger(&mut self, event: TriggerEvent);
}

/// Everything fixed at session start
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    pub instruments: Vec<Instrument>,
    pub steps: usize,
    pub bpm: u32,
    pub tempo_range: TempoRange,
    pub subdivision: Subdivision,
    /// Preset cells, [instrument][step]; all inactive when absent
    pub pattern: Option<Vec<Vec<bool>>>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            instruments: default_kit(),
            steps: 16,
            bpm: 120,
            tempo_range: TempoRange::default(),
            subdivision: Subdivision::sixteenth(),
            pattern: None,
        }
    }
}

/// One sequencer session: the pattern, the transport and their collaborators
pub struct Sequencer {
    instruments: Vec<Instrument>,
    pattern: PatternStore,
    transport: Transport,
    clock: Box<dyn TransportClock + Send>,
    sound: Box<dyn SoundTrigger + Send>,
    highlight: StepHighlightReporter,
    event_bus: SharedEventBus,
}

impl Sequencer {
    /// Create a new sequencer session with its own event bus
    pub fn new(
        config: SequencerConfig,
        clock: Box<dyn TransportClock + Send>,
        sound: Box<dyn SoundTrigger + Send>,
        surface: Box<dyn RenderSurface + Send>,
    ) -> Result<Self> {
        Self::new_with_event_bus(config, clock, sound, surface, Arc::new(EventBus::new()))
    }

    /// Create a new sequencer session that reports on an existing event bus
    pub fn new_with_event_bus(
        config: SequencerConfig,
        clock: Box<dyn TransportClock + Send>,
        sound: Box<dyn SoundTrigger + Send>,
        surface: Box<dyn RenderSurface + Send>,
        event_bus: SharedEventBus,
    ) -> Result<Self> {
        let pattern = match config.pattern {
            Some(rows) => {
                let store = PatternStore::from_rows(rows)?;
                if store.rows() != config.instruments.len() {
                    return Err(SequencerError::InvalidPattern(
                        "pattern needs one row per instrument",
                    ));
                }
                if store.steps() != config.steps {
                    return Err(SequencerError::InvalidPattern(
                        "pattern length differs from the step count",
                    ));
                }
                store
            }
            None => PatternStore::new(config.instruments.len(), config.steps)?,
        };

        let transport = Transport::new(config.bpm, config.tempo_range, config.subdivision);
        if transport.bpm() != config.bpm {
            warn!("Initial tempo {} clamped to {}", config.bpm, transport.bpm());
        }

        let mut highlight = StepHighlightReporter::new(surface);
        highlight.pattern_reset(pattern.as_rows());

        info!(
            "Sequencer ready: {} instruments x {} steps at {} BPM",
            pattern.rows(),
            pattern.steps(),
            transport.bpm()
        );

        Ok(Self {
            instruments: config.instruments,
            pattern,
            transport,
            clock,
            sound,
            highlight,
            event_bus,
        })
    }

    /// Flip a cell; takes effect from the next tick that reads its column
    pub fn toggle(&mut self, row: usize, step: usize) -> Result<bool> {
        let active = self.pattern.toggle(row, step)?;
        self.highlight.cell_changed(row, step, active);
        self.event_bus.emit(SequencerEvent::CellToggled(row, step, active));
        Ok(active)
    }

    pub fn is_active(&self, row: usize, step: usize) -> Result<bool> {
        self.pattern.is_active(row, step)
    }

    pub fn column_snapshot(&self, step: usize) -> Result<Vec<(usize, bool)>> {
        self.pattern.column_snapshot(step)
    }

    /// Start playback from step 0. Fails with AlreadyRunning instead of
    /// subscribing a second tick handler.
    pub fn start(&mut self) -> Result<()> {
        match self.transport.start(self.clock.as_mut(), self.sound.as_mut()) {
            Ok(()) => {
                self.event_bus.emit(SequencerEvent::PlaybackStateChanged(true));
                Ok(())
            }
            Err(SequencerError::AudioUnlock(err)) => {
                warn!("Audio unlock failed, staying stopped: {}", err);
                self.event_bus.emit(SequencerEvent::StartFailed(err.clone()));
                Err(SequencerError::AudioUnlock(err))
            }
            Err(err) => Err(err),
        }
    }

    /// Stop playback; returns false when already stopped
    pub fn stop(&mut self) -> bool {
        if !self.transport.stop(self.clock.as_mut()) {
            return false;
        }
        self.highlight.clear();
        self.event_bus.emit(SequencerEvent::PlaybackStateChanged(false));
        true
    }

    /// Set the tempo, clamped to the configured range; returns the applied bpm
    pub fn set_tempo(&mut self, bpm: u32) -> u32 {
        let applied = self.transport.set_tempo(self.clock.as_mut(), bpm);
        self.event_bus.emit(SequencerEvent::TempoChanged(applied));
        applied
    }

    /// Tick handler. Ticks from a schedule other than the live one are dropped.
    pub fn on_tick(&mut self, tick: ClockTick) -> Result<Vec<TriggerEvent>> {
        if self.transport.subscription() != Some(tick.subscription) {
            debug!("Dropping stale tick from {:?}", tick.subscription);
            return Ok(Vec::new());
        }

        let step = self.transport.current_step();
        let triggers = controller::run_tick(
            &mut self.transport,
            &self.pattern,
            &mut self.highlight,
            self.sound.as_mut(),
            tick.time,
        )?;

        self.event_bus.emit(SequencerEvent::StepAdvanced(step));
        for trigger in &triggers {
            self.event_bus
                .emit(SequencerEvent::Triggered(trigger.instrument, trigger.scheduled_time));
        }
        Ok(triggers)
    }

    /// Reconfigure the pattern length, keeping overlapping cells
    pub fn set_step_count(&mut self, steps: usize) -> Result<()> {
        self.pattern.resize_steps(steps)?;
        self.transport.clamp_cursor(steps);
        self.highlight.pattern_reset(self.pattern.as_rows());
        info!("Step count set to {}", steps);
        self.event_bus.emit(SequencerEvent::StepCountChanged(steps));
        Ok(())
    }

    pub fn clear_pattern(&mut self) {
        self.pattern.clear();
        self.highlight.pattern_reset(self.pattern.as_rows());
        self.event_bus.emit(SequencerEvent::PatternCleared);
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn pattern(&self) -> &PatternStore {
        &self.pattern
    }

    pub fn step_count(&self) -> usize {
        self.pattern.steps()
    }

    pub fn current_step(&self) -> usize {
        self.transport.current_step()
    }

    pub fn bpm(&self) -> u32 {
        self.transport.bpm()
    }

    pub fn tempo_range(&self) -> TempoRange {
        self.transport.tempo_range()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_running()
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.transport.subscription()
    }

    pub fn get_event_bus(&self) -> &SharedEventBus {
        &self.event_bus
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        // Hand the subscription back before the clock goes away
        self.stop();
    }
}
