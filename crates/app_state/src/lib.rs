// App state for beatgrid
// Owns the sequencer session and the single dispatch loop that feeds it user
// input and clock ticks, one message at a time.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use grid_core::{SequencerError, SequencerEvent};
use log::{debug, error, info, warn};
use project::{ConfigError, SessionFile};
use sequencer::{
    ClockTick, RenderSurface, Sequencer, SequencerConfig, SoundTrigger, Subdivision, ThreadClock,
};
use thiserror::Error;

/// Why a session could not be brought up
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sequencer(#[from] SequencerError),
}

/// Discrete user actions, each mapped to one sequencer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    CellClicked { row: usize, step: usize },
    PlayClicked,
    StopClicked,
    TempoChanged(u32),
    StepCountChanged(usize),
    ClearPattern,
    Quit,
}

/// Whether the dispatch loop should keep going after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Represents the state of the application
pub struct AppState {
    sequencer: Sequencer,
    ticks: Receiver<ClockTick>,
}

impl AppState {
    /// Wrap a sequencer whose clock delivers ticks on `ticks`
    pub fn new(sequencer: Sequencer, ticks: Receiver<ClockTick>) -> Self {
        Self { sequencer, ticks }
    }

    /// Translate a session file into the sequencer's startup configuration.
    /// The session is validated here, since its fields can be set by hand.
    pub fn config_from_session(session: &SessionFile) -> Result<SequencerConfig, ConfigError> {
        session.validate()?;
        Ok(SequencerConfig {
            instruments: session.instruments(),
            steps: session.session.steps,
            bpm: session.session.bpm,
            tempo_range: session.tempo_range(),
            subdivision: Subdivision::new(session.session.steps_per_beat),
            pattern: session.initial_pattern()?,
        })
    }

    /// Build a session driven by the real-time clock
    pub fn from_session(
        session: &SessionFile,
        sound: Box<dyn SoundTrigger + Send>,
        surface: Box<dyn RenderSurface + Send>,
    ) -> Result<Self, AppError> {
        let config = Self::config_from_session(session)?;
        let (tick_sender, ticks) = unbounded();
        let clock = ThreadClock::new(config.bpm, tick_sender);

        info!("Initializing session '{}'", session.session.name);
        let sequencer = Sequencer::new(config, Box::new(clock), sound, surface)?;
        Ok(Self::new(sequencer, ticks))
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn subscribe_to_events<F>(&self, listener: F) -> usize
    where
        F: Fn(&SequencerEvent) + Send + Sync + 'static,
    {
        self.sequencer.get_event_bus().subscribe(listener)
    }

    /// Apply one user action. Failures are logged and never end the session.
    pub fn handle_input(&mut self, event: InputEvent) -> Flow {
        debug!("Input: {:?}", event);
        match event {
            InputEvent::CellClicked { row, step } => {
                if let Err(err) = self.sequencer.toggle(row, step) {
                    error!("Toggle rejected: {}", err);
                }
            }
            InputEvent::PlayClicked => match self.sequencer.start() {
                Ok(()) => {}
                Err(SequencerError::AlreadyRunning) => debug!("Play pressed while playing"),
                Err(err) => warn!("Could not start playback: {}", err),
            },
            InputEvent::StopClicked => {
                self.sequencer.stop();
            }
            InputEvent::TempoChanged(bpm) => {
                self.sequencer.set_tempo(bpm);
            }
            InputEvent::StepCountChanged(steps) => {
                if let Err(err) = self.sequencer.set_step_count(steps) {
                    error!("Step count rejected: {}", err);
                }
            }
            InputEvent::ClearPattern => self.sequencer.clear_pattern(),
            InputEvent::Quit => {
                self.sequencer.stop();
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    pub fn handle_tick(&mut self, tick: ClockTick) {
        if let Err(err) = self.sequencer.on_tick(tick) {
            error!("Tick failed: {}", err);
        }
    }

    /// Handle every tick already queued, without blocking
    pub fn pump_ticks(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(tick) = self.ticks.try_recv() {
            self.handle_tick(tick);
            handled += 1;
        }
        handled
    }

    /// Dispatch loop: runs until Quit arrives or every input sender is dropped
    pub fn run(&mut self, inputs: Receiver<InputEvent>) {
        let ticks = self.ticks.clone();
        info!("Dispatch loop started");

        loop {
            select! {
                recv(inputs) -> message => match message {
                    Ok(event) => {
                        if self.handle_input(event) == Flow::Quit {
                            break;
                        }
                    }
                    Err(_) => {
                        debug!("Input channel closed");
                        self.sequencer.stop();
                        break;
                    }
                },
                recv(ticks) -> message => match message {
                    Ok(tick) => self.handle_tick(tick),
                    Err(_) => {
                        error!("Clock channel closed, ending session");
                        self.sequencer.stop();
                        break;
                    }
                },
            }
        }

        info!("Dispatch loop finished");
    }

    /// Move the session onto its own dispatch thread
    pub fn spawn(mut self) -> (Sender<InputEvent>, JoinHandle<()>) {
        let (input_sender, inputs) = unbounded();
        let handle = thread::spawn(move || self.run(inputs));
        (input_sender, handle)
    }
}

#[cfg(test)]
mod tests;
