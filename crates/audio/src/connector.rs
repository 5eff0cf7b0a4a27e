// Audio connector module
// Hands trigger events from the sequencer to an external audio engine

use std::time::Duration;

use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError,
};
use grid_core::AudioError;
use log::{debug, error, info, warn};
use sequencer::{SoundTrigger, TriggerEvent};

use crate::{ContextState, EngineMessage};

/// Audio connector that forwards trigger events to the engine over a bounded
/// queue and performs the resume handshake before playback
pub struct AudioConnector {
    sender: Sender<EngineMessage>,
    state: ContextState,
    unlock_timeout: Duration,
    dropped: u64,
}

impl AudioConnector {
    pub const DEFAULT_UNLOCK_TIMEOUT: Duration = Duration::from_secs(2);

    /// Create a connector and the inbox the engine reads from
    pub fn new(capacity: usize) -> (Self, Receiver<EngineMessage>) {
        let (sender, receiver) = bounded(capacity.max(1));
        let connector = Self {
            sender,
            state: ContextState::Suspended,
            unlock_timeout: Self::DEFAULT_UNLOCK_TIMEOUT,
            dropped: 0,
        };
        (connector, receiver)
    }

    pub fn with_unlock_timeout(mut self, timeout: Duration) -> Self {
        self.unlock_timeout = timeout;
        self
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Triggers discarded because the context was not running or the queue was full
    pub fn dropped_triggers(&self) -> u64 {
        self.dropped
    }

    fn close(&mut self) {
        if self.state != ContextState::Closed {
            error!("Audio engine disconnected, closing the context");
        }
        self.state = ContextState::Closed;
    }

    fn timeout_ms(&self) -> u64 {
        self.unlock_timeout.as_millis() as u64
    }
}

impl SoundTrigger for AudioConnector {
    fn unlock(&mut self) -> Result<(), AudioError> {
        match self.state {
            ContextState::Running => return Ok(()),
            ContextState::Closed => return Err(AudioError::EngineDisconnected),
            ContextState::Suspended => {}
        }

        info!("Requesting audio resume");
        let (reply_tx, reply_rx) = bounded(1);

        match self
            .sender
            .send_timeout(EngineMessage::Resume { reply: reply_tx }, self.unlock_timeout)
        {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                return Err(AudioError::UnlockTimedOut(self.timeout_ms()));
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                self.close();
                return Err(AudioError::EngineDisconnected);
            }
        }

        match reply_rx.recv_timeout(self.unlock_timeout) {
            Ok(true) => {
                self.state = ContextState::Running;
                info!("Audio context running");
                Ok(())
            }
            Ok(false) => {
                warn!("Audio engine refused to resume");
                Err(AudioError::UnlockDenied)
            }
            Err(RecvTimeoutError::Timeout) => Err(AudioError::UnlockTimedOut(self.timeout_ms())),
            Err(RecvTimeoutError::Disconnected) => {
                // The engine dropped the request without answering
                warn!("Audio engine discarded the resume request");
                Err(AudioError::UnlockDenied)
            }
        }
    }

    fn trigger(&mut self, event: TriggerEvent) {
        if self.state != ContextState::Running {
            debug!("Audio context is {:?}, ignoring trigger", self.state);
            self.dropped += 1;
            return;
        }

        match self.sender.try_send(EngineMessage::Trigger(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                warn!("Audio queue full, dropped trigger for instrument {}", event.instrument);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                self.close();
            }
        }
    }
}
