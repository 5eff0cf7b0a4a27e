// Transport control: the Stopped/Running state machine, tempo and step cursor

use grid_core::{Result, SequencerError, TempoRange};
use log::{debug, info, warn};

use crate::clock::{Subdivision, SubscriptionHandle, SubscriptionId, TransportClock};
use crate::SoundTrigger;

/// Playback state. Running owns the clock subscription, so a second schedule
/// cannot be created without first giving the old handle back.
#[derive(Debug)]
pub enum PlayState {
    Stopped,
    Running(SubscriptionHandle),
}

#[derive(Debug)]
pub struct Transport {
    state: PlayState,
    bpm: u32,
    tempo_range: TempoRange,
    current_step: usize,
    subdivision: Subdivision,
}

impl Transport {
    pub fn new(bpm: u32, tempo_range: TempoRange, subdivision: Subdivision) -> Self {
        Self {
            state: PlayState::Stopped,
            bpm: tempo_range.clamp(bpm),
            tempo_range,
            current_step: 0,
            subdivision,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, PlayState::Running(_))
    }

    /// Id of the live subscription, if any
    pub fn subscription(&self) -> Option<SubscriptionId> {
        match &self.state {
            PlayState::Running(handle) => Some(handle.id()),
            PlayState::Stopped => None,
        }
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn tempo_range(&self) -> TempoRange {
        self.tempo_range
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Unlock audio, then subscribe the tick handler exactly once
    pub fn start(
        &mut self,
        clock: &mut dyn TransportClock,
        sound: &mut dyn SoundTrigger,
    ) -> Result<()> {
        if self.is_running() {
            warn!("Start ignored, transport is already running");
            return Err(SequencerError::AlreadyRunning);
        }

        sound.unlock()?;

        self.current_step = 0;
        clock.set_rate(self.bpm);
        let handle = clock.schedule_repeating(self.subdivision);
        info!("Transport started at {} BPM ({:?})", self.bpm, handle.id());
        self.state = PlayState::Running(handle);
        Ok(())
    }

    /// Returns true if the transport was running
    pub fn stop(&mut self, clock: &mut dyn TransportClock) -> bool {
        match std::mem::replace(&mut self.state, PlayState::Stopped) {
            PlayState::Running(handle) => {
                info!("Transport stopped ({:?})", handle.id());
                clock.cancel(handle);
                self.current_step = 0;
                true
            }
            PlayState::Stopped => {
                debug!("Stop ignored, transport is not running");
                false
            }
        }
    }

    /// Clamp and apply a new tempo; the cursor is left untouched
    pub fn set_tempo(&mut self, clock: &mut dyn TransportClock, bpm: u32) -> u32 {
        let clamped = self.tempo_range.clamp(bpm);
        if clamped != bpm {
            debug!("Tempo {} clamped to {}", bpm, clamped);
        }
        self.bpm = clamped;
        clock.set_rate(clamped);
        clamped
    }

    /// Step that the next tick will sound, advancing the cursor past it
    pub fn advance(&mut self, step_count: usize) -> usize {
        let step = self.current_step;
        self.current_step = (step + 1) % step_count.max(1);
        step
    }

    /// Pull the cursor back inside a shortened pattern
    pub fn clamp_cursor(&mut self, step_count: usize) {
        if self.current_step >= step_count {
            self.current_step = step_count.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::TriggerEvent;
    use crossbeam_channel::unbounded;
    use grid_core::AudioError;

    struct FakeAudio {
        unlock_result: std::result::Result<(), AudioError>,
        unlock_calls: usize,
    }

    impl SoundTrigger for FakeAudio {
        fn unlock(&mut self) -> std::result::Result<(), AudioError> {
            self.unlock_calls += 1;
            self.unlock_result.clone()
        }

        fn trigger(&mut self, _event: TriggerEvent) {}
    }

    fn fixtures() -> (Transport, ManualClock, FakeAudio) {
        let (tx, _rx) = unbounded();
        (
            Transport::new(120, TempoRange::default(), Subdivision::sixteenth()),
            ManualClock::new(120, tx),
            FakeAudio { unlock_result: Ok(()), unlock_calls: 0 },
        )
    }

    #[test]
    fn test_start_stop_cycle() {
        let (mut transport, mut clock, mut audio) = fixtures();
        assert!(!transport.is_running());

        transport.start(&mut clock, &mut audio).unwrap();
        assert!(transport.is_running());
        assert_eq!(clock.active_subscriptions(), 1);

        assert!(transport.stop(&mut clock));
        assert!(!transport.is_running());
        assert_eq!(clock.active_subscriptions(), 0);

        // Second stop is a no-op
        assert!(!transport.stop(&mut clock));
        assert_eq!(transport.current_step(), 0);
    }

    #[test]
    fn test_double_start_is_rejected() {
        let (mut transport, mut clock, mut audio) = fixtures();
        transport.start(&mut clock, &mut audio).unwrap();
        let first = transport.subscription();

        assert_eq!(transport.start(&mut clock, &mut audio), Err(SequencerError::AlreadyRunning));
        assert_eq!(transport.subscription(), first);
        assert_eq!(clock.active_subscriptions(), 1);
        // The rejected start never reached the audio backend
        assert_eq!(audio.unlock_calls, 1);
    }

    #[test]
    fn test_failed_unlock_stays_stopped() {
        let (mut transport, mut clock, mut audio) = fixtures();
        audio.unlock_result = Err(AudioError::UnlockDenied);

        let result = transport.start(&mut clock, &mut audio);
        assert_eq!(result, Err(SequencerError::AudioUnlock(AudioError::UnlockDenied)));
        assert!(!transport.is_running());
        assert_eq!(clock.active_subscriptions(), 0);

        // Retrying once the backend cooperates works
        audio.unlock_result = Ok(());
        assert!(transport.start(&mut clock, &mut audio).is_ok());
    }

    #[test]
    fn test_tempo_is_clamped() {
        let (mut transport, mut clock, _audio) = fixtures();
        assert_eq!(transport.set_tempo(&mut clock, 30), 60);
        assert_eq!(transport.set_tempo(&mut clock, 500), 180);
        assert_eq!(transport.set_tempo(&mut clock, 95), 95);
        assert_eq!(clock.rate(), 95);
    }

    #[test]
    fn test_advance_wraps_and_clamp() {
        let (mut transport, _clock, _audio) = fixtures();
        let steps: Vec<_> = (0..5).map(|_| transport.advance(4)).collect();
        assert_eq!(steps, vec![0, 1, 2, 3, 0]);

        transport.advance(16);
        transport.advance(16);
        assert_eq!(transport.current_step(), 3);
        transport.clamp_cursor(2);
        assert_eq!(transport.current_step(), 1);
    }
}
