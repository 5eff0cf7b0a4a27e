// Transport clock abstraction
//
// A clock produces ClockTick messages on the channel it was built with; it never
// touches sequencer state. Each repeating schedule is identified by a subscription
// id so the dispatcher can discard ticks that belong to a cancelled schedule.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::Sender;
use grid_core::ScheduledTime;
use log::debug;

/// How many ticks the clock delivers per beat (4 = sixteenth notes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subdivision {
    steps_per_beat: u32,
}

impl Subdivision {
    pub fn new(steps_per_beat: u32) -> Self {
        Self {
            steps_per_beat: steps_per_beat.max(1),
        }
    }

    pub fn sixteenth() -> Self {
        Self::new(4)
    }

    pub fn steps_per_beat(&self) -> u32 {
        self.steps_per_beat
    }

    /// Time between two ticks at the given tempo
    pub fn interval(&self, bpm: u32) -> Duration {
        let bpm = bpm.max(1) as f64;
        Duration::from_secs_f64(60.0 / (bpm * self.steps_per_beat as f64))
    }
}

impl Default for Subdivision {
    fn default() -> Self {
        Self::sixteenth()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Ownership token for a repeating schedule. Not Clone: whoever holds it is
/// the only party able to cancel that schedule.
#[derive(Debug, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
}

impl SubscriptionHandle {
    pub fn new(id: SubscriptionId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

/// One firing of a repeating schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    pub subscription: SubscriptionId,
    pub time: ScheduledTime,
}

pub trait TransportClock {
    /// Start delivering one tick per subdivision at the current rate
    fn schedule_repeating(&mut self, subdivision: Subdivision) -> SubscriptionHandle;

    /// Stop the schedule behind `handle`; no tick for it is produced afterwards
    fn cancel(&mut self, handle: SubscriptionHandle);

    /// Change the tempo. The next tick is placed one new-rate interval after
    /// the last fired tick, so no step is repeated or lost.
    fn set_rate(&mut self, bpm: u32);

    fn rate(&self) -> u32;
}

#[derive(Debug)]
struct ManualSubscription {
    id: SubscriptionId,
    subdivision: Subdivision,
    last_fired: Option<ScheduledTime>,
    next_fire: ScheduledTime,
}

#[derive(Debug)]
struct ManualState {
    sink: Sender<ClockTick>,
    bpm: u32,
    next_id: u64,
    now: ScheduledTime,
    subscriptions: Vec<ManualSubscription>,
}

/// A clock that only advances when told to. Clones share the same timeline,
/// so a driver can keep one copy while the sequencer owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new(bpm: u32, sink: Sender<ClockTick>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState {
                sink,
                bpm,
                next_id: 0,
                now: ScheduledTime::ZERO,
                subscriptions: Vec::new(),
            })),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fire the next tick of every active schedule, returns how many were sent
    pub fn fire(&self) -> usize {
        let mut guard = self.state();
        let state = &mut *guard;
        let bpm = state.bpm;
        let mut sent = 0;
        let mut now = state.now;

        for sub in state.subscriptions.iter_mut() {
            let tick = ClockTick {
                subscription: sub.id,
                time: sub.next_fire,
            };
            sub.last_fired = Some(sub.next_fire);
            sub.next_fire = sub.next_fire + sub.subdivision.interval(bpm);
            now = now.max(sub.next_fire);

            if state.sink.send(tick).is_ok() {
                sent += 1;
            } else {
                debug!("Tick receiver is gone, dropping tick for {:?}", tick.subscription);
            }
        }

        state.now = now;
        sent
    }

    pub fn active_subscriptions(&self) -> usize {
        self.state().subscriptions.len()
    }

    /// Time at which the next tick of a fresh schedule would fire
    pub fn now(&self) -> ScheduledTime {
        self.state().now
    }
}

impl TransportClock for ManualClock {
    fn schedule_repeating(&mut self, subdivision: Subdivision) -> SubscriptionHandle {
        let mut state = self.state();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        let next_fire = state.now;
        state.subscriptions.push(ManualSubscription {
            id,
            subdivision,
            last_fired: None,
            next_fire,
        });
        debug!("Manual clock scheduled {:?} at {}", id, next_fire);
        SubscriptionHandle::new(id)
    }

    fn cancel(&mut self, handle: SubscriptionHandle) {
        let mut state = self.state();
        state.subscriptions.retain(|sub| sub.id != handle.id());
        debug!("Manual clock cancelled {:?}", handle.id());
    }

    fn set_rate(&mut self, bpm: u32) {
        let mut state = self.state();
        state.bpm = bpm;
        let mut now = ScheduledTime::ZERO;
        for sub in state.subscriptions.iter_mut() {
            if let Some(last) = sub.last_fired {
                sub.next_fire = last + sub.subdivision.interval(bpm);
            }
            now = now.max(sub.next_fire);
        }
        if !state.subscriptions.is_empty() {
            state.now = now;
        }
    }

    fn rate(&self) -> u32 {
        self.state().bpm
    }
}
