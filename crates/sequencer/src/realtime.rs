// Real-time transport clock backed by a dedicated timer thread

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use grid_core::ScheduledTime;
use log::{debug, error, info};

use crate::clock::{ClockTick, Subdivision, SubscriptionHandle, SubscriptionId, TransportClock};

/// Commands that can be sent to the clock thread
#[derive(Debug)]
enum ClockCommand {
    Schedule(SubscriptionId, Subdivision),
    Cancel(SubscriptionId),
    SetRate(u32),
    Quit,
}

struct Subscriber {
    id: SubscriptionId,
    subdivision: Subdivision,
    last_fired: Option<Duration>,
    next_fire: Duration,
}

/// Clock whose thread sends ticks on time. Scheduled times are offsets from the
/// moment the clock was created.
pub struct ThreadClock {
    bpm: u32,
    next_id: u64,
    cmd_sender: Sender<ClockCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ThreadClock {
    pub fn new(bpm: u32, sink: Sender<ClockTick>) -> Self {
        let (cmd_sender, cmd_receiver) = unbounded::<ClockCommand>();
        let epoch = Instant::now();

        let thread_handle = thread::Builder::new()
            .name("transport-clock".into())
            .spawn(move || run_clock(epoch, bpm, cmd_receiver, sink))
            .ok();

        if thread_handle.is_none() {
            error!("Could not spawn the transport clock thread");
        }

        Self {
            bpm,
            next_id: 0,
            cmd_sender,
            thread_handle,
        }
    }

    fn send(&self, cmd: ClockCommand) {
        if self.cmd_sender.send(cmd).is_err() {
            debug!("Clock thread is not running");
        }
    }
}

impl TransportClock for ThreadClock {
    fn schedule_repeating(&mut self, subdivision: Subdivision) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.send(ClockCommand::Schedule(id, subdivision));
        SubscriptionHandle::new(id)
    }

    fn cancel(&mut self, handle: SubscriptionHandle) {
        self.send(ClockCommand::Cancel(handle.id()));
    }

    fn set_rate(&mut self, bpm: u32) {
        self.bpm = bpm;
        self.send(ClockCommand::SetRate(bpm));
    }

    fn rate(&self) -> u32 {
        self.bpm
    }
}

impl Drop for ThreadClock {
    fn drop(&mut self) {
        let _ = self.cmd_sender.send(ClockCommand::Quit);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_clock(
    epoch: Instant,
    mut bpm: u32,
    commands: Receiver<ClockCommand>,
    sink: Sender<ClockTick>,
) {
    let mut subscribers: Vec<Subscriber> = Vec::new();
    info!("Transport clock thread started at {} BPM", bpm);

    loop {
        // Block until the earliest deadline, or indefinitely with nothing scheduled
        let command = match subscribers.iter().map(|s| s.next_fire).min() {
            Some(offset) => match commands.recv_deadline(epoch + offset) {
                Ok(cmd) => Some(cmd),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match commands.recv() {
                Ok(cmd) => Some(cmd),
                Err(_) => break,
            },
        };

        match command {
            Some(ClockCommand::Schedule(id, subdivision)) => {
                debug!("Clock scheduling {:?}", id);
                subscribers.push(Subscriber {
                    id,
                    subdivision,
                    last_fired: None,
                    next_fire: epoch.elapsed(),
                });
            }
            Some(ClockCommand::Cancel(id)) => {
                debug!("Clock cancelling {:?}", id);
                subscribers.retain(|s| s.id != id);
            }
            Some(ClockCommand::SetRate(new_bpm)) => {
                bpm = new_bpm;
                for sub in subscribers.iter_mut() {
                    if let Some(last) = sub.last_fired {
                        sub.next_fire = last + sub.subdivision.interval(bpm);
                    }
                }
            }
            Some(ClockCommand::Quit) => break,
            None => {
                let now = epoch.elapsed();
                for sub in subscribers.iter_mut().filter(|s| s.next_fire <= now) {
                    let tick = ClockTick {
                        subscription: sub.id,
                        time: ScheduledTime::from_duration(sub.next_fire),
                    };
                    if sink.send(tick).is_err() {
                        debug!("Tick receiver dropped, stopping clock thread");
                        return;
                    }
                    sub.last_fired = Some(sub.next_fire);
                    sub.next_fire += sub.subdivision.interval(bpm);
                }
            }
        }
    }

    debug!("Transport clock thread shutting down");
}
