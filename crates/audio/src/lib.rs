// audio module
mod connector;


use crossbeam_channel::{Receiver, Sender};
use log::info;
use sequencer::TriggerEvent;

pub use crate::connector::AudioConnector;

/// Messages the connector sends to the audio engine
#[derive(Debug)]
pub enum EngineMessage {
    /// Ask the engine to resume its context; answer true once it can play
    Resume { reply: Sender<bool> },
    /// Play an instrument at the given clock time
    Trigger(TriggerEvent),
}

/// Lifecycle of the audio context as seen from the connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Minimal engine loop: accepts every resume request and hands triggers to
/// `on_trigger`. Returns when the connector is dropped.
pub fn serve<F>(inbox: Receiver<EngineMessage>, mut on_trigger: F)
where
    F: FnMut(TriggerEvent),
{
    info!("Audio engine loop started");
    for message in inbox.iter() {
        match message {
            EngineMessage::Resume { reply } => {
                let _ = reply.send(true);
            }
            EngineMessage::Trigger(event) => on_trigger(event),
        }
    }
    info!("Audio engine loop finished");
}
