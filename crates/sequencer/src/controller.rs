// Per-tick step logic: highlight, trigger, advance

use grid_core::{Result, ScheduledTime};
use log::debug;

use crate::highlight::StepHighlightReporter;
use crate::pattern::PatternStore;
use crate::transport::Transport;
use crate::{SoundTrigger, TriggerEvent};

/// Handle one clock tick and return the triggers that were sent.
///
/// The highlight is reported before any trigger so the surface shows the step
/// that is about to sound. Every trigger of the tick carries the clock's `time`.
pub fn run_tick(
    transport: &mut Transport,
    pattern: &PatternStore,
    highlight: &mut StepHighlightReporter,
    sound: &mut dyn SoundTrigger,
    time: ScheduledTime,
) -> Result<Vec<TriggerEvent>> {
    let step = transport.current_step();
    let column = pattern.column_snapshot(step)?;

    highlight.report(step);

    let triggers: Vec<TriggerEvent> = column
        .into_iter()
        .filter(|&(_, active)| active)
        .map(|(instrument, _)| TriggerEvent {
            instrument,
            scheduled_time: time,
        })
        .collect();

    for trigger in &triggers {
        debug!("Trigger instrument {} on step {} at {}", trigger.instrument, step, time);
        sound.trigger(*trigger);
    }

    transport.advance(pattern.steps());
    Ok(triggers)
}
