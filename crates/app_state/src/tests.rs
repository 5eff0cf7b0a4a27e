use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use audio::{serve, AudioConnector};
use crossbeam_channel::{unbounded, Receiver};
use grid_core::{AudioError, Instrument, SequencerEvent, TempoRange};
use project::{ConfigError, SessionFile};
use sequencer::{
    ManualClock, Sequencer, SequencerConfig, SharedGridView, SoundTrigger, Subdivision,
    TransportClock, TriggerEvent,
};

use crate::{AppError, AppState, Flow, InputEvent};

#[derive(Clone, Default)]
struct RecordingSound(Arc<Mutex<Vec<TriggerEvent>>>);

impl SoundTrigger for RecordingSound {
    fn unlock(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn trigger(&mut self, event: TriggerEvent) {
        self.0.lock().unwrap().push(event);
    }
}

fn config(instruments: &[&str], steps: usize) -> SequencerConfig {
    SequencerConfig {
        instruments: instruments.iter().map(|id| Instrument::new(*id, *id)).collect(),
        steps,
        bpm: 120,
        tempo_range: TempoRange::default(),
        subdivision: Subdivision::sixteenth(),
        pattern: None,
    }
}

fn manual_app(
    instruments: &[&str],
    steps: usize,
    sound: Box<dyn SoundTrigger + Send>,
) -> (AppState, ManualClock, SharedGridView) {
    let (tx, rx) = unbounded();
    let clock = ManualClock::new(120, tx);
    let view = SharedGridView::new(instruments.len(), steps);
    let sequencer = Sequencer::new(
        config(instruments, steps),
        Box::new(clock.clone()),
        sound,
        Box::new(view.clone()),
    )
    .unwrap();
    (AppState::new(sequencer, rx), clock, view)
}

/// Forward every event of interest to a channel the test can wait on
fn watch(app: &AppState) -> Receiver<SequencerEvent> {
    let (tx, rx) = unbounded();
    let tx = Mutex::new(tx);
    app.subscribe_to_events(move |event| {
        let _ = tx.lock().unwrap().send(event.clone());
    });
    rx
}

fn wait_for(events: &Receiver<SequencerEvent>, wanted: impl Fn(&SequencerEvent) -> bool) {
    loop {
        let event = events
            .recv_timeout(Duration::from_secs(2))
            .expect("Timed out waiting for sequencer event");
        if wanted(&event) {
            return;
        }
    }
}

#[test]
fn test_inputs_map_to_operations() {
    let sound = RecordingSound::default();
    let (mut app, clock, view) = manual_app(&["kick", "snare"], 8, Box::new(sound.clone()));

    assert_eq!(app.handle_input(InputEvent::CellClicked { row: 1, step: 3 }), Flow::Continue);
    assert!(app.sequencer().is_active(1, 3).unwrap());
    assert!(view.snapshot().is_active(1, 3));

    app.handle_input(InputEvent::TempoChanged(400));
    assert_eq!(app.sequencer().bpm(), 180);
    assert_eq!(clock.rate(), 180);

    app.handle_input(InputEvent::PlayClicked);
    assert!(app.sequencer().is_playing());
    // A second play press is absorbed
    app.handle_input(InputEvent::PlayClicked);
    assert_eq!(clock.active_subscriptions(), 1);

    app.handle_input(InputEvent::StopClicked);
    assert!(!app.sequencer().is_playing());

    app.handle_input(InputEvent::StepCountChanged(4));
    assert_eq!(app.sequencer().step_count(), 4);
    // The toggled cell at step 3 survived the resize
    assert!(app.sequencer().is_active(1, 3).unwrap());

    app.handle_input(InputEvent::ClearPattern);
    assert_eq!(app.sequencer().pattern().active_count(), 0);

    assert_eq!(app.handle_input(InputEvent::Quit), Flow::Quit);
}

#[test]
fn test_bad_inputs_do_not_end_the_session() {
    let (mut app, _clock, _view) = manual_app(&["kick"], 4, Box::new(RecordingSound::default()));
    assert_eq!(app.handle_input(InputEvent::CellClicked { row: 7, step: 0 }), Flow::Continue);
    assert_eq!(app.handle_input(InputEvent::StepCountChanged(0)), Flow::Continue);
    assert_eq!(app.sequencer().step_count(), 4);
}

#[test]
fn test_pump_ticks() {
    let sound = RecordingSound::default();
    let (mut app, clock, _view) = manual_app(&["kick"], 4, Box::new(sound.clone()));
    app.handle_input(InputEvent::CellClicked { row: 0, step: 0 });
    app.handle_input(InputEvent::CellClicked { row: 0, step: 2 });
    app.handle_input(InputEvent::PlayClicked);

    for _ in 0..4 {
        clock.fire();
    }
    assert_eq!(app.pump_ticks(), 4);
    assert_eq!(sound.0.lock().unwrap().len(), 2);
    assert_eq!(app.sequencer().current_step(), 0);
}

#[test]
fn test_dispatch_thread_end_to_end() {
    let sound = RecordingSound::default();
    let (app, clock, view) = manual_app(&["kick", "snare"], 4, Box::new(sound.clone()));
    let events = watch(&app);
    let (inputs, handle) = app.spawn();

    inputs.send(InputEvent::CellClicked { row: 0, step: 0 }).unwrap();
    inputs.send(InputEvent::CellClicked { row: 1, step: 0 }).unwrap();
    inputs.send(InputEvent::PlayClicked).unwrap();
    wait_for(&events, |e| *e == SequencerEvent::PlaybackStateChanged(true));

    for step in 0..4 {
        clock.fire();
        wait_for(&events, |e| *e == SequencerEvent::StepAdvanced(step));
    }

    inputs.send(InputEvent::Quit).unwrap();
    handle.join().unwrap();

    let fired = sound.0.lock().unwrap().clone();
    assert_eq!(fired.len(), 2);
    assert_eq!(fired[0].scheduled_time, fired[1].scheduled_time);
    // Quit stops the transport, which clears the highlight
    assert_eq!(view.snapshot().current_step(), None);
    assert_eq!(clock.active_subscriptions(), 0);
}

#[test]
fn test_audio_connector_in_the_loop() {
    let (connector, inbox) = AudioConnector::new(16);
    let heard = Arc::new(Mutex::new(Vec::new()));
    let heard_clone = Arc::clone(&heard);
    let engine =
        thread::spawn(move || serve(inbox, |event| heard_clone.lock().unwrap().push(event)));

    let (mut app, clock, _view) = manual_app(&["kick"], 2, Box::new(connector));
    app.handle_input(InputEvent::CellClicked { row: 0, step: 1 });
    app.handle_input(InputEvent::PlayClicked);
    assert!(app.sequencer().is_playing());

    clock.fire();
    clock.fire();
    app.pump_ticks();

    // Dropping the app drops the connector, which ends the engine loop
    drop(app);
    engine.join().unwrap();

    let heard = heard.lock().unwrap();
    assert_eq!(heard.len(), 1);
    assert_eq!(heard[0].instrument, 0);
}

#[test]
fn test_unlock_failure_leaves_play_available() {
    let (connector, inbox) = AudioConnector::new(4);
    drop(inbox);
    let (mut app, clock, _view) = manual_app(&["kick"], 4, Box::new(connector));
    let events = watch(&app);

    app.handle_input(InputEvent::PlayClicked);
    assert!(!app.sequencer().is_playing());
    assert_eq!(clock.active_subscriptions(), 0);
    assert_eq!(
        events.try_recv().unwrap(),
        SequencerEvent::StartFailed(AudioError::EngineDisconnected)
    );
}

#[test]
fn test_config_from_session() {
    let mut session = SessionFile::default();
    session.session.steps = 8;
    session.session.steps_per_beat = 2;
    session.instruments[0].pattern = Some("x...x...".to_string());

    let config = AppState::config_from_session(&session).unwrap();
    assert_eq!(config.instruments.len(), 4);
    assert_eq!(config.steps, 8);
    assert_eq!(config.subdivision.steps_per_beat(), 2);
    let pattern = config.pattern.unwrap();
    assert!(pattern[0][0] && pattern[0][4]);
    assert!(pattern[1].iter().all(|&cell| !cell));
}

#[test]
fn test_from_session_uses_real_clock() {
    let session = SessionFile::default();
    let app = AppState::from_session(
        &session,
        Box::new(RecordingSound::default()),
        Box::new(SharedGridView::new(4, 16)),
    )
    .unwrap();
    assert_eq!(app.sequencer().instruments()[2].label, "Hi-Hat");
    assert_eq!(app.sequencer().step_count(), 16);
    assert!(!app.sequencer().is_playing());
}

#[test]
fn test_from_session_rejects_mismatched_preset() {
    let mut session = SessionFile::default();
    session.session.steps = 8;
    session.instruments[0].pattern = Some("x...".to_string());

    let result = AppState::from_session(
        &session,
        Box::new(RecordingSound::default()),
        Box::new(SharedGridView::new(4, 8)),
    );
    match result {
        Err(AppError::Config(ConfigError::Invalid(msg))) => {
            assert!(msg.contains("kick"), "{}", msg)
        }
        Err(other) => panic!("Expected an invalid pattern, got {}", other),
        Ok(_) => panic!("Mismatched preset was accepted"),
    }
    assert!(AppState::config_from_session(&session).is_err());
}
