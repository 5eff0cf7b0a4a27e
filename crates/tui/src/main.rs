use std::env;
use std::error::Error;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use app_state::{AppState, InputEvent};
use audio::{serve, AudioConnector};
use crossbeam_channel::Sender;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use grid_core::SequencerEvent;
use log::{error, info};
use project::load_or_default;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Terminal,
};
use sequencer::SharedGridView;

const TEMPO_STEP: u32 = 5;
const STEP_COUNTS: [usize; 3] = [8, 16, 32];
const FLASH: Duration = Duration::from_millis(120);
const AUDIO_QUEUE: usize = 256;
const HELP_LINE: &str =
    "[Space] Toggle [Arrows] Move [P] Play [S] Stop [+/-] Tempo [ [ ] ] Steps [C] Clear [Q] Quit";

fn setup_logging() {
    let log_path = env::temp_dir().join("beatgrid.log");
    println!("Logging to file: {}", log_path.display());

    let file = match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: Could not open log file: {}", e);
            return;
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            writeln!(buf, "[{}] [{}] {}", timestamp, record.level(), record.args())
        })
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
}

/// Header and footer state, kept current from the sequencer's events
#[derive(Debug, Clone)]
struct Status {
    bpm: u32,
    steps: usize,
    playing: bool,
    message: String,
}

impl Status {
    fn apply(&mut self, event: &SequencerEvent) {
        match event {
            SequencerEvent::PlaybackStateChanged(playing) => {
                self.playing = *playing;
                self.message.clear();
            }
            SequencerEvent::StartFailed(err) => {
                self.message = format!("Audio unavailable: {}", err)
            }
            SequencerEvent::TempoChanged(bpm) => self.bpm = *bpm,
            SequencerEvent::StepCountChanged(steps) => self.steps = *steps,
            SequencerEvent::PatternCleared => self.message = "Pattern cleared".to_string(),
            _ => {}
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    row: usize,
    step: usize,
}

impl Cursor {
    fn move_by(&mut self, code: KeyCode, rows: usize, steps: usize) {
        match code {
            KeyCode::Left => self.step = self.step.saturating_sub(1),
            KeyCode::Right if self.step + 1 < steps => self.step += 1,
            KeyCode::Up => self.row = self.row.saturating_sub(1),
            KeyCode::Down if self.row + 1 < rows => self.row += 1,
            _ => {}
        }
    }

    fn clamp(&mut self, rows: usize, steps: usize) {
        self.row = self.row.min(rows.saturating_sub(1));
        self.step = self.step.min(steps.saturating_sub(1));
    }
}

fn next_step_count(current: usize, forward: bool) -> usize {
    let position = STEP_COUNTS.iter().position(|&n| n >= current).unwrap_or(STEP_COUNTS.len() - 1);
    if forward {
        if STEP_COUNTS[position] > current {
            STEP_COUNTS[position]
        } else {
            STEP_COUNTS[(position + 1) % STEP_COUNTS.len()]
        }
    } else {
        STEP_COUNTS[(position + STEP_COUNTS.len() - 1) % STEP_COUNTS.len()]
    }
}

/// Map a key press onto a sequencer input. Cursor keys are handled locally.
fn key_to_input(
    code: KeyCode,
    cursor: &mut Cursor,
    status: &Status,
    rows: usize,
) -> Option<InputEvent> {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Some(InputEvent::Quit),
        KeyCode::Char(' ') | KeyCode::Enter => Some(InputEvent::CellClicked {
            row: cursor.row,
            step: cursor.step,
        }),
        KeyCode::Char('p') => Some(InputEvent::PlayClicked),
        KeyCode::Char('s') => Some(InputEvent::StopClicked),
        KeyCode::Char('+') | KeyCode::Char('=') => {
            Some(InputEvent::TempoChanged(status.bpm.saturating_add(TEMPO_STEP)))
        }
        KeyCode::Char('-') => Some(InputEvent::TempoChanged(status.bpm.saturating_sub(TEMPO_STEP))),
        KeyCode::Char(']') => {
            Some(InputEvent::StepCountChanged(next_step_count(status.steps, true)))
        }
        KeyCode::Char('[') => {
            Some(InputEvent::StepCountChanged(next_step_count(status.steps, false)))
        }
        KeyCode::Char('c') => Some(InputEvent::ClearPattern),
        k @ (KeyCode::Left | KeyCode::Right | KeyCode::Up | KeyCode::Down) => {
            cursor.move_by(k, rows, status.steps);
            None
        }
        _ => None,
    }
}

fn run_ui<B: Backend>(
    terminal: &mut Terminal<B>,
    session_name: &str,
    labels: &[String],
    view: &SharedGridView,
    status: &Arc<Mutex<Status>>,
    hits: &Arc<Mutex<Vec<Option<Instant>>>>,
    inputs: &Sender<InputEvent>,
) -> io::Result<()> {
    let mut cursor = Cursor::default();

    loop {
        let grid = view.snapshot();
        let current = status.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let flashes: Vec<bool> = hits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|hit| hit.map_or(false, |at| at.elapsed() < FLASH))
            .collect();
        cursor.clamp(grid.rows(), grid.steps());

        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Length(grid.rows() as u16 + 2),
                    Constraint::Length(4),
                ])
                .split(f.area());

            let position = grid
                .current_step()
                .map_or_else(|| "--".to_string(), |step| format!("{:02}", step + 1));
            let header = Paragraph::new(format!(
                "{} | BPM:{} STEP:{}/{:02} | {}",
                session_name,
                current.bpm,
                position,
                grid.steps(),
                if current.playing { "PLAYING" } else { "STOPPED" }
            ))
            .block(Block::default().borders(Borders::ALL));
            f.render_widget(header, chunks[0]);

            let rows: Vec<Row> = (0..grid.rows())
                .map(|row| {
                    let label_style = if flashes.get(row).copied().unwrap_or(false) {
                        Style::default().fg(Color::Black).bg(Color::Cyan)
                    } else {
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                    };
                    let label = labels.get(row).map(String::as_str).unwrap_or("?");
                    let mut cells = vec![Cell::from(format!("{:<8}", label)).style(label_style)];

                    cells.extend((0..grid.steps()).map(|step| {
                        let on = grid.is_active(row, step);
                        let mut style = Style::default();
                        if on {
                            style = style.fg(Color::Green);
                        }
                        if grid.is_highlighted(row, step) {
                            style = style.bg(Color::DarkGray);
                        }
                        if cursor.row == row && cursor.step == step {
                            style = style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
                        }
                        Cell::from(if on { "X" } else { "." }).style(style)
                    }));

                    Row::new(cells).height(1)
                })
                .collect();

            let mut widths = vec![Constraint::Length(8)];
            widths.extend(std::iter::repeat(Constraint::Length(1)).take(grid.steps()));
            let table = Table::new(rows, widths)
                .block(Block::default().title("PATTERN VIEW").borders(Borders::ALL));
            f.render_widget(table, chunks[1]);

            let footer = Paragraph::new(format!(
                "{}\n{}",
                HELP_LINE, current.message
            ))
            .block(Block::default().borders(Borders::ALL));
            f.render_widget(footer, chunks[2]);
        })?;

        if event::poll(Duration::from_millis(30))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(input) = key_to_input(key.code, &mut cursor, &current, grid.rows()) {
                    if inputs.send(input).is_err() {
                        error!("Dispatch loop is gone, leaving");
                        return Ok(());
                    }
                    if input == InputEvent::Quit {
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    setup_logging();

    let session_path = env::args().nth(1).map(PathBuf::from);
    let session = match load_or_default(session_path.as_deref()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Could not load session: {}", e);
            return Err(e.into());
        }
    };

    let instruments = session.instruments();
    let labels: Vec<String> = instruments.iter().map(|i| i.label.clone()).collect();
    let view = SharedGridView::new(instruments.len(), session.session.steps);

    // Stand-in engine: acknowledges resume requests and flashes the instrument label
    let hits = Arc::new(Mutex::new(vec![None; instruments.len()]));
    let (connector, engine_inbox) = AudioConnector::new(AUDIO_QUEUE);
    let engine_hits = Arc::clone(&hits);
    let engine = thread::Builder::new()
        .name("audio-engine".to_string())
        .spawn(move || {
            serve(engine_inbox, |trigger| {
                let mut hits = engine_hits.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(hit) = hits.get_mut(trigger.instrument) {
                    *hit = Some(Instant::now());
                }
            })
        })?;

    let app = AppState::from_session(&session, Box::new(connector), Box::new(view.clone()))?;

    let status = Arc::new(Mutex::new(Status {
        bpm: app.sequencer().bpm(),
        steps: app.sequencer().step_count(),
        playing: false,
        message: String::new(),
    }));
    let listener_status = Arc::clone(&status);
    app.subscribe_to_events(move |event| {
        listener_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(event);
    });

    let (inputs, dispatch) = app.spawn();
    info!("beatgrid started with session '{}'", session.session.name);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_ui(
        &mut terminal,
        &session.session.name,
        &labels,
        &view,
        &status,
        &hits,
        &inputs,
    );

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    // The dispatch thread owns the connector; once it ends the engine loop ends too
    let _ = inputs.send(InputEvent::Quit);
    drop(inputs);
    if dispatch.join().is_err() {
        error!("Dispatch thread panicked");
    }
    if engine.join().is_err() {
        error!("Audio engine thread panicked");
    }

    info!("beatgrid finished");
    result.map_err(Into::into)
}
