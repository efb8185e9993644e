use crate::error::AppError;
use crate::models::PomodoroSettings;
use crate::pomodoro::{Phase, PhaseChange, PomodoroEngine};
use crate::store::KeyValueStore;
use crate::tracker::Tracker;
use crate::utils::{format_clock, format_duration};
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::time::Duration as StdDuration;

pub fn run_tui<S: KeyValueStore>(
    tracker: &mut Tracker<S>,
    engine: &mut PomodoroEngine,
) -> Result<()> {
    // setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_loop(&mut terminal, tracker, engine);

    // restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    res
}

/// Focus minutes added or removed by `+` and `-`.
const WORK_STEP_MINUTES: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Continue,
    Quit,
}

/// Persists the run before clearing it, so a failed write keeps the progress.
fn save_run<S: KeyValueStore>(
    tracker: &mut Tracker<S>,
    engine: &mut PomodoroEngine,
    now: DateTime<Utc>,
) -> Result<bool> {
    let saved = match engine.session_record(now) {
        Some(session) => {
            tracing::info!(
                net_minutes = session.net_study_time,
                cycles = session.completed_cycles,
                "pomodoro session saved"
            );
            tracker.add_pomodoro_session(session)?;
            true
        }
        None => false,
    };
    engine.reset(now);
    Ok(saved)
}

/// Saves the new focus length and hands it to the running engine. Values
/// out of range come back as the status message.
fn change_work_minutes<S: KeyValueStore>(
    tracker: &mut Tracker<S>,
    engine: &mut PomodoroEngine,
    delta: i32,
) -> Result<String> {
    let current = *engine.settings();
    let settings = PomodoroSettings {
        work_minutes: current.work_minutes.saturating_add_signed(delta),
        ..current
    };
    match tracker.update_pomodoro_settings(settings) {
        Ok(()) => {}
        Err(err @ AppError::Validation(_)) => return Ok(err.to_string()),
        Err(err) => return Err(err.into()),
    }
    engine.update_settings(settings)?;
    Ok(format!("Focus set to {} min", settings.work_minutes))
}

fn handle_key<S: KeyValueStore>(
    code: KeyCode,
    tracker: &mut Tracker<S>,
    engine: &mut PomodoroEngine,
    status: &mut Option<String>,
    now: DateTime<Utc>,
) -> Result<KeyAction> {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => {
            save_run(tracker, engine, now)?;
            return Ok(KeyAction::Quit);
        }
        KeyCode::Char(' ') => {
            engine.toggle(now);
            *status = None;
        }
        KeyCode::Char('r') => {
            *status = Some(if save_run(tracker, engine, now)? {
                "Session saved to history".to_string()
            } else {
                "Timer reset".to_string()
            });
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            *status = Some(change_work_minutes(tracker, engine, WORK_STEP_MINUTES)?);
        }
        KeyCode::Char('-') => {
            *status = Some(change_work_minutes(tracker, engine, -WORK_STEP_MINUTES)?);
        }
        _ => {}
    }
    Ok(KeyAction::Continue)
}

fn run_loop<S: KeyValueStore>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    tracker: &mut Tracker<S>,
    engine: &mut PomodoroEngine,
) -> Result<()> {
    let mut status: Option<String> = None;

    loop {
        terminal.draw(|f| draw(f, engine, status.as_deref()))?;

        if event::poll(StdDuration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && handle_key(key.code, tracker, engine, &mut status, Utc::now())?
                        == KeyAction::Quit
                {
                    return Ok(());
                }
            }
        }

        if let Some(PhaseChange { from, to }) = engine.tick(Utc::now()) {
            status = Some(format!(
                "{} finished. Press space to start the {}",
                from.label(),
                to.label().to_lowercase()
            ));
        }
    }
}

fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::Work => Color::Red,
        Phase::Break => Color::Green,
        Phase::LongBreak => Color::Blue,
    }
}

pub fn draw(frame: &mut Frame, engine: &PomodoroEngine, status: Option<&str>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(5), // Countdown
            Constraint::Length(3), // Progress
            Constraint::Min(0),    // Session
            Constraint::Length(3), // Footer
        ])
        .split(frame.size());

    draw_header(frame, chunks[0], engine);
    draw_countdown(frame, chunks[1], engine, status);
    draw_progress(frame, chunks[2], engine);
    draw_session(frame, chunks[3], engine);
    draw_footer(frame, chunks[4]);
}

fn draw_header(frame: &mut Frame, area: Rect, engine: &PomodoroEngine) {
    let status_text = if engine.is_running() {
        Span::styled(
            "RUNNING",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )
    } else if engine.session_start().is_some() {
        Span::styled(
            "PAUSED",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(
            "READY",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )
    };

    let header_content = Line::from(vec![
        Span::styled(
            " StudyHighway ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(
            engine.phase().label(),
            Style::default()
                .fg(phase_color(engine.phase()))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        status_text,
        Span::raw(" | "),
        Span::raw(Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
    ]);

    let header = Paragraph::new(header_content).block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

fn draw_countdown(frame: &mut Frame, area: Rect, engine: &PomodoroEngine, status: Option<&str>) {
    let lines = vec![
        Line::from(Span::styled(
            format_clock(engine.remaining_secs()),
            Style::default()
                .fg(phase_color(engine.phase()))
                .add_modifier(Modifier::BOLD),
        )),
        Line::raw(""),
        Line::raw(status.unwrap_or_default().to_string()),
    ];
    let countdown = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(countdown, area);
}

fn draw_progress(frame: &mut Frame, area: Rect, engine: &PomodoroEngine) {
    let total = engine.phase().duration_secs(engine.settings()).max(1);
    let done = total.saturating_sub(engine.remaining_secs());
    let ratio = (f64::from(done) / f64::from(total)).clamp(0.0, 1.0);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(phase_color(engine.phase())))
        .ratio(ratio);
    frame.render_widget(gauge, area);
}

fn draw_session(frame: &mut Frame, area: Rect, engine: &PomodoroEngine) {
    let settings = engine.settings();
    let every = settings.sessions_until_long_break.max(1);
    let until_long = every - engine.completed_work_sessions() % every;

    let elapsed = engine
        .session_start()
        .map(|start| (Utc::now() - start).num_seconds().max(0))
        .unwrap_or(0);

    let lines = vec![
        Line::raw(format!(
            "  Work sessions: {}",
            engine.completed_work_sessions()
        )),
        Line::raw(format!("  Cycles:        {}", engine.completed_cycles())),
        Line::raw(format!("  Long break in: {} session(s)", until_long)),
        Line::raw(""),
        Line::raw(format!("  Elapsed:       {}", format_duration(elapsed))),
        Line::raw(format!("  Pauses:        {}", engine.pause_count())),
        Line::raw(""),
        Line::raw(format!(
            "  Settings: {}m focus / {}m break / {}m long break, every {}",
            settings.work_minutes,
            settings.break_minutes,
            settings.long_break_minutes,
            settings.sessions_until_long_break
        )),
    ];

    let block = Block::default()
        .title(Span::styled(
            " SESSION ",
            Style::default().add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_footer(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new("'space' start/pause | 'r' reset | '+'/'-' focus length | 'q' quit")
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(help, area);
}
