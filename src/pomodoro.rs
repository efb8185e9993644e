use crate::error::{AppError, Result};
use crate::models::{new_id, PomodoroSession, PomodoroSettings};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

pub const WORK_MINUTES_RANGE: RangeInclusive<u32> = 1..=120;
pub const BREAK_MINUTES_RANGE: RangeInclusive<u32> = 1..=60;
pub const LONG_BREAK_MINUTES_RANGE: RangeInclusive<u32> = 1..=120;
pub const SESSIONS_UNTIL_LONG_BREAK_RANGE: RangeInclusive<u32> = 1..=10;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Work,
    Break,
    LongBreak,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Work => "Focus",
            Phase::Break => "Break",
            Phase::LongBreak => "Long Break",
        }
    }

    pub fn duration_secs(self, settings: &PomodoroSettings) -> u32 {
        let minutes = match self {
            Phase::Work => settings.work_minutes,
            Phase::Break => settings.break_minutes,
            Phase::LongBreak => settings.long_break_minutes,
        };
        minutes.saturating_mul(60)
    }
}

pub fn validate_settings(settings: &PomodoroSettings) -> Result<()> {
    let checks = [
        ("work time", settings.work_minutes, WORK_MINUTES_RANGE),
        ("short break", settings.break_minutes, BREAK_MINUTES_RANGE),
        ("long break", settings.long_break_minutes, LONG_BREAK_MINUTES_RANGE),
        (
            "sessions until long break",
            settings.sessions_until_long_break,
            SESSIONS_UNTIL_LONG_BREAK_RANGE,
        ),
    ];
    for (name, value, range) in checks {
        if !range.contains(&value) {
            return Err(AppError::validation(format!(
                "{name} must be between {} and {}, got {value}",
                range.start(),
                range.end()
            )));
        }
    }
    Ok(())
}

/// Phase position plus the counters that drive the long-break boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cycle {
    pub phase: Phase,
    pub completed_work_sessions: u32,
    pub completed_cycles: u32,
}

/// Next position after the current phase runs out.
///
/// A finished short break counts as a completed cycle, and so does entering
/// a long break. Leaving a long break adds nothing.
pub fn complete_phase(cycle: Cycle, settings: &PomodoroSettings) -> Cycle {
    let every = settings.sessions_until_long_break.max(1);
    match cycle.phase {
        Phase::Work => {
            let completed_work_sessions = cycle.completed_work_sessions + 1;
            if completed_work_sessions % every == 0 {
                Cycle {
                    phase: Phase::LongBreak,
                    completed_work_sessions,
                    completed_cycles: cycle.completed_cycles + 1,
                }
            } else {
                Cycle {
                    phase: Phase::Break,
                    completed_work_sessions,
                    ..cycle
                }
            }
        }
        Phase::Break | Phase::LongBreak => {
            let completed_cycles = if cycle.completed_work_sessions % every != 0 {
                cycle.completed_cycles + 1
            } else {
                cycle.completed_cycles
            };
            Cycle {
                phase: Phase::Work,
                completed_cycles,
                ..cycle
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
}

fn round_minutes(millis: i64) -> i64 {
    (millis + 30_000).div_euclid(60_000)
}

#[derive(Debug, Clone)]
pub struct PomodoroEngine {
    settings: PomodoroSettings,
    cycle: Cycle,
    remaining_secs: u32,
    running: bool,
    session_start: Option<DateTime<Utc>>,
    pause_start: Option<DateTime<Utc>>,
    pause_durations: Vec<Duration>,
    last_tick: Option<DateTime<Utc>>,
}

impl PomodoroEngine {
    pub fn new(settings: PomodoroSettings) -> Self {
        Self {
            settings,
            cycle: Cycle::default(),
            remaining_secs: Phase::Work.duration_secs(&settings),
            running: false,
            session_start: None,
            pause_start: None,
            pause_durations: Vec::new(),
            last_tick: None,
        }
    }

    pub fn settings(&self) -> &PomodoroSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.cycle.phase
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn completed_work_sessions(&self) -> u32 {
        self.cycle.completed_work_sessions
    }

    pub fn completed_cycles(&self) -> u32 {
        self.cycle.completed_cycles
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        self.session_start
    }

    pub fn pause_count(&self) -> usize {
        self.pause_durations.len()
    }

    pub fn has_progress(&self) -> bool {
        self.cycle.completed_work_sessions > 0 || self.cycle.completed_cycles > 0
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.running {
            return;
        }
        if self.session_start.is_none() {
            self.session_start = Some(now);
        } else if let Some(paused_at) = self.pause_start.take() {
            self.pause_durations.push(now - paused_at);
        }
        self.running = true;
        self.last_tick = Some(now);
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        if !self.running {
            return;
        }
        self.pause_start = Some(now);
        self.running = false;
        self.last_tick = None;
    }

    pub fn toggle(&mut self, now: DateTime<Utc>) {
        if self.running {
            self.pause(now);
        } else {
            self.start(now);
        }
    }

    /// Counts down the whole seconds elapsed since the last accounted instant.
    /// Returns the transition when the countdown reaches zero; the timer then
    /// stops until started again.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<PhaseChange> {
        if !self.running {
            return None;
        }
        let last = self.last_tick.unwrap_or(now);
        let elapsed = (now - last).num_seconds();
        if elapsed <= 0 {
            return None;
        }
        self.last_tick = Some(last + Duration::seconds(elapsed));

        let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
        if elapsed < self.remaining_secs {
            self.remaining_secs -= elapsed;
            return None;
        }

        let from = self.cycle.phase;
        self.cycle = complete_phase(self.cycle, &self.settings);
        self.remaining_secs = self.cycle.phase.duration_secs(&self.settings);
        self.running = false;
        self.last_tick = None;

        tracing::info!(
            from = from.label(),
            to = self.cycle.phase.label(),
            work_sessions = self.cycle.completed_work_sessions,
            cycles = self.cycle.completed_cycles,
            "pomodoro phase completed"
        );
        Some(PhaseChange {
            from,
            to: self.cycle.phase,
        })
    }

    /// The record `reset` would produce at `now`, without touching the run.
    pub fn session_record(&self, now: DateTime<Utc>) -> Option<PomodoroSession> {
        if self.has_progress() {
            Some(self.finalize(now))
        } else {
            None
        }
    }

    /// Finalizes the run into a session record when it made progress, then
    /// returns to a fresh work phase.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Option<PomodoroSession> {
        let record = self.session_record(now);

        self.cycle = Cycle::default();
        self.remaining_secs = Phase::Work.duration_secs(&self.settings);
        self.running = false;
        self.session_start = None;
        self.pause_start = None;
        self.pause_durations.clear();
        self.last_tick = None;

        record
    }

    fn finalize(&self, now: DateTime<Utc>) -> PomodoroSession {
        let start = self.session_start.unwrap_or(now);
        let total_ms = (now - start).num_milliseconds();
        let pause_ms: i64 = self
            .pause_durations
            .iter()
            .map(|d| d.num_milliseconds())
            .sum();
        let net_ms = (total_ms - pause_ms).max(0);

        PomodoroSession {
            id: new_id(),
            date: now,
            completed_cycles: self.cycle.completed_cycles,
            total_minutes: round_minutes(total_ms.max(0)),
            work_sessions: self.cycle.completed_work_sessions,
            start_time: start,
            end_time: now,
            pause_time: self.pause_start,
            net_study_time: round_minutes(net_ms),
            pause_durations: self
                .pause_durations
                .iter()
                .map(|d| d.num_milliseconds() as f64 / 60_000.0)
                .collect(),
        }
    }

    /// Applies new settings. A changed work time retargets the countdown only
    /// while idle in the work phase.
    pub fn update_settings(&mut self, settings: PomodoroSettings) -> Result<()> {
        validate_settings(&settings)?;
        let work_changed = settings.work_minutes != self.settings.work_minutes;
        self.settings = settings;
        if work_changed && self.cycle.phase == Phase::Work && !self.running {
            self.remaining_secs = Phase::Work.duration_secs(&self.settings);
        }
        Ok(())
    }
}
