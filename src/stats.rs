use crate::models::{Exam, PomodoroSession, StudySession, Subject, WeeklyGoal};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use clap::ValueEnum;
use std::collections::{BTreeMap, HashMap};

/// Most recent points kept in the overall performance series.
const PERFORMANCE_POINTS: usize = 30;
const WEEK_BUCKETS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Period {
    Week,
    Month,
    All,
}

impl Period {
    pub fn start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Period::Week => Some(now - Duration::days(7)),
            Period::Month => now.checked_sub_months(Months::new(1)),
            Period::All => None,
        }
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct SubjectPerformance {
    pub correct: u32,
    pub total: u32,
    /// Minutes studied.
    pub time: u32,
}

impl SubjectPerformance {
    pub fn percentage(&self) -> f64 {
        percentage(self.correct, self.total)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PerformancePoint {
    pub date: NaiveDate,
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubjectSeries {
    pub subject_id: String,
    pub name: String,
    pub points: Vec<PerformancePoint>,
}

#[derive(Default, Clone, Debug)]
pub struct Analytics {
    pub total_study_time: u32,
    pub total_questions: u32,
    pub total_correct: u32,
    pub average_performance: f64,
    pub subject_performance: BTreeMap<String, SubjectPerformance>,
    /// Minutes per week, oldest first; the last bucket is the current week.
    pub weekly_study_time: [u32; WEEK_BUCKETS],
    pub performance_over_time: Vec<PerformancePoint>,
    pub subject_series: Vec<SubjectSeries>,
}

/// A weekly goal with hours planned for a given day.
#[derive(Clone, Debug, PartialEq)]
pub struct DailyGoal<'a> {
    pub goal: &'a WeeklyGoal,
    pub hours: f64,
    /// Week-to-date hours against the day's plan, capped at 100.
    pub progress: f64,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct PomodoroSummary {
    pub sessions: usize,
    pub total_minutes: i64,
    pub net_minutes: i64,
    pub pause_minutes: f64,
    pub work_sessions: u32,
    pub completed_cycles: u32,
}

pub fn percentage(correct: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(correct) / f64::from(total) * 100.0
    }
}

pub fn performance_color(percentage: f64) -> &'static str {
    if percentage >= 80.0 {
        "#10B981"
    } else if percentage >= 60.0 {
        "#F59E0B"
    } else if percentage >= 40.0 {
        "#F97316"
    } else {
        "#EF4444"
    }
}

pub fn goal_progress(goal: &WeeklyGoal) -> f64 {
    if goal.target_hours > 0.0 {
        goal.current_hours / goal.target_hours * 100.0
    } else {
        0.0
    }
}

pub fn goals_for_day(goals: &[WeeklyGoal], day: NaiveDate) -> Vec<DailyGoal<'_>> {
    goals
        .iter()
        .filter_map(|goal| {
            let hours = goal.distribution.as_ref()?.hours_on(day.weekday());
            if hours <= 0.0 {
                return None;
            }
            Some(DailyGoal {
                goal,
                hours,
                progress: (goal.current_hours / hours * 100.0).min(100.0),
            })
        })
        .collect()
}

pub fn total_hours_for_day(goals: &[DailyGoal<'_>]) -> f64 {
    goals.iter().map(|g| g.hours).sum()
}

fn topic_owners(subjects: &[Subject]) -> HashMap<&str, &str> {
    subjects
        .iter()
        .flat_map(|s| s.topics.iter().map(move |t| (t.id.as_str(), s.id.as_str())))
        .collect()
}

pub fn weekly_study_time(sessions: &[StudySession], now: DateTime<Utc>) -> [u32; WEEK_BUCKETS] {
    let mut weeks = [0; WEEK_BUCKETS];
    for session in sessions {
        let days_ago = (now - session.date).num_seconds().div_euclid(86400);
        let week_index = days_ago.div_euclid(7);
        if (0..WEEK_BUCKETS as i64).contains(&week_index) {
            weeks[WEEK_BUCKETS - 1 - week_index as usize] += session.duration;
        }
    }
    weeks
}

fn to_points(by_date: BTreeMap<NaiveDate, (u32, u32)>) -> Vec<PerformancePoint> {
    by_date
        .into_iter()
        .map(|(date, (correct, total))| PerformancePoint {
            date,
            percentage: percentage(correct, total),
        })
        .collect()
}

pub fn performance_over_time(sessions: &[StudySession], exams: &[Exam]) -> Vec<PerformancePoint> {
    let mut by_date: BTreeMap<NaiveDate, (u32, u32)> = BTreeMap::new();

    for session in sessions {
        let entry = by_date.entry(session.date.date_naive()).or_default();
        entry.0 += session.correct_answers;
        entry.1 += session.questions;
    }
    for exam in exams {
        let totals = exam.totals();
        let entry = by_date.entry(exam.date.date_naive()).or_default();
        entry.0 += totals.correct;
        entry.1 += totals.total;
    }

    let points = to_points(by_date);
    let skip = points.len().saturating_sub(PERFORMANCE_POINTS);
    points.into_iter().skip(skip).collect()
}

pub fn subject_performance_over_time(
    sessions: &[StudySession],
    exams: &[Exam],
    subjects: &[Subject],
) -> Vec<SubjectSeries> {
    let owners = topic_owners(subjects);
    let mut data: HashMap<&str, BTreeMap<NaiveDate, (u32, u32)>> = HashMap::new();

    for session in sessions {
        if let Some(subject_id) = owners.get(session.topic_id.as_str()) {
            let entry = data
                .entry(*subject_id)
                .or_default()
                .entry(session.date.date_naive())
                .or_default();
            entry.0 += session.correct_answers;
            entry.1 += session.questions;
        }
    }
    for exam in exams {
        for (subject_id, result) in &exam.results {
            let entry = data
                .entry(subject_id.as_str())
                .or_default()
                .entry(exam.date.date_naive())
                .or_default();
            entry.0 += result.correct;
            entry.1 += result.total;
        }
    }

    subjects
        .iter()
        .filter_map(|subject| {
            let by_date = data.remove(subject.id.as_str())?;
            Some(SubjectSeries {
                subject_id: subject.id.clone(),
                name: subject.name.clone(),
                points: to_points(by_date),
            })
        })
        .filter(|series| !series.points.is_empty())
        .collect()
}

pub fn calculate_analytics(
    subjects: &[Subject],
    sessions: &[StudySession],
    exams: &[Exam],
    period: Period,
    now: DateTime<Utc>,
) -> Analytics {
    let start = period.start(now);
    let in_period = |date: DateTime<Utc>| start.map_or(true, |s| date >= s);

    let sessions: Vec<StudySession> = sessions
        .iter()
        .filter(|s| in_period(s.date))
        .cloned()
        .collect();
    let exams: Vec<Exam> = exams.iter().filter(|e| in_period(e.date)).cloned().collect();

    let total_study_time = sessions.iter().map(|s| s.duration).sum();
    let total_questions = sessions.iter().map(|s| s.questions).sum();
    let total_correct = sessions.iter().map(|s| s.correct_answers).sum();

    let owners = topic_owners(subjects);
    let mut subject_performance: BTreeMap<String, SubjectPerformance> = BTreeMap::new();
    for session in &sessions {
        if let Some(subject_id) = owners.get(session.topic_id.as_str()) {
            let perf = subject_performance
                .entry(subject_id.to_string())
                .or_default();
            perf.correct += session.correct_answers;
            perf.total += session.questions;
            perf.time += session.duration;
        }
    }
    for exam in &exams {
        for (subject_id, result) in &exam.results {
            let perf = subject_performance.entry(subject_id.clone()).or_default();
            perf.correct += result.correct;
            perf.total += result.total;
        }
    }

    Analytics {
        total_study_time,
        total_questions,
        total_correct,
        average_performance: percentage(total_correct, total_questions),
        subject_performance,
        weekly_study_time: weekly_study_time(&sessions, now),
        performance_over_time: performance_over_time(&sessions, &exams),
        subject_series: subject_performance_over_time(&sessions, &exams, subjects),
    }
}

pub fn summarize_pomodoro(history: &[PomodoroSession]) -> PomodoroSummary {
    history.iter().fold(PomodoroSummary::default(), |mut acc, session| {
        acc.sessions += 1;
        acc.total_minutes += session.total_minutes;
        acc.net_minutes += session.net_study_time;
        acc.pause_minutes += session.total_pause_minutes();
        acc.work_sessions += session.work_sessions;
        acc.completed_cycles += session.completed_cycles;
        acc
    })
}
