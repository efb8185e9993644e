use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NEW_TOPIC_COLOR: &str = "#6B7280";

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub subject_id: String,
    pub total_questions: u32,
    pub correct_answers: u32,
    /// Accumulated study time in minutes.
    pub study_time: u32,
    pub color: String,
}

impl Topic {
    pub fn new(name: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            subject_id: subject_id.into(),
            total_questions: 0,
            correct_answers: 0,
            study_time: 0,
            color: NEW_TOPIC_COLOR.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub topics: Vec<Topic>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: String,
    pub topic_id: String,
    pub date: DateTime<Utc>,
    /// Minutes studied.
    pub duration: u32,
    pub questions: u32,
    pub correct_answers: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DayDistribution {
    pub monday: f64,
    pub tuesday: f64,
    pub wednesday: f64,
    pub thursday: f64,
    pub friday: f64,
    pub saturday: f64,
    pub sunday: f64,
}

impl DayDistribution {
    pub fn even(total_hours: f64) -> Self {
        let per_day = total_hours / 7.0;
        Self {
            monday: per_day,
            tuesday: per_day,
            wednesday: per_day,
            thursday: per_day,
            friday: per_day,
            saturday: per_day,
            sunday: per_day,
        }
    }

    pub fn days(&self) -> [(&'static str, f64); 7] {
        [
            ("monday", self.monday),
            ("tuesday", self.tuesday),
            ("wednesday", self.wednesday),
            ("thursday", self.thursday),
            ("friday", self.friday),
            ("saturday", self.saturday),
            ("sunday", self.sunday),
        ]
    }

    pub fn hours_on(&self, day: Weekday) -> f64 {
        match day {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }

    pub fn total(&self) -> f64 {
        self.days().iter().map(|(_, hours)| hours).sum()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyGoal {
    pub id: String,
    pub subject_id: String,
    pub week_start: NaiveDate,
    pub target_hours: f64,
    #[serde(default)]
    pub current_hours: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<DayDistribution>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamResult {
    pub correct: u32,
    pub total: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    /// Results keyed by subject id.
    pub results: BTreeMap<String, ExamResult>,
}

impl Exam {
    pub fn totals(&self) -> ExamResult {
        self.results.values().fold(
            ExamResult {
                correct: 0,
                total: 0,
            },
            |acc, r| ExamResult {
                correct: acc.correct + r.correct,
                total: acc.total + r.total,
            },
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSettings {
    #[serde(alias = "workTime")]
    pub work_minutes: u32,
    #[serde(alias = "breakTime")]
    pub break_minutes: u32,
    #[serde(alias = "longBreakTime")]
    pub long_break_minutes: u32,
    pub sessions_until_long_break: u32,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            break_minutes: 5,
            long_break_minutes: 15,
            sessions_until_long_break: 4,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSession {
    pub id: String,
    pub date: DateTime<Utc>,
    pub completed_cycles: u32,
    pub total_minutes: i64,
    pub work_sessions: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_time: Option<DateTime<Utc>>,
    /// Minutes of study with pauses removed.
    pub net_study_time: i64,
    /// Length of each pause, in minutes.
    #[serde(default)]
    pub pause_durations: Vec<f64>,
}

impl PomodoroSession {
    pub fn total_pause_minutes(&self) -> f64 {
        self.pause_durations.iter().sum()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupSettings {
    pub enabled: bool,
    pub interval_days: u32,
    pub last_backup_date: Option<DateTime<Utc>>,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_days: 3,
            last_backup_date: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub version: String,
    pub export_date: String,
    pub subjects: Vec<Subject>,
    pub study_sessions: Vec<StudySession>,
    pub weekly_goals: Vec<WeeklyGoal>,
    pub exams: Vec<Exam>,
    pub pomodoro_settings: PomodoroSettings,
    pub pomodoro_history: Vec<PomodoroSession>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pomodoro_settings_accepts_legacy_names() {
        let json = r#"{"workTime":50,"breakTime":10,"longBreakTime":20,"sessionsUntilLongBreak":3}"#;
        let settings: PomodoroSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.work_minutes, 50);
        assert_eq!(settings.break_minutes, 10);
        assert_eq!(settings.long_break_minutes, 20);
        assert_eq!(settings.sessions_until_long_break, 3);

        let out = serde_json::to_value(settings).unwrap();
        assert_eq!(out["workMinutes"], 50);
    }

    #[test]
    fn test_goal_current_hours_defaults_to_zero() {
        let json = r#"{"id":"g1","subjectId":"s1","weekStart":"2024-03-04","targetHours":7}"#;
        let goal: WeeklyGoal = serde_json::from_str(json).unwrap();
        assert_eq!(goal.current_hours, 0.0);
        assert!(goal.distribution.is_none());
    }

    #[test]
    fn test_even_distribution_sums_to_target() {
        let distribution = DayDistribution::even(14.0);
        assert_eq!(distribution.monday, 2.0);
        assert!((distribution.total() - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_hours_on_maps_weekdays() {
        let distribution = DayDistribution {
            monday: 1.0,
            sunday: 3.5,
            ..DayDistribution::default()
        };
        assert_eq!(distribution.hours_on(Weekday::Mon), 1.0);
        assert_eq!(distribution.hours_on(Weekday::Sun), 3.5);
        assert_eq!(distribution.hours_on(Weekday::Wed), 0.0);
    }
}
