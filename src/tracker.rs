use crate::backup;
use crate::error::{AppError, Result};
use crate::models::{
    new_id, BackupSnapshot, DayDistribution, Exam, ExamResult, PomodoroSession, PomodoroSettings,
    StudySession, Subject, Topic, WeeklyGoal,
};
use crate::pomodoro::validate_settings;
use crate::repository::Repository;
use crate::stats::{percentage, performance_color};
use crate::store::KeyValueStore;
use crate::utils::week_start;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Tolerance, in hours, between a manual distribution and its target.
const DISTRIBUTION_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub enum GoalPlan {
    Auto,
    Manual(DayDistribution),
}

#[derive(Debug, Clone, Copy)]
pub struct NewStudySession<'a> {
    pub topic_id: &'a str,
    pub duration: u32,
    pub questions: u32,
    pub correct_answers: u32,
}

/// Parses `SUBJECT:topic,topic;SUBJECT:topic`. Malformed blocks are skipped.
pub fn parse_subjects(text: &str) -> Vec<Subject> {
    let mut subjects = Vec::new();

    for block in text.split(';').filter(|b| !b.trim().is_empty()) {
        let parts: Vec<&str> = block.split(':').collect();
        if parts.len() != 2 {
            continue;
        }
        let name = parts[0].trim();
        let topics_text = parts[1].trim();
        if name.is_empty() || topics_text.is_empty() {
            continue;
        }

        let id = new_id();
        let topics = topics_text
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| Topic::new(t, id.clone()))
            .collect();
        subjects.push(Subject {
            id,
            name: name.to_string(),
            topics,
        });
    }

    subjects
}

/// Application state. Every change is written through the repository.
pub struct Tracker<S> {
    repo: Repository<S>,
}

impl<S: KeyValueStore> Tracker<S> {
    pub fn new(store: S) -> Self {
        Self {
            repo: Repository::new(store),
        }
    }

    pub fn repository(&self) -> &Repository<S> {
        &self.repo
    }

    pub fn repository_mut(&mut self) -> &mut Repository<S> {
        &mut self.repo
    }

    /// Runs once per launch, before anything else touches the data.
    pub fn startup(&mut self, now: DateTime<Utc>) -> Option<BackupSnapshot> {
        let created = backup::auto_backup(&mut self.repo, now);
        if created.is_some() {
            tracing::info!("automatic backup created at startup");
        }
        created
    }

    pub fn add_subjects(&mut self, new_subjects: Vec<Subject>) -> Result<Vec<Subject>> {
        let mut subjects = self.repo.subjects()?;
        subjects.extend(new_subjects);
        self.repo.save_subjects(&subjects)?;
        Ok(subjects)
    }

    pub fn add_subjects_from_text(&mut self, text: &str) -> Result<Vec<Subject>> {
        if text.trim().is_empty() {
            return Err(AppError::validation("subject text is empty"));
        }
        let parsed = parse_subjects(text);
        if parsed.is_empty() {
            return Err(AppError::validation(
                "invalid format, use SUBJECT:TOPIC,TOPIC;SUBJECT:TOPIC",
            ));
        }
        self.add_subjects(parsed.clone())?;
        tracing::info!(count = parsed.len(), "subjects added");
        Ok(parsed)
    }

    pub fn update_subjects(&mut self, subjects: Vec<Subject>) -> Result<()> {
        for subject in &subjects {
            if subject.name.trim().is_empty() {
                return Err(AppError::validation("every subject needs a name"));
            }
            if subject.topics.iter().any(|t| t.name.trim().is_empty()) {
                return Err(AppError::validation("every topic needs a name"));
            }
        }
        self.repo.save_subjects(&subjects)
    }

    /// Renames the subject or topic with this id.
    pub fn rename(&mut self, id: &str, name: &str) -> Result<()> {
        let mut subjects = self.repo.subjects()?;
        let name = name.trim().to_string();
        if let Some(subject) = subjects.iter_mut().find(|s| s.id == id) {
            subject.name = name;
        } else if let Some(topic) = subjects
            .iter_mut()
            .flat_map(|s| s.topics.iter_mut())
            .find(|t| t.id == id)
        {
            topic.name = name;
        } else {
            return Err(AppError::NotFound(format!("subject or topic {id}")));
        }
        self.update_subjects(subjects)
    }

    pub fn remove_subject(&mut self, subject_id: &str) -> Result<Subject> {
        let mut subjects = self.repo.subjects()?;
        let index = subjects
            .iter()
            .position(|s| s.id == subject_id)
            .ok_or_else(|| AppError::NotFound(format!("subject {subject_id}")))?;
        let removed = subjects.remove(index);
        self.repo.save_subjects(&subjects)?;
        Ok(removed)
    }

    pub fn remove_topic(&mut self, topic_id: &str) -> Result<Topic> {
        let mut subjects = self.repo.subjects()?;
        let removed = subjects.iter_mut().find_map(|subject| {
            let index = subject.topics.iter().position(|t| t.id == topic_id)?;
            Some(subject.topics.remove(index))
        });
        let removed = removed.ok_or_else(|| AppError::NotFound(format!("topic {topic_id}")))?;
        self.repo.save_subjects(&subjects)?;
        Ok(removed)
    }

    /// Records a session and folds it into the topic's counters and the
    /// weekly goals of the topic's subject.
    pub fn add_study_session(
        &mut self,
        input: NewStudySession<'_>,
        now: DateTime<Utc>,
    ) -> Result<StudySession> {
        if input.duration == 0 {
            return Err(AppError::validation("duration must be greater than zero"));
        }
        if input.correct_answers > input.questions {
            return Err(AppError::validation(
                "correct answers cannot exceed the number of questions",
            ));
        }

        let mut subjects = self.repo.subjects()?;
        let (subject_id, topic) = subjects
            .iter_mut()
            .find_map(|subject| {
                let id = subject.id.clone();
                subject
                    .topics
                    .iter_mut()
                    .find(|t| t.id == input.topic_id)
                    .map(|topic| (id, topic))
            })
            .ok_or_else(|| AppError::NotFound(format!("topic {}", input.topic_id)))?;

        let overflow = || AppError::validation("topic totals are too large to record this session");
        topic.total_questions = topic
            .total_questions
            .checked_add(input.questions)
            .ok_or_else(overflow)?;
        topic.correct_answers = topic
            .correct_answers
            .checked_add(input.correct_answers)
            .ok_or_else(overflow)?;
        topic.study_time = topic
            .study_time
            .checked_add(input.duration)
            .ok_or_else(overflow)?;
        topic.color =
            performance_color(percentage(topic.correct_answers, topic.total_questions)).to_string();

        let session = StudySession {
            id: new_id(),
            topic_id: input.topic_id.to_string(),
            date: now,
            duration: input.duration,
            questions: input.questions,
            correct_answers: input.correct_answers,
        };

        let mut sessions = self.repo.study_sessions()?;
        sessions.push(session.clone());
        self.repo.save_study_sessions(&sessions)?;
        self.repo.save_subjects(&subjects)?;

        let studied_hours = f64::from(input.duration) / 60.0;
        let mut goals = self.repo.weekly_goals()?;
        let mut touched = false;
        for goal in goals.iter_mut().filter(|g| g.subject_id == subject_id) {
            goal.current_hours += studied_hours;
            touched = true;
        }
        if touched {
            self.repo.save_weekly_goals(&goals)?;
        }

        tracing::debug!(topic = input.topic_id, minutes = input.duration, "study session logged");
        Ok(session)
    }

    pub fn add_weekly_goal(
        &mut self,
        subject_id: &str,
        target_hours: f64,
        plan: GoalPlan,
        today: NaiveDate,
    ) -> Result<WeeklyGoal> {
        if target_hours.is_nan() || target_hours <= 0.0 {
            return Err(AppError::validation("target hours must be greater than zero"));
        }
        if !self.repo.subjects()?.iter().any(|s| s.id == subject_id) {
            return Err(AppError::NotFound(format!("subject {subject_id}")));
        }

        let distribution = match plan {
            GoalPlan::Auto => DayDistribution::even(target_hours),
            GoalPlan::Manual(distribution) => {
                if (distribution.total() - target_hours).abs() > DISTRIBUTION_TOLERANCE {
                    return Err(AppError::validation(format!(
                        "daily hours add up to {:.1}, expected {:.1}",
                        distribution.total(),
                        target_hours
                    )));
                }
                distribution
            }
        };

        let goal = WeeklyGoal {
            id: new_id(),
            subject_id: subject_id.to_string(),
            week_start: week_start(today),
            target_hours,
            current_hours: 0.0,
            distribution: Some(distribution),
        };

        let mut goals = self.repo.weekly_goals()?;
        goals.push(goal.clone());
        self.repo.save_weekly_goals(&goals)?;
        Ok(goal)
    }

    pub fn delete_weekly_goal(&mut self, goal_id: &str) -> Result<()> {
        let mut goals = self.repo.weekly_goals()?;
        let before = goals.len();
        goals.retain(|g| g.id != goal_id);
        if goals.len() == before {
            return Err(AppError::NotFound(format!("goal {goal_id}")));
        }
        self.repo.save_weekly_goals(&goals)
    }

    /// Results with zero questions are dropped; at least one must remain.
    pub fn add_exam(
        &mut self,
        name: &str,
        results: BTreeMap<String, ExamResult>,
        now: DateTime<Utc>,
    ) -> Result<Exam> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("exam name is empty"));
        }

        let mut kept = BTreeMap::new();
        for (subject_id, result) in results {
            if result.total == 0 {
                continue;
            }
            if result.correct > result.total {
                return Err(AppError::validation(
                    "correct answers cannot exceed the number of questions",
                ));
            }
            kept.insert(subject_id, result);
        }
        if kept.is_empty() {
            return Err(AppError::validation("add at least one result"));
        }

        let exam = Exam {
            id: new_id(),
            name: name.to_string(),
            date: now,
            results: kept,
        };
        let mut exams = self.repo.exams()?;
        exams.push(exam.clone());
        self.repo.save_exams(&exams)?;
        Ok(exam)
    }

    pub fn delete_exam(&mut self, exam_id: &str) -> Result<()> {
        let mut exams = self.repo.exams()?;
        let before = exams.len();
        exams.retain(|e| e.id != exam_id);
        if exams.len() == before {
            return Err(AppError::NotFound(format!("exam {exam_id}")));
        }
        self.repo.save_exams(&exams)
    }

    pub fn add_pomodoro_session(&mut self, session: PomodoroSession) -> Result<()> {
        let mut history = self.repo.pomodoro_history()?;
        history.push(session);
        self.repo.save_pomodoro_history(&history)
    }

    pub fn update_pomodoro_settings(&mut self, settings: PomodoroSettings) -> Result<()> {
        validate_settings(&settings)?;
        self.repo.save_pomodoro_settings(&settings)
    }

    /// Stored settings, or the defaults when the stored values are out of range.
    pub fn timer_settings(&self) -> Result<PomodoroSettings> {
        let settings = self.repo.pomodoro_settings()?;
        match validate_settings(&settings) {
            Ok(()) => Ok(settings),
            Err(err) => {
                tracing::warn!(error = %err, "stored pomodoro settings rejected, using defaults");
                Ok(PomodoroSettings::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 6, 18, 30, 0).unwrap()
    }

    fn setup_tracker() -> (Tracker<MemoryStore>, Vec<Subject>) {
        let mut tracker = Tracker::new(MemoryStore::new());
        let subjects = tracker
            .add_subjects_from_text("Math: Algebra, Geometry; History: Rome")
            .unwrap();
        (tracker, subjects)
    }

    #[test]
    fn test_parse_subjects() {
        let subjects = parse_subjects("Math: Algebra, Geometry ,; Bad block; :orphan; History:Rome;;");
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[0].name, "Math");
        assert_eq!(subjects[0].topics.len(), 2);
        assert_eq!(subjects[0].topics[1].name, "Geometry");
        assert!(subjects[0].topics.iter().all(|t| t.subject_id == subjects[0].id));
        assert_eq!(subjects[1].topics[0].name, "Rome");
    }

    #[test]
    fn test_add_subjects_from_text_rejects_garbage() {
        let mut tracker = Tracker::new(MemoryStore::new());
        assert!(matches!(
            tracker.add_subjects_from_text("   "),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            tracker.add_subjects_from_text("no separators here"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_add_study_session_updates_topic_and_goals() -> Result<()> {
        let (mut tracker, subjects) = setup_tracker();
        let math = &subjects[0];
        let algebra = &math.topics[0];
        let goal = tracker.add_weekly_goal(&math.id, 7.0, GoalPlan::Auto, now().date_naive())?;

        tracker.add_study_session(
            NewStudySession {
                topic_id: &algebra.id,
                duration: 90,
                questions: 10,
                correct_answers: 9,
            },
            now(),
        )?;

        let stored = tracker.repository().subjects()?;
        let topic = &stored[0].topics[0];
        assert_eq!(topic.total_questions, 10);
        assert_eq!(topic.correct_answers, 9);
        assert_eq!(topic.study_time, 90);
        assert_eq!(topic.color, "#10B981");

        let goals = tracker.repository().weekly_goals()?;
        assert_eq!(goals[0].id, goal.id);
        assert!((goals[0].current_hours - 1.5).abs() < 1e-9);
        assert_eq!(tracker.repository().study_sessions()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_add_study_session_validation() {
        let (mut tracker, subjects) = setup_tracker();
        let topic_id = subjects[0].topics[0].id.clone();

        let too_many_correct = tracker.add_study_session(
            NewStudySession {
                topic_id: &topic_id,
                duration: 30,
                questions: 5,
                correct_answers: 6,
            },
            now(),
        );
        assert!(matches!(too_many_correct, Err(AppError::Validation(_))));

        let unknown_topic = tracker.add_study_session(
            NewStudySession {
                topic_id: "missing",
                duration: 30,
                questions: 5,
                correct_answers: 5,
            },
            now(),
        );
        assert!(matches!(unknown_topic, Err(AppError::NotFound(_))));
        assert!(tracker.repository().study_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_add_study_session_rejects_counter_overflow() -> Result<()> {
        let (mut tracker, subjects) = setup_tracker();
        let topic_id = subjects[0].topics[0].id.as_str();
        let log = |questions: u32, duration: u32| NewStudySession {
            topic_id,
            duration,
            questions,
            correct_answers: 0,
        };

        tracker.add_study_session(log(u32::MAX - 1, 10), now())?;
        assert!(matches!(
            tracker.add_study_session(log(5, 10), now()),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            tracker.add_study_session(log(0, u32::MAX), now()),
            Err(AppError::Validation(_))
        ));

        let topic = &tracker.repository().subjects()?[0].topics[0];
        assert_eq!(topic.total_questions, u32::MAX - 1);
        assert_eq!(topic.study_time, 10);
        assert_eq!(tracker.repository().study_sessions()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_weekly_goal_plans() -> Result<()> {
        let (mut tracker, subjects) = setup_tracker();
        let math_id = subjects[0].id.clone();
        let wednesday = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();

        let auto = tracker.add_weekly_goal(&math_id, 14.0, GoalPlan::Auto, wednesday)?;
        assert_eq!(auto.week_start, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(auto.distribution.unwrap().friday, 2.0);

        let uneven = DayDistribution {
            monday: 3.0,
            wednesday: 3.0,
            ..DayDistribution::default()
        };
        let err = tracker
            .add_weekly_goal(&math_id, 10.0, GoalPlan::Manual(uneven.clone()), wednesday)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        tracker.add_weekly_goal(&math_id, 6.05, GoalPlan::Manual(uneven), wednesday)?;
        assert!(matches!(
            tracker.add_weekly_goal(&math_id, 0.0, GoalPlan::Auto, wednesday),
            Err(AppError::Validation(_))
        ));
        assert_eq!(tracker.repository().weekly_goals()?.len(), 2);

        tracker.delete_weekly_goal(&auto.id)?;
        assert_eq!(tracker.repository().weekly_goals()?.len(), 1);
        assert!(matches!(
            tracker.delete_weekly_goal(&auto.id),
            Err(AppError::NotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_add_exam_validation() -> Result<()> {
        let (mut tracker, subjects) = setup_tracker();
        let math_id = subjects[0].id.clone();
        let history_id = subjects[1].id.clone();

        let mut results = BTreeMap::new();
        results.insert(math_id.clone(), ExamResult { correct: 8, total: 10 });
        results.insert(history_id.clone(), ExamResult { correct: 0, total: 0 });
        let exam = tracker.add_exam("  Mock 1 ", results, now())?;
        assert_eq!(exam.name, "Mock 1");
        assert_eq!(exam.results.len(), 1);

        let mut bad = BTreeMap::new();
        bad.insert(math_id.clone(), ExamResult { correct: 11, total: 10 });
        assert!(matches!(
            tracker.add_exam("Mock 2", bad, now()),
            Err(AppError::Validation(_))
        ));

        let mut empty = BTreeMap::new();
        empty.insert(history_id, ExamResult { correct: 0, total: 0 });
        assert!(matches!(
            tracker.add_exam("Mock 3", empty, now()),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            tracker.add_exam(" ", BTreeMap::new(), now()),
            Err(AppError::Validation(_))
        ));

        tracker.delete_exam(&exam.id)?;
        assert!(tracker.repository().exams()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_remove_subject_and_topic() -> Result<()> {
        let (mut tracker, subjects) = setup_tracker();
        let geometry = subjects[0].topics[1].clone();

        let removed = tracker.remove_topic(&geometry.id)?;
        assert_eq!(removed.name, "Geometry");
        assert_eq!(tracker.repository().subjects()?[0].topics.len(), 1);

        tracker.remove_subject(&subjects[1].id)?;
        assert_eq!(tracker.repository().subjects()?.len(), 1);
        assert!(matches!(
            tracker.remove_subject("nope"),
            Err(AppError::NotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_update_subjects_requires_names() {
        let (mut tracker, mut subjects) = setup_tracker();
        subjects[1].topics[0].name = "  ".to_string();
        assert!(matches!(
            tracker.update_subjects(subjects),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_rename_subject_and_topic() -> Result<()> {
        let (mut tracker, subjects) = setup_tracker();
        tracker.rename(&subjects[0].id, " Mathematics ")?;
        tracker.rename(&subjects[1].topics[0].id, "Ancient Rome")?;

        let stored = tracker.repository().subjects()?;
        assert_eq!(stored[0].name, "Mathematics");
        assert_eq!(stored[1].topics[0].name, "Ancient Rome");

        assert!(matches!(
            tracker.rename(&subjects[0].id, "   "),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            tracker.rename("missing", "x"),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(tracker.repository().subjects()?[0].name, "Mathematics");
        Ok(())
    }

    #[test]
    fn test_timer_settings_falls_back_to_defaults() -> Result<()> {
        let mut tracker = Tracker::new(MemoryStore::new());
        let broken = PomodoroSettings {
            work_minutes: 100_000_000,
            break_minutes: 0,
            long_break_minutes: 5,
            sessions_until_long_break: 0,
        };
        tracker.repository_mut().save_pomodoro_settings(&broken)?;
        assert_eq!(tracker.timer_settings()?, PomodoroSettings::default());

        let custom = PomodoroSettings {
            work_minutes: 50,
            ..PomodoroSettings::default()
        };
        tracker.update_pomodoro_settings(custom)?;
        assert_eq!(tracker.timer_settings()?, custom);
        Ok(())
    }

    #[test]
    fn test_pomodoro_settings_and_history() -> Result<()> {
        let mut tracker = Tracker::new(MemoryStore::new());
        let bad = PomodoroSettings {
            long_break_minutes: 0,
            ..PomodoroSettings::default()
        };
        assert!(tracker.update_pomodoro_settings(bad).is_err());
        assert_eq!(
            tracker.repository().pomodoro_settings()?,
            PomodoroSettings::default()
        );

        let good = PomodoroSettings {
            work_minutes: 40,
            ..PomodoroSettings::default()
        };
        tracker.update_pomodoro_settings(good)?;
        assert_eq!(tracker.repository().pomodoro_settings()?.work_minutes, 40);

        tracker.add_pomodoro_session(PomodoroSession {
            id: "p1".to_string(),
            date: now(),
            completed_cycles: 1,
            total_minutes: 30,
            work_sessions: 1,
            start_time: now(),
            end_time: now(),
            pause_time: None,
            net_study_time: 25,
            pause_durations: vec![5.0],
        })?;
        assert_eq!(tracker.repository().pomodoro_history()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_startup_runs_auto_backup_once() -> Result<()> {
        let (mut tracker, _) = setup_tracker();
        assert!(tracker.startup(now()).is_some());
        assert!(tracker.startup(now()).is_none());
        let last = tracker.repository().last_backup()?.unwrap();
        assert_eq!(last.subjects.len(), 2);
        Ok(())
    }
}
