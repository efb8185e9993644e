use crate::backup::{is_backup_due, next_backup_date};
use crate::error::Result;
use crate::repository::Repository;
use crate::stats::{
    calculate_analytics, goal_progress, goals_for_day, percentage, summarize_pomodoro,
    total_hours_for_day, Period,
};
use crate::store::KeyValueStore;
use crate::utils::{format_duration, format_minutes};
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub struct Reporter<'a, S> {
    repo: &'a Repository<S>,
}

impl<'a, S: KeyValueStore> Reporter<'a, S> {
    pub fn new(repo: &'a Repository<S>) -> Self {
        Self { repo }
    }

    pub fn report(&self, period: Period, now: DateTime<Utc>) -> Result<()> {
        let subjects = self.repo.subjects()?;
        let sessions = self.repo.study_sessions()?;
        let exams = self.repo.exams()?;
        if sessions.is_empty() && exams.is_empty() {
            println!("No study data recorded yet.");
            return Ok(());
        }

        let analytics = calculate_analytics(&subjects, &sessions, &exams, period, now);

        println!("Study Report ({:?})", period);
        println!("===================");
        println!(
            "Study Time:          {}",
            format_minutes(i64::from(analytics.total_study_time))
        );
        println!(
            "Questions:           {}/{} correct",
            analytics.total_correct, analytics.total_questions
        );
        println!(
            "Average Performance: {:.1}%",
            analytics.average_performance
        );

        if !analytics.subject_performance.is_empty() {
            println!("\nBy Subject");
            println!("----------");
            for (subject_id, perf) in &analytics.subject_performance {
                let name = subjects
                    .iter()
                    .find(|s| &s.id == subject_id)
                    .map_or(subject_id.as_str(), |s| s.name.as_str());
                println!(
                    "  {:<20} {:>5.1}%  {}/{}  {}",
                    name,
                    perf.percentage(),
                    perf.correct,
                    perf.total,
                    format_minutes(i64::from(perf.time))
                );
            }
        }

        println!("\nWeekly Study Time (oldest first)");
        println!("--------------------------------");
        let weeks = analytics.weekly_study_time.len();
        for (i, minutes) in analytics.weekly_study_time.iter().enumerate() {
            let weeks_ago = weeks - 1 - i;
            let label = if weeks_ago == 0 {
                "This week".to_string()
            } else {
                format!("{} week(s) ago", weeks_ago)
            };
            println!("  {:<16} {}", label, format_minutes(i64::from(*minutes)));
        }

        if !analytics.performance_over_time.is_empty() {
            println!("\nPerformance Over Time");
            println!("---------------------");
            for point in &analytics.performance_over_time {
                println!("  {}  {:>5.1}%", point.date, point.percentage);
            }
        }

        if !analytics.subject_series.is_empty() {
            println!("\nSubject Trends");
            println!("--------------");
        }
        for series in &analytics.subject_series {
            let trend: Vec<String> = series
                .points
                .iter()
                .map(|p| format!("{:.0}%", p.percentage))
                .collect();
            println!("  {:<20} {}", series.name, trend.join(" > "));
        }

        Ok(())
    }

    pub fn list_subjects(&self) -> Result<()> {
        let subjects = self.repo.subjects()?;
        if subjects.is_empty() {
            println!("No subjects yet. Add some with `subjects add \"MATH:ALGEBRA,GEOMETRY\"`.");
            return Ok(());
        }
        for subject in &subjects {
            println!("{} [{}]", subject.name, subject.id);
            for topic in &subject.topics {
                println!(
                    "  - {} [{}] {:.0}% ({}/{}) {}",
                    topic.name,
                    topic.id,
                    percentage(topic.correct_answers, topic.total_questions),
                    topic.correct_answers,
                    topic.total_questions,
                    format_minutes(i64::from(topic.study_time))
                );
            }
        }
        Ok(())
    }

    pub fn list_goals(&self) -> Result<()> {
        let goals = self.repo.weekly_goals()?;
        if goals.is_empty() {
            println!("No weekly goals yet.");
            return Ok(());
        }
        let subjects = self.repo.subjects()?;
        for goal in &goals {
            let name = subjects
                .iter()
                .find(|s| s.id == goal.subject_id)
                .map_or("Unknown subject", |s| s.name.as_str());
            println!(
                "{} [{}] week of {}: {:.1}/{:.1}h ({:.0}%)",
                name,
                goal.id,
                goal.week_start,
                goal.current_hours,
                goal.target_hours,
                goal_progress(goal)
            );
            if let Some(distribution) = &goal.distribution {
                let days: Vec<String> = distribution
                    .days()
                    .iter()
                    .map(|(day, hours)| format!("{}={:.1}", &day[..3], hours))
                    .collect();
                println!("  {}", days.join(" "));
            }
        }
        Ok(())
    }

    pub fn today_goals(&self, today: NaiveDate) -> Result<()> {
        let goals = self.repo.weekly_goals()?;
        let planned = goals_for_day(&goals, today);
        if planned.is_empty() {
            println!("Nothing planned for {}.", today.format("%A"));
            return Ok(());
        }
        let subjects = self.repo.subjects()?;
        println!(
            "{}: {:.1}h planned",
            today.format("%A"),
            total_hours_for_day(&planned)
        );
        for daily in &planned {
            let name = subjects
                .iter()
                .find(|s| s.id == daily.goal.subject_id)
                .map_or("Unknown subject", |s| s.name.as_str());
            println!(
                "  {:<20} {:>4.1}h  {:>3.0}%",
                name, daily.hours, daily.progress
            );
        }
        Ok(())
    }

    pub fn list_exams(&self) -> Result<()> {
        let exams = self.repo.exams()?;
        if exams.is_empty() {
            println!("No exams recorded yet.");
            return Ok(());
        }
        let subjects = self.repo.subjects()?;
        for exam in exams.iter().rev() {
            let totals = exam.totals();
            println!(
                "{} [{}] {}: {}/{} ({:.1}%)",
                exam.name,
                exam.id,
                local_time(exam.date),
                totals.correct,
                totals.total,
                percentage(totals.correct, totals.total)
            );
            for (subject_id, result) in &exam.results {
                let name = subjects
                    .iter()
                    .find(|s| &s.id == subject_id)
                    .map_or(subject_id.as_str(), |s| s.name.as_str());
                println!(
                    "  {:<20} {}/{} ({:.1}%)",
                    name,
                    result.correct,
                    result.total,
                    percentage(result.correct, result.total)
                );
            }
        }
        Ok(())
    }

    pub fn pomodoro_history(&self, limit: usize) -> Result<()> {
        let history = self.repo.pomodoro_history()?;
        if history.is_empty() {
            println!("No Pomodoro sessions recorded yet.");
            return Ok(());
        }

        let summary = summarize_pomodoro(&history);
        println!("Pomodoro History");
        println!("================");
        println!(
            "{} session(s), {} total, {} net study, {} paused",
            summary.sessions,
            format_minutes(summary.total_minutes),
            format_minutes(summary.net_minutes),
            format_minutes(summary.pause_minutes.round() as i64)
        );
        println!(
            "{} work sessions, {} cycles",
            summary.work_sessions, summary.completed_cycles
        );

        for session in history.iter().rev().take(limit) {
            println!(
                "\n{} - {}: {}min net",
                local_time(session.start_time),
                session.end_time.with_timezone(&Local).format("%H:%M"),
                session.net_study_time
            );
            println!(
                "  {} cycles, {} work sessions",
                session.completed_cycles, session.work_sessions
            );
            if !session.pause_durations.is_empty() {
                let paused_secs = (session.total_pause_minutes() * 60.0).round() as i64;
                println!(
                    "  {} pause(s), {} paused",
                    session.pause_durations.len(),
                    format_duration(paused_secs)
                );
            }
        }
        Ok(())
    }

    pub fn backup_status(&self, now: DateTime<Utc>) -> Result<()> {
        let settings = self.repo.backup_settings()?;
        println!("Automatic backup: {}", if settings.enabled { "on" } else { "off" });
        println!("Interval:         {} day(s)", settings.interval_days);
        match settings.last_backup_date {
            Some(last) => {
                let age = now - last;
                println!(
                    "Last backup:      {} ({} ago)",
                    local_time(last),
                    format_duration(age.max(Duration::zero()).num_seconds())
                );
            }
            None => println!("Last backup:      never"),
        }
        if let Some(next) = next_backup_date(&settings) {
            println!("Next backup:      {}", local_time(next));
        }
        println!(
            "Due now:          {}",
            if is_backup_due(&settings, now) { "yes" } else { "no" }
        );
        if let Some(last) = self.repo.last_backup()? {
            println!(
                "Stored snapshot:  v{} from {} ({} subjects, {} sessions)",
                last.version,
                last.export_date,
                last.subjects.len(),
                last.study_sessions.len()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::tracker::{NewStudySession, Tracker};
    use chrono::TimeZone;

    #[test]
    fn test_reports_on_empty_and_populated_data() -> Result<()> {
        let now = Utc.with_ymd_and_hms(2024, 3, 6, 18, 30, 0).unwrap();
        let mut tracker = Tracker::new(MemoryStore::new());

        let reporter = Reporter::new(tracker.repository());
        reporter.report(Period::All, now)?;
        reporter.list_subjects()?;
        reporter.pomodoro_history(5)?;
        reporter.backup_status(now)?;

        let subjects = tracker.add_subjects_from_text("MATH:ALGEBRA")?;
        let topic_id = subjects[0].topics[0].id.clone();
        tracker.add_study_session(
            NewStudySession {
                topic_id: &topic_id,
                duration: 45,
                questions: 10,
                correct_answers: 7,
            },
            now,
        )?;
        tracker.startup(now);

        let reporter = Reporter::new(tracker.repository());
        reporter.report(Period::Week, now)?;
        reporter.list_subjects()?;
        reporter.list_goals()?;
        reporter.today_goals(now.date_naive())?;
        reporter.list_exams()?;
        reporter.backup_status(now + Duration::days(1))?;
        Ok(())
    }
}
