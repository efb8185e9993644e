mod backup;
mod config;
mod error;
mod models;
mod pomodoro;
mod repository;
mod report;
mod stats;
mod store;
mod tracker;
mod tui;
mod utils;

use anyhow::Result;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use fd_lock::RwLock;
use models::{DayDistribution, ExamResult, PomodoroSettings};
use pomodoro::PomodoroEngine;
use report::Reporter;
use stats::Period;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use store::FileStore;
use tracing_subscriber::EnvFilter;
use tracker::{GoalPlan, NewStudySession, Tracker};

#[derive(Parser)]
#[command(name = "studyhighway")]
#[command(about = "Study tracker with a Pomodoro timer and automatic backups", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Pomodoro timer
    Timer,
    /// Show or change the Pomodoro settings
    Settings {
        /// Focus minutes (1-120)
        #[arg(long)]
        work: Option<u32>,
        /// Short break minutes (1-60)
        #[arg(long)]
        short_break: Option<u32>,
        /// Long break minutes (1-120)
        #[arg(long)]
        long_break: Option<u32>,
        /// Work sessions before a long break (1-10)
        #[arg(long)]
        sessions: Option<u32>,
    },
    /// Manage subjects and topics
    Subjects {
        #[command(subcommand)]
        command: SubjectsCommand,
    },
    /// Record study sessions
    Study {
        #[command(subcommand)]
        command: StudyCommand,
    },
    /// Manage weekly goals
    Goals {
        #[command(subcommand)]
        command: GoalsCommand,
    },
    /// Manage mock exams
    Exams {
        #[command(subcommand)]
        command: ExamsCommand,
    },
    /// Print study analytics and Pomodoro history
    Report {
        #[arg(short, long, value_enum, default_value_t = Period::Week)]
        period: Period,
    },
    /// Create, export and restore backups
    Backup {
        #[command(subcommand)]
        command: BackupCommand,
    },
}

#[derive(Subcommand)]
enum SubjectsCommand {
    /// Add subjects, e.g. "MATH:ALGEBRA,GEOMETRY;HISTORY:ROME"
    Add { text: String },
    List,
    /// Rename a subject or a single topic by id
    Rename { id: String, name: String },
    /// Remove a subject or a single topic by id
    Remove { id: String },
}

#[derive(Subcommand)]
enum StudyCommand {
    Log {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        minutes: u32,
        #[arg(long, default_value_t = 0)]
        questions: u32,
        #[arg(long, default_value_t = 0)]
        correct: u32,
    },
}

#[derive(Subcommand)]
enum GoalsCommand {
    Add {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        hours: f64,
        /// Manual split, e.g. mon=2,tue=1.5,sat=3 (defaults to an even split)
        #[arg(long, value_parser = parse_distribution)]
        distribution: Option<DayDistribution>,
    },
    List,
    /// Goals planned for today and their progress
    Today,
    Delete { id: String },
}

#[derive(Subcommand)]
enum ExamsCommand {
    Add {
        #[arg(long)]
        name: String,
        /// Result per subject as SUBJECT_ID=CORRECT/TOTAL
        #[arg(long = "result", value_parser = parse_exam_result, required = true)]
        results: Vec<(String, ExamResult)>,
    },
    List,
    Delete { id: String },
}

#[derive(Subcommand)]
enum BackupCommand {
    Status,
    /// Take a backup now
    Create,
    /// Write a backup file
    Export {
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Replace all data with a backup file
    Import { file: PathBuf },
    /// Replace all data with the last automatic backup
    Restore,
    Settings {
        #[arg(long)]
        enabled: Option<bool>,
        /// Days between automatic backups
        #[arg(long)]
        interval: Option<u32>,
    },
    /// Delete every stored collection
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

fn parse_exam_result(arg: &str) -> std::result::Result<(String, ExamResult), String> {
    let (subject, score) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected SUBJECT=CORRECT/TOTAL, got '{arg}'"))?;
    let (correct, total) = score
        .split_once('/')
        .ok_or_else(|| format!("expected CORRECT/TOTAL, got '{score}'"))?;
    let correct = correct
        .trim()
        .parse()
        .map_err(|_| format!("invalid correct count '{correct}'"))?;
    let total = total
        .trim()
        .parse()
        .map_err(|_| format!("invalid total '{total}'"))?;
    Ok((subject.trim().to_string(), ExamResult { correct, total }))
}

fn parse_distribution(arg: &str) -> std::result::Result<DayDistribution, String> {
    let mut distribution = DayDistribution::default();
    for part in arg.split(',').filter(|p| !p.trim().is_empty()) {
        let (day, hours) = part
            .split_once('=')
            .ok_or_else(|| format!("expected DAY=HOURS, got '{part}'"))?;
        let hours: f64 = hours
            .trim()
            .parse()
            .map_err(|_| format!("invalid hours '{hours}'"))?;
        if hours.is_nan() || hours < 0.0 {
            return Err(format!("hours must not be negative, got '{part}'"));
        }
        let day = day.trim().to_lowercase();
        let slot = match day.get(..3) {
            Some("mon") => &mut distribution.monday,
            Some("tue") => &mut distribution.tuesday,
            Some("wed") => &mut distribution.wednesday,
            Some("thu") => &mut distribution.thursday,
            Some("fri") => &mut distribution.friday,
            Some("sat") => &mut distribution.saturday,
            Some("sun") => &mut distribution.sunday,
            _ => return Err(format!("unknown day '{day}'")),
        };
        *slot = hours;
    }
    Ok(distribution)
}

fn init_logging(base_dir: &Path, default_filter: &str) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(base_dir.join("studyhighway.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn print_settings(settings: &PomodoroSettings) {
    println!("Focus:             {} min", settings.work_minutes);
    println!("Short break:       {} min", settings.break_minutes);
    println!("Long break:        {} min", settings.long_break_minutes);
    println!("Long break every:  {} session(s)", settings.sessions_until_long_break);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let base_dir = FileStore::get_base_dir()?;
    let config = config::load_config(&base_dir)?;
    init_logging(&base_dir, &config.log_filter)?;

    let data_dir = config
        .data_dir
        .clone()
        .unwrap_or_else(|| base_dir.join("data"));
    let mut tracker = Tracker::new(FileStore::from_path(data_dir)?);
    tracing::debug!(
        data_dir = %tracker.repository().store().dir().display(),
        "store opened"
    );
    tracker.startup(Utc::now());

    match cli.command {
        Commands::Timer => {
            let lock_path = base_dir.join("studyhighway.lock");
            let lock_file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(lock_path)?;

            let mut lock = RwLock::new(lock_file);
            let _guard = lock.try_write().map_err(|_| {
                anyhow::anyhow!("Another timer is already running. Please close it before starting a new one.")
            })?;

            let settings = tracker.timer_settings()?;
            let mut engine = PomodoroEngine::new(settings);

            tui::run_tui(&mut tracker, &mut engine)?;

            println!("\nTimer closed.");
            Reporter::new(tracker.repository()).pomodoro_history(1)?;
        }
        Commands::Settings {
            work,
            short_break,
            long_break,
            sessions,
        } => {
            let current = tracker.repository().pomodoro_settings()?;
            if work.is_none() && short_break.is_none() && long_break.is_none() && sessions.is_none() {
                print_settings(&current);
                return Ok(());
            }
            let settings = PomodoroSettings {
                work_minutes: work.unwrap_or(current.work_minutes),
                break_minutes: short_break.unwrap_or(current.break_minutes),
                long_break_minutes: long_break.unwrap_or(current.long_break_minutes),
                sessions_until_long_break: sessions.unwrap_or(current.sessions_until_long_break),
            };
            tracker.update_pomodoro_settings(settings)?;
            println!("Settings saved.");
            print_settings(&settings);
        }
        Commands::Subjects { command } => match command {
            SubjectsCommand::Add { text } => {
                let added = tracker.add_subjects_from_text(&text)?;
                for subject in &added {
                    println!("Added {} with {} topic(s)", subject.name, subject.topics.len());
                }
            }
            SubjectsCommand::List => Reporter::new(tracker.repository()).list_subjects()?,
            SubjectsCommand::Rename { id, name } => {
                tracker.rename(&id, &name)?;
                println!("Renamed to {}", name.trim());
            }
            SubjectsCommand::Remove { id } => match tracker.remove_subject(&id) {
                Ok(subject) => println!("Removed subject {}", subject.name),
                Err(error::AppError::NotFound(_)) => {
                    let topic = tracker.remove_topic(&id)?;
                    println!("Removed topic {}", topic.name);
                }
                Err(err) => return Err(err.into()),
            },
        },
        Commands::Study { command } => match command {
            StudyCommand::Log {
                topic,
                minutes,
                questions,
                correct,
            } => {
                let session = tracker.add_study_session(
                    NewStudySession {
                        topic_id: &topic,
                        duration: minutes,
                        questions,
                        correct_answers: correct,
                    },
                    Utc::now(),
                )?;
                println!(
                    "Logged {} min, {}/{} correct",
                    session.duration, session.correct_answers, session.questions
                );
            }
        },
        Commands::Goals { command } => match command {
            GoalsCommand::Add {
                subject,
                hours,
                distribution,
            } => {
                let plan = distribution.map_or(GoalPlan::Auto, GoalPlan::Manual);
                let goal =
                    tracker.add_weekly_goal(&subject, hours, plan, Local::now().date_naive())?;
                println!(
                    "Goal of {:.1}h added for the week of {} [{}]",
                    goal.target_hours, goal.week_start, goal.id
                );
            }
            GoalsCommand::List => Reporter::new(tracker.repository()).list_goals()?,
            GoalsCommand::Today => {
                Reporter::new(tracker.repository()).today_goals(Local::now().date_naive())?
            }
            GoalsCommand::Delete { id } => {
                tracker.delete_weekly_goal(&id)?;
                println!("Goal deleted.");
            }
        },
        Commands::Exams { command } => match command {
            ExamsCommand::Add { name, results } => {
                let results: BTreeMap<String, ExamResult> = results.into_iter().collect();
                let exam = tracker.add_exam(&name, results, Utc::now())?;
                let totals = exam.totals();
                println!(
                    "Exam {} saved: {}/{} [{}]",
                    exam.name, totals.correct, totals.total, exam.id
                );
            }
            ExamsCommand::List => Reporter::new(tracker.repository()).list_exams()?,
            ExamsCommand::Delete { id } => {
                tracker.delete_exam(&id)?;
                println!("Exam deleted.");
            }
        },
        Commands::Report { period } => {
            let reporter = Reporter::new(tracker.repository());
            reporter.report(period, Utc::now())?;
            println!();
            reporter.pomodoro_history(5)?;
        }
        Commands::Backup { command } => {
            let repo = tracker.repository_mut();
            match command {
                BackupCommand::Status => Reporter::new(repo).backup_status(Utc::now())?,
                BackupCommand::Create => {
                    let backup = backup::create_backup(repo, Utc::now())?;
                    println!("Backup created at {}", backup.export_date);
                }
                BackupCommand::Export { dir } => {
                    let dir = match dir.or(config.export_dir) {
                        Some(dir) => dir,
                        None => std::env::current_dir()?,
                    };
                    let path = backup::export_to_dir(repo, &dir, Utc::now())?;
                    println!("Exported to {}", path.display());
                }
                BackupCommand::Import { file } => {
                    let backup = backup::import_file(repo, &file)?;
                    println!(
                        "Imported backup from {} ({} subjects, {} sessions)",
                        backup.export_date,
                        backup.subjects.len(),
                        backup.study_sessions.len()
                    );
                }
                BackupCommand::Restore => {
                    let backup = backup::restore_last(repo)?;
                    println!("Restored backup from {}", backup.export_date);
                }
                BackupCommand::Settings { enabled, interval } => {
                    let settings = backup::update_settings(repo, enabled, interval)?;
                    println!(
                        "Automatic backup {} every {} day(s)",
                        if settings.enabled { "on" } else { "off" },
                        settings.interval_days
                    );
                }
                BackupCommand::Clear { yes } => {
                    if !yes {
                        anyhow::bail!("This deletes all data. Re-run with --yes to confirm.");
                    }
                    repo.clear_all()?;
                    println!("All data cleared.");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exam_result() {
        let (subject, result) = parse_exam_result("math=7/10").unwrap();
        assert_eq!(subject, "math");
        assert_eq!(result, ExamResult { correct: 7, total: 10 });

        assert!(parse_exam_result("math").is_err());
        assert!(parse_exam_result("math=7").is_err());
        assert!(parse_exam_result("math=x/10").is_err());
    }

    #[test]
    fn test_parse_distribution() {
        let distribution = parse_distribution("mon=2,Tuesday=1.5,sun=0.5").unwrap();
        assert_eq!(distribution.monday, 2.0);
        assert_eq!(distribution.tuesday, 1.5);
        assert_eq!(distribution.sunday, 0.5);
        assert_eq!(distribution.total(), 4.0);

        assert!(parse_distribution("xyz=1").is_err());
        assert!(parse_distribution("mon=-1").is_err());
        assert!(parse_distribution("mon").is_err());
    }

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from([
            "studyhighway",
            "exams",
            "add",
            "--name",
            "Mock 1",
            "--result",
            "math=7/10",
            "--result",
            "history=3/5",
        ])
        .unwrap();
        match cli.command {
            Commands::Exams {
                command: ExamsCommand::Add { name, results },
            } => {
                assert_eq!(name, "Mock 1");
                assert_eq!(results.len(), 2);
            }
            _ => panic!("unexpected command"),
        }

        let cli = Cli::try_parse_from(["studyhighway", "report", "--period", "month"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Report {
                period: Period::Month
            }
        ));
    }
}
