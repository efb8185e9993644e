use crate::error::{AppError, Result};
use crate::models::{BackupSettings, BackupSnapshot};
use crate::pomodoro::validate_settings;
use crate::repository::Repository;
use crate::store::KeyValueStore;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use serde_json::Value;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

pub const BACKUP_VERSION: &str = "1.0.0";
pub const BACKUP_FILE_PREFIX: &str = "studyhighway-backup";
pub const MAX_INTERVAL_DAYS: u32 = 365;

pub fn is_backup_due(settings: &BackupSettings, now: DateTime<Utc>) -> bool {
    if !settings.enabled {
        return false;
    }
    match settings.last_backup_date {
        None => true,
        Some(last) => (now - last).num_days() >= i64::from(settings.interval_days),
    }
}

pub fn next_backup_date(settings: &BackupSettings) -> Option<DateTime<Utc>> {
    settings
        .last_backup_date
        .map(|last| last + Duration::days(i64::from(settings.interval_days)))
}

/// Full copy of every domain collection. Does not touch the backup slot.
pub fn snapshot<S: KeyValueStore>(repo: &Repository<S>, now: DateTime<Utc>) -> Result<BackupSnapshot> {
    Ok(BackupSnapshot {
        version: BACKUP_VERSION.to_string(),
        export_date: now.to_rfc3339(),
        subjects: repo.subjects()?,
        study_sessions: repo.study_sessions()?,
        weekly_goals: repo.weekly_goals()?,
        exams: repo.exams()?,
        pomodoro_settings: repo.pomodoro_settings()?,
        pomodoro_history: repo.pomodoro_history()?,
    })
}

/// Stores a snapshot as the last backup and stamps `lastBackupDate`.
pub fn create_backup<S: KeyValueStore>(
    repo: &mut Repository<S>,
    now: DateTime<Utc>,
) -> Result<BackupSnapshot> {
    let backup = snapshot(repo, now)?;
    repo.save_last_backup(&backup)?;

    let mut settings = repo.backup_settings()?;
    settings.last_backup_date = Some(now);
    repo.save_backup_settings(&settings)?;

    tracing::info!(export_date = %backup.export_date, "backup created");
    Ok(backup)
}

/// Structural check on an untrusted backup document.
pub fn validate(candidate: &Value) -> bool {
    let Some(object) = candidate.as_object() else {
        return false;
    };
    let non_empty_str = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
    };
    let is_list = |key: &str| object.get(key).is_some_and(Value::is_array);

    non_empty_str("version")
        && non_empty_str("exportDate")
        && is_list("subjects")
        && is_list("studySessions")
        && is_list("weeklyGoals")
        && is_list("exams")
        && is_list("pomodoroHistory")
        && object.get("pomodoroSettings").is_some_and(Value::is_object)
}

/// Overwrites the six domain collections with the snapshot's contents.
pub fn import_all<S: KeyValueStore>(repo: &mut Repository<S>, backup: &BackupSnapshot) -> Result<()> {
    if backup.version.is_empty() || backup.export_date.is_empty() {
        return Err(AppError::invalid_backup("missing version or export date"));
    }
    validate_settings(&backup.pomodoro_settings)
        .map_err(|e| AppError::invalid_backup(format!("pomodoro settings: {e}")))?;
    repo.replace_domain(backup)?;
    tracing::info!(
        version = %backup.version,
        export_date = %backup.export_date,
        subjects = backup.subjects.len(),
        "backup imported"
    );
    Ok(())
}

pub fn import_json<S: KeyValueStore>(repo: &mut Repository<S>, text: &str) -> Result<BackupSnapshot> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| AppError::invalid_backup(format!("not valid JSON: {e}")))?;
    if !validate(&value) {
        return Err(AppError::invalid_backup(
            "backup file is missing fields or has the wrong shape",
        ));
    }
    let backup: BackupSnapshot = serde_json::from_value(value)
        .map_err(|e| AppError::invalid_backup(format!("unreadable records: {e}")))?;
    import_all(repo, &backup)?;
    Ok(backup)
}

pub fn import_file<S: KeyValueStore>(repo: &mut Repository<S>, path: &Path) -> Result<BackupSnapshot> {
    let text = fs::read_to_string(path)?;
    import_json(repo, &text)
}

pub fn restore_last<S: KeyValueStore>(repo: &mut Repository<S>) -> Result<BackupSnapshot> {
    let backup = repo
        .last_backup()?
        .ok_or_else(|| AppError::NotFound("no backup has been created yet".to_string()))?;
    import_all(repo, &backup)?;
    Ok(backup)
}

fn try_auto_backup<S: KeyValueStore>(
    repo: &mut Repository<S>,
    now: DateTime<Utc>,
) -> Result<Option<BackupSnapshot>> {
    let settings = repo.backup_settings()?;
    if !is_backup_due(&settings, now) {
        return Ok(None);
    }
    create_backup(repo, now).map(Some)
}

/// Startup hook. Never fails; problems are only logged.
pub fn auto_backup<S: KeyValueStore>(
    repo: &mut Repository<S>,
    now: DateTime<Utc>,
) -> Option<BackupSnapshot> {
    match try_auto_backup(repo, now) {
        Ok(created) => created,
        Err(err) => {
            tracing::warn!(error = %err, "automatic backup failed");
            None
        }
    }
}

pub fn backup_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!(
        "{BACKUP_FILE_PREFIX}-{}.json",
        now.format("%Y-%m-%d-%H-%M-%S")
    )
}

/// Writes a fresh snapshot to `dir` without recording it as a backup.
pub fn export_to_dir<S: KeyValueStore>(
    repo: &Repository<S>,
    dir: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    let backup = snapshot(repo, now)?;
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    let path = dir.join(backup_file_name(&now.with_timezone(&Local)));
    fs::write(&path, serde_json::to_string_pretty(&backup)?)?;
    tracing::info!(path = %path.display(), "data exported");
    Ok(path)
}

pub fn update_settings<S: KeyValueStore>(
    repo: &mut Repository<S>,
    enabled: Option<bool>,
    interval_days: Option<u32>,
) -> Result<BackupSettings> {
    let mut settings = repo.backup_settings()?;
    if let Some(days) = interval_days {
        if !(1..=MAX_INTERVAL_DAYS).contains(&days) {
            return Err(AppError::validation(format!(
                "backup interval must be between 1 and {MAX_INTERVAL_DAYS} days, got {days}"
            )));
        }
        settings.interval_days = days;
    }
    if let Some(enabled) = enabled {
        settings.enabled = enabled;
    }
    repo.save_backup_settings(&settings)?;
    Ok(settings)
}
