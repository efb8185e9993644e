use crate::error::Result;
use crate::models::{
    BackupSettings, BackupSnapshot, Exam, PomodoroSession, PomodoroSettings, StudySession,
    Subject, WeeklyGoal,
};
use crate::store::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Subjects,
    StudySessions,
    WeeklyGoals,
    Exams,
    PomodoroSettings,
    PomodoroHistory,
    BackupSettings,
    LastBackup,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Subjects,
        Collection::StudySessions,
        Collection::WeeklyGoals,
        Collection::Exams,
        Collection::PomodoroSettings,
        Collection::PomodoroHistory,
        Collection::BackupSettings,
        Collection::LastBackup,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Collection::Subjects => "subjects",
            Collection::StudySessions => "studySessions",
            Collection::WeeklyGoals => "weeklyGoals",
            Collection::Exams => "exams",
            Collection::PomodoroSettings => "pomodoroSettings",
            Collection::PomodoroHistory => "pomodoroHistory",
            Collection::BackupSettings => "backupSettings",
            Collection::LastBackup => "lastBackupData",
        }
    }
}

/// Typed access to the collections kept in a [`KeyValueStore`].
pub struct Repository<S> {
    store: S,
}

impl<S: KeyValueStore> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn load<T: DeserializeOwned>(&self, collection: Collection) -> Result<Option<T>> {
        match self.store.get(collection.key())? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn save<T: Serialize + ?Sized>(&mut self, collection: Collection, data: &T) -> Result<()> {
        let value = serde_json::to_value(data)?;
        self.store.set(collection.key(), &value)
    }

    fn load_or_default<T: DeserializeOwned + Default>(&self, collection: Collection) -> Result<T> {
        Ok(self.load(collection)?.unwrap_or_default())
    }

    pub fn subjects(&self) -> Result<Vec<Subject>> {
        self.load_or_default(Collection::Subjects)
    }

    pub fn save_subjects(&mut self, subjects: &[Subject]) -> Result<()> {
        self.save(Collection::Subjects, subjects)
    }

    pub fn study_sessions(&self) -> Result<Vec<StudySession>> {
        self.load_or_default(Collection::StudySessions)
    }

    pub fn save_study_sessions(&mut self, sessions: &[StudySession]) -> Result<()> {
        self.save(Collection::StudySessions, sessions)
    }

    pub fn weekly_goals(&self) -> Result<Vec<WeeklyGoal>> {
        self.load_or_default(Collection::WeeklyGoals)
    }

    pub fn save_weekly_goals(&mut self, goals: &[WeeklyGoal]) -> Result<()> {
        self.save(Collection::WeeklyGoals, goals)
    }

    pub fn exams(&self) -> Result<Vec<Exam>> {
        self.load_or_default(Collection::Exams)
    }

    pub fn save_exams(&mut self, exams: &[Exam]) -> Result<()> {
        self.save(Collection::Exams, exams)
    }

    pub fn pomodoro_settings(&self) -> Result<PomodoroSettings> {
        self.load_or_default(Collection::PomodoroSettings)
    }

    pub fn save_pomodoro_settings(&mut self, settings: &PomodoroSettings) -> Result<()> {
        self.save(Collection::PomodoroSettings, settings)
    }

    pub fn pomodoro_history(&self) -> Result<Vec<PomodoroSession>> {
        self.load_or_default(Collection::PomodoroHistory)
    }

    pub fn save_pomodoro_history(&mut self, history: &[PomodoroSession]) -> Result<()> {
        self.save(Collection::PomodoroHistory, history)
    }

    pub fn backup_settings(&self) -> Result<BackupSettings> {
        self.load_or_default(Collection::BackupSettings)
    }

    pub fn save_backup_settings(&mut self, settings: &BackupSettings) -> Result<()> {
        self.save(Collection::BackupSettings, settings)
    }

    pub fn last_backup(&self) -> Result<Option<BackupSnapshot>> {
        self.load(Collection::LastBackup)
    }

    pub fn save_last_backup(&mut self, snapshot: &BackupSnapshot) -> Result<()> {
        self.save(Collection::LastBackup, snapshot)
    }

    /// Replaces the six domain collections in one staged batch write.
    pub fn replace_domain(&mut self, snapshot: &BackupSnapshot) -> Result<()> {
        let entries = [
            (
                Collection::Subjects.key(),
                serde_json::to_value(&snapshot.subjects)?,
            ),
            (
                Collection::StudySessions.key(),
                serde_json::to_value(&snapshot.study_sessions)?,
            ),
            (
                Collection::WeeklyGoals.key(),
                serde_json::to_value(&snapshot.weekly_goals)?,
            ),
            (
                Collection::Exams.key(),
                serde_json::to_value(&snapshot.exams)?,
            ),
            (
                Collection::PomodoroSettings.key(),
                serde_json::to_value(snapshot.pomodoro_settings)?,
            ),
            (
                Collection::PomodoroHistory.key(),
                serde_json::to_value(&snapshot.pomodoro_history)?,
            ),
        ];
        self.store.set_many(&entries)
    }

    pub fn clear_all(&mut self) -> Result<()> {
        let keys: Vec<&str> = Collection::ALL.iter().map(|c| c.key()).collect();
        self.store.remove_many(&keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Topic;
    use crate::store::{FileStore, MemoryStore};
    use tempfile::tempdir;

    #[test]
    fn test_missing_collections_load_defaults() -> Result<()> {
        let repo = Repository::new(MemoryStore::new());

        assert!(repo.subjects()?.is_empty());
        assert!(repo.pomodoro_history()?.is_empty());
        assert_eq!(repo.pomodoro_settings()?, PomodoroSettings::default());
        assert_eq!(repo.backup_settings()?, BackupSettings::default());
        assert!(repo.last_backup()?.is_none());
        Ok(())
    }

    #[test]
    fn test_subjects_persist_through_file_store() -> Result<()> {
        let dir = tempdir()?;
        let mut repo = Repository::new(FileStore::from_path(dir.path().to_path_buf())?);

        let mut subject = Subject {
            id: "s1".to_string(),
            name: "Math".to_string(),
            topics: Vec::new(),
        };
        subject.topics.push(Topic::new("Algebra", "s1"));
        repo.save_subjects(&[subject])?;

        let reopened = Repository::new(FileStore::from_path(dir.path().to_path_buf())?);
        let subjects = reopened.subjects()?;
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].topics[0].name, "Algebra");

        let raw = std::fs::read_to_string(dir.path().join("subjects.json"))?;
        assert!(raw.contains("\"subjectId\""));
        Ok(())
    }

    #[test]
    fn test_clear_all_removes_every_collection() -> Result<()> {
        let mut repo = Repository::new(MemoryStore::new());
        repo.save_pomodoro_settings(&PomodoroSettings {
            work_minutes: 50,
            ..PomodoroSettings::default()
        })?;
        repo.save_backup_settings(&BackupSettings {
            enabled: false,
            ..BackupSettings::default()
        })?;

        repo.clear_all()?;

        assert_eq!(repo.pomodoro_settings()?, PomodoroSettings::default());
        assert!(repo.backup_settings()?.enabled);
        Ok(())
    }
}
