use crate::error::Result;
use serde_json::Value;
#[cfg(test)]
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Named JSON blobs. Writes are whole-value replacements.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&mut self, key: &str, value: &Value) -> Result<()>;

    /// Writes several entries together. Every entry is staged before any is
    /// committed, so a failed staging write leaves all of them unchanged.
    /// The commit itself is best-effort per entry.
    fn set_many(&mut self, entries: &[(&str, Value)]) -> Result<()>;

    fn remove_many(&mut self, keys: &[&str]) -> Result<()>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn get_base_dir() -> Result<PathBuf> {
        let mut path = dirs::home_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "Could not find home directory")
        })?;
        path.push(".studyhighway");
        if !path.exists() {
            fs::create_dir_all(&path)?;
        }
        Ok(path)
    }

    pub fn from_path(dir: PathBuf) -> Result<Self> {
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn stage(&self, key: &str, value: &Value) -> Result<PathBuf> {
        let data = serde_json::to_string_pretty(value)?;
        let tmp_path = self.path_for(key).with_extension("tmp");
        fs::write(&tmp_path, data)?;
        Ok(tmp_path)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&data)?))
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        let tmp_path = self.stage(key, value)?;
        fs::rename(&tmp_path, self.path_for(key))?;
        Ok(())
    }

    fn set_many(&mut self, entries: &[(&str, Value)]) -> Result<()> {
        let mut staged = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match self.stage(key, value) {
                Ok(tmp_path) => staged.push((tmp_path, self.path_for(key))),
                Err(err) => {
                    for (tmp_path, _) in &staged {
                        let _ = fs::remove_file(tmp_path);
                    }
                    tracing::warn!(key = *key, error = %err, "aborting batch write");
                    return Err(err);
                }
            }
        }

        for (i, (tmp_path, path)) in staged.iter().enumerate() {
            if let Err(err) = fs::rename(tmp_path, path) {
                for (leftover, _) in &staged[i..] {
                    let _ = fs::remove_file(leftover);
                }
                tracing::warn!(path = %path.display(), error = %err, "batch commit interrupted");
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn remove_many(&mut self, keys: &[&str]) -> Result<()> {
        for key in keys {
            let path = self.path_for(key);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Value>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn set_many(&mut self, entries: &[(&str, Value)]) -> Result<()> {
        for (key, value) in entries {
            self.entries.insert(key.to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_many(&mut self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.entries.remove(*key);
        }
        Ok(())
    }
}
