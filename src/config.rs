use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Config {
    /// Where the collections live. Defaults to `~/.studyhighway/data`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Directory for `backup export` when `--dir` is not given.
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
}

fn default_log_filter() -> String {
    "studyhighway=info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_filter: default_log_filter(),
            export_dir: None,
        }
    }
}

pub fn load_config(base_dir: &Path) -> Result<Config> {
    let path = base_dir.join("config.json");

    if !path.exists() {
        let config = Config::default();
        let data = serde_json::to_string_pretty(&config)?;
        fs::write(&path, data)?;
        return Ok(config);
    }

    let data = fs::read_to_string(&path)?;
    let config = serde_json::from_str(&data)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_creates_default() -> Result<()> {
        let dir = tempdir()?;
        let config = load_config(dir.path())?;

        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.json").exists());
        Ok(())
    }

    #[test]
    fn test_load_config_fills_missing_fields() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("config.json"),
            r#"{"data_dir": "/tmp/study"}"#,
        )?;

        let config = load_config(dir.path())?;
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/study")));
        assert_eq!(config.log_filter, "studyhighway=info");
        assert!(config.export_dir.is_none());
        Ok(())
    }
}
