use std::fs;
use std::io;
use std::path::Path;

use karten_core::{AdminConfig, SourceConfig, SpeechConfig, SyncConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ROOT_ENV: &str = "KARTEN_ROOT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file: {0}")]
    Io(#[from] io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not write default config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub source: SourceConfig,
    pub speech: SpeechConfig,
    pub admin: AdminConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncConfig>,
}

impl ConfigFile {
    pub fn apply_env(&mut self) {
        if let Ok(root) = std::env::var(ROOT_ENV) {
            if !root.trim().is_empty() {
                self.source.root = root;
            }
        }
    }
}

/// Reads `path`, writing a default config there first if it does not exist.
pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    if path.exists() {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    } else {
        let cfg = ConfigFile::default();
        let content = toml::to_string_pretty(&cfg)?;
        fs::write(path, content)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("karten-config-{}-{name}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join("config.toml")
    }

    #[test]
    fn writes_defaults_on_first_run() {
        let path = scratch("first-run");
        let _ = fs::remove_file(&path);

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.source.topics, "data/topics.json");
        assert!(path.exists());

        let again = load_config(&path).unwrap();
        assert_eq!(again.speech.locale, "de-DE");
        assert!(again.sync.is_none());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let cfg: ConfigFile = toml::from_str(
            r#"
            [speech]
            enabled = false

            [sync]
            owner = "anna"
            repo = "deutsch"
            "#,
        )
        .unwrap();
        assert!(!cfg.speech.enabled);
        assert_eq!(cfg.speech.rate, 0.9);
        assert_eq!(cfg.source.root, ".");
        let sync = cfg.sync.unwrap();
        assert_eq!(sync.branch, "main");
        assert_eq!(sync.token_env, "GITHUB_TOKEN");
    }

    #[test]
    fn rejects_invalid_toml() {
        let path = scratch("invalid");
        fs::write(&path, "[source\nroot = 1").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
        fs::remove_file(&path).unwrap();
    }
}
