//! Application configuration

use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::paths::normalize_lexically;

/// HMAC key material. Never printed.
#[derive(Clone, Default, Deserialize)]
#[serde(from = "String")]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// What to do with a delivery whose repository is already being pulled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Queue behind the running pull
    #[default]
    Wait,
    /// Answer immediately with a busy error
    Reject,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub secret: Secret,
    /// Every synced working copy lives directly under this directory
    pub repo_root: PathBuf,
    pub host: String,
    pub port: u16,
    /// Header carrying `<algo>=<hex digest>`
    pub signature_header: String,
    pub sync_timeout_secs: u64,
    pub busy_policy: BusyPolicy,
    /// Program followed by its arguments, run inside the working copy
    pub pull_command: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret: Secret::default(),
            repo_root: PathBuf::from("/srv/repos"),
            host: "127.0.0.1".to_string(),
            port: 13000,
            signature_header: "X-Hub-Signature".to_string(),
            sync_timeout_secs: 300,
            busy_policy: BusyPolicy::Wait,
            pull_command: vec!["git".into(), "pull".into(), "--ff-only".into()],
        }
    }
}

impl Config {
    /// Load configuration from the file named by `HOOK_SYNC_CONFIG`
    /// (default `config.yml`), then apply environment overrides.
    pub fn from_env() -> Result<Self> {
        let path = env::var("HOOK_SYNC_CONFIG").unwrap_or_else(|_| "config.yml".to_string());
        let mut config = Self::load(&path)?;
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()
    }

    /// Read a YAML config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(Error::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let config = serde_yaml::from_str(&contents).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `HOST`, `PORT` and `HOOK_SYNC_SECRET` overrides
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(secret) = lookup("HOOK_SYNC_SECRET") {
            self.secret = Secret::from(secret);
        }
    }

    /// Check invariants and normalize `repo_root`
    pub fn validate(mut self) -> Result<Self> {
        if !self.repo_root.is_absolute() {
            return Err(Error::Config(format!(
                "repo_root must be absolute, got {}",
                self.repo_root.display()
            )));
        }
        self.repo_root = normalize_lexically(&self.repo_root);
        if self.repo_root.parent().is_none() {
            return Err(Error::Config(
                "repo_root must not be the filesystem root".to_string(),
            ));
        }
        if self.pull_command.is_empty() || self.pull_command[0].is_empty() {
            return Err(Error::Config("pull_command must name a program".to_string()));
        }
        if self.sync_timeout_secs == 0 {
            return Err(Error::Config("sync_timeout_secs must be positive".to_string()));
        }
        if self.signature_header.is_empty() {
            return Err(Error::Config("signature_header must not be empty".to_string()));
        }
        if self.secret.is_empty() {
            warn!("No webhook secret configured");
        }
        Ok(self)
    }
}
