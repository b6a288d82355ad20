//! Application configuration.
//!
//! Settings resolve in layers: built-in defaults, then a config file
//! (explicit `--config`, or one found next to the data directory, or in the
//! working directory), then environment variables, then CLI flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fetch::DEFAULT_FETCH_TIMEOUT_SECS;
use crate::oracle::OracleConfig;
use crate::safety::DnsPolicy;

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the data tree: `sources/`, `state/`, `presentations.json`.
    pub data_dir: PathBuf,
    pub user_agent: String,
    pub fetch_timeout_secs: u64,
    pub dns_policy: DnsPolicy,
    pub oracle: OracleConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./harvest-data"),
            user_agent: "urlharvest/0.3 (project harvester)".to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            dns_policy: DnsPolicy::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Settings {
    pub fn sources_dir(&self) -> PathBuf {
        self.data_dir.join("sources")
    }

    pub fn heartbeat_path(&self) -> PathBuf {
        self.data_dir.join("state").join("heartbeat.json")
    }

    pub fn presentations_path(&self) -> PathBuf {
        self.data_dir.join("presentations.json")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.sources_dir(), self.data_dir.join("state")] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }
}

/// On-disk config file. Every field is optional; present fields override
/// the defaults. TOML or JSON, decided by extension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_policy: Option<DnsPolicy>,
    #[serde(default, skip_serializing_if = "OracleConfig::is_default")]
    pub oracle: OracleConfig,
    /// Where this config was loaded from. Not part of the file.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: AppConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => {
                toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
            }
            _ => serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?,
        };
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Overlay this config onto settings. Relative paths in the file are
    /// resolved against the file's own directory.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(data_dir) = &self.data_dir {
            settings.data_dir = resolve_path(base_dir, data_dir);
        }
        if let Some(user_agent) = &self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.fetch_timeout_secs {
            settings.fetch_timeout_secs = timeout;
        }
        if let Some(policy) = self.dns_policy {
            settings.dns_policy = policy;
        }
        if !self.oracle.is_default() {
            settings.oracle = self.oracle.clone();
        }
    }
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

const CONFIG_BASENAMES: [&str; 2] = ["urlharvest", "config"];
const CONFIG_EXTENSIONS: [&str; 2] = ["toml", "json"];

/// Look for a config file in `dir`: `urlharvest.toml`, `urlharvest.json`,
/// `config.toml`, `config.json`, first hit wins.
pub fn find_config_near(dir: &Path) -> Option<PathBuf> {
    for basename in CONFIG_BASENAMES {
        for ext in CONFIG_EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", basename, ext));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// CLI-level inputs to settings loading.
#[derive(Debug, Default, Clone)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

pub fn load_settings(options: &LoadOptions) -> Result<Settings> {
    let mut settings = Settings::default();

    let config_path = options
        .config_path
        .clone()
        .or_else(|| options.data_dir.as_deref().and_then(find_config_near))
        .or_else(|| find_config_near(Path::new(".")));

    if let Some(path) = config_path {
        let config = AppConfig::load_from_path(&path)?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.apply_to_settings(&mut settings, &base);
        debug!("Loaded config from {}", path.display());
    }

    if let Some(data_dir) = std::env::var("URLHARVEST_DATA_DIR")
        .ok()
        .filter(|s| !s.is_empty())
    {
        settings.data_dir = PathBuf::from(data_dir);
    }
    if let Some(user_agent) = std::env::var("URLHARVEST_USER_AGENT")
        .ok()
        .filter(|s| !s.is_empty())
    {
        settings.user_agent = user_agent;
    }

    // The explicit flag beats everything.
    if let Some(data_dir) = &options.data_dir {
        settings.data_dir = data_dir.clone();
    }

    Ok(settings)
}
