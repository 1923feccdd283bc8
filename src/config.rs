use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::strip::StripOptions;

const CONFIG_FILE_NAMES: [&str; 3] = [
    "config.toml",
    "config/config.toml",
    "config/skin-jsonc.toml",
];

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub strip: StripOptions,
    pub watch: WatchConfig,
    pub log: LogConfig,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = env::current_dir() {
            candidates.extend(candidate_paths(&current_dir));
        }

        if let Ok(exe) = env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.extend(candidate_paths(dir));
            }
        }

        for path in candidates {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Config::default())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Err(anyhow!("Config file {} does not exist", path.display()));
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn parse(data: &str) -> anyhow::Result<Self> {
        let doc: ConfigDocument = toml::from_str(data)?;
        Ok(doc.into())
    }
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub extensions: Vec<String>,
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["json".to_string(), "jsonc".to_string()],
            debounce_ms: 250,
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.min(5_000))
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    strip: StripSection,
    #[serde(default)]
    watch: WatchSection,
    #[serde(default)]
    log: LogSection,
}

impl From<ConfigDocument> for Config {
    fn from(value: ConfigDocument) -> Self {
        let watch_defaults = WatchConfig::default();
        let extensions = value
            .watch
            .extensions
            .map(|exts| {
                exts.into_iter()
                    .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                    .filter(|ext| !ext.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|exts| !exts.is_empty())
            .unwrap_or(watch_defaults.extensions);

        Config {
            strip: StripOptions {
                preserve_whitespace: value.strip.preserve_whitespace.unwrap_or(false),
            },
            watch: WatchConfig {
                extensions,
                debounce_ms: value.watch.debounce_ms.unwrap_or(watch_defaults.debounce_ms),
            },
            log: LogConfig {
                filter: value
                    .log
                    .filter
                    .unwrap_or_else(|| LogConfig::default().filter),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct StripSection {
    preserve_whitespace: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct WatchSection {
    extensions: Option<Vec<String>>,
    debounce_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LogSection {
    filter: Option<String>,
}

/// Candidate config paths relative to `dir`, in lookup order.
pub fn candidate_paths(dir: &Path) -> Vec<PathBuf> {
    CONFIG_FILE_NAMES.iter().map(|name| dir.join(name)).collect()
}
