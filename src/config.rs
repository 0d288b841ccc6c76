use crate::due::DueMode;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Use this todo file instead of searching for a project or global one.
    pub data_file: Option<PathBuf>,
    /// `tracing` filter directive, overridden by `RUST_LOG`.
    pub log_filter: String,
    /// Granularity of the due badge in the task list.
    pub due_mode: DueMode,
    /// Start the task pane on the Done tab.
    pub show_done: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_file: None,
            log_filter: "info".into(),
            due_mode: DueMode::Days,
            show_done: false,
        }
    }
}

impl Config {
    /// Loads `explicit` if given (it must exist), otherwise the platform
    /// config file if present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Config::default()),
            },
        };
        let raw = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        Config::parse(&raw).with_context(|| format!("parsing {:?}", path))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "todos").map(|dirs| dirs.config_dir().join("config.toml"))
}

pub fn log_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "todos").map(|dirs| dirs.data_dir().join("logs"))
}
