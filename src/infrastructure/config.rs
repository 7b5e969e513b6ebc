//! Effective configuration assembly: builtin defaults, then the first config
//! file found, then environment variables. Builder and per-request options
//! layer on top of the result.

use crate::application::services::ClientConfig;
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// On-disk configuration shape; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub base_url: Option<String>,
    /// Seconds; fractions allowed.
    pub timeout: Option<f64>,
    pub default_headers: IndexMap<String, String>,
    pub verbose: Option<bool>,
}

pub fn load() -> ClientConfig {
    let mut config = ClientConfig::default();
    if let Some(file) = read_first_config() {
        apply_file(&mut config, file);
    }
    apply_env(&mut config);
    config
}

fn config_paths() -> Vec<PathBuf> {
    let Ok(home) = std::env::var("HOME") else {
        return Vec::new();
    };
    vec![
        PathBuf::from(&home).join(".config/qurl/config.json"),
        PathBuf::from(&home).join(".qurl.json"),
    ]
}

fn read_first_config() -> Option<FileConfig> {
    for path in config_paths() {
        let Ok(text) = std::fs::read_to_string(&path) else {
            continue;
        };
        match serde_json::from_str(&text) {
            Ok(file) => {
                debug!("loaded config from {}", path.display());
                return Some(file);
            }
            Err(err) => debug!("ignoring malformed config {}: {err}", path.display()),
        }
    }
    None
}

fn apply_file(config: &mut ClientConfig, file: FileConfig) {
    if file.base_url.is_some() {
        config.base_url = file.base_url;
    }
    if let Some(timeout) = parse_timeout_secs(file.timeout) {
        config.timeout = Some(timeout);
    }
    for (name, value) in file.default_headers {
        config.default_headers.insert(name, value);
    }
    if let Some(verbose) = file.verbose {
        config.verbose = verbose;
    }
}

fn apply_env(config: &mut ClientConfig) {
    if let Ok(url) = std::env::var("QURL_BASE_URL") {
        if !url.is_empty() {
            config.base_url = Some(url);
        }
    }
    if let Ok(raw) = std::env::var("QURL_TIMEOUT") {
        if let Some(timeout) = parse_timeout_secs(raw.parse().ok()) {
            config.timeout = Some(timeout);
        }
    }
    if let Ok(raw) = std::env::var("QURL_VERBOSE") {
        config.verbose = matches!(raw.as_str(), "1" | "true" | "yes");
    }
}

fn parse_timeout_secs(secs: Option<f64>) -> Option<Duration> {
    let secs = secs?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}
