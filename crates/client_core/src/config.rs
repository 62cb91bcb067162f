use std::{collections::HashMap, fs, time::Duration};

use tracing::warn;
use url::Url;

use crate::error::ConfigError;

pub const SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub default_page_size: u32,
    pub page_size_options: Vec<u32>,
    pub candidate_page_size: u32,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".into(),
            default_page_size: 5,
            page_size_options: vec![5, 10, 20],
            candidate_page_size: 100,
            request_timeout_secs: 30,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match Url::parse(&self.api_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::InvalidBaseUrl(self.api_base_url.clone())),
        }
        if self.default_page_size == 0 {
            return Err(ConfigError::ZeroPageSize("default_page_size"));
        }
        if self.candidate_page_size == 0 {
            return Err(ConfigError::ZeroPageSize("candidate_page_size"));
        }
        Ok(())
    }
}

/// Defaults, then `client.toml` in the working directory, then environment.
pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file(&mut settings, &raw);
    }
    apply_overrides(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file(settings: &mut ClientSettings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, String>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!(file = SETTINGS_FILE, %err, "ignoring unreadable settings file");
            return;
        }
    };

    if let Some(v) = file_cfg.get("api_base_url") {
        settings.api_base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("default_page_size") {
        set_number(&mut settings.default_page_size, "default_page_size", v);
    }
    if let Some(v) = file_cfg.get("page_size_options") {
        if let Some(options) = parse_size_options(v) {
            settings.page_size_options = options;
        }
    }
    if let Some(v) = file_cfg.get("candidate_page_size") {
        set_number(&mut settings.candidate_page_size, "candidate_page_size", v);
    }
    if let Some(v) = file_cfg.get("request_timeout_secs") {
        set_number(&mut settings.request_timeout_secs, "request_timeout_secs", v);
    }
}

fn apply_overrides(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__DEFAULT_PAGE_SIZE") {
        set_number(&mut settings.default_page_size, "APP__DEFAULT_PAGE_SIZE", &v);
    }
    if let Some(v) = lookup("APP__CANDIDATE_PAGE_SIZE") {
        set_number(&mut settings.candidate_page_size, "APP__CANDIDATE_PAGE_SIZE", &v);
    }
    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        set_number(&mut settings.request_timeout_secs, "APP__REQUEST_TIMEOUT_SECS", &v);
    }
}

fn set_number<T: std::str::FromStr>(slot: &mut T, key: &str, raw: &str) {
    match raw.trim().parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!(key, value = raw, "ignoring non-numeric setting"),
    }
}

fn parse_size_options(raw: &str) -> Option<Vec<u32>> {
    let options = raw
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    if options.is_empty() || options.contains(&0) {
        return None;
    }
    Some(options)
}
