use std::{collections::HashMap, fs, path::Path};

use crate::controller::DEFAULT_MAX_LOGIN_ATTEMPTS;

pub const SETTINGS_FILE: &str = "todo.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub service_url: String,
    pub table_name: String,
    pub login_provider: String,
    pub max_login_attempts: u32,
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:8480".into(),
            table_name: "todoitem".into(),
            login_provider: "microsoftaccount".into(),
            max_login_attempts: DEFAULT_MAX_LOGIN_ATTEMPTS,
            request_timeout_secs: None,
        }
    }
}

pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the flat `key = "value"` file at `path`, then environment.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            apply(&mut settings, |key| {
                file_cfg.get(key).map(|value| match value {
                    toml::Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
            });
        }
    }

    if let Some(v) = env("TODO_SERVICE_URL") {
        settings.service_url = v;
    }
    apply(&mut settings, |key| {
        env(&format!("APP__{}", key.to_ascii_uppercase()))
    });

    settings
}

fn apply(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("service_url") {
        settings.service_url = v;
    }
    if let Some(v) = lookup("table_name") {
        settings.table_name = v;
    }
    if let Some(v) = lookup("login_provider") {
        settings.login_provider = v;
    }
    if let Some(v) = lookup("max_login_attempts") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.max_login_attempts = parsed.max(1);
        }
    }
    if let Some(v) = lookup("request_timeout_secs") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = Some(parsed);
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
