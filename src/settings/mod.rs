use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub mod store;

pub const OPENAI_KEY: &str = "openai_key";
pub const SYSTEM_PROMPT: &str = "system_prompt";
pub const USER_PROMPT: &str = "user_prompt";
pub const LIST_NAME: &str = "list_name";
pub const UI_MODE: &str = "ui_mode";
pub const CSV_DATA: &str = "csv_data";
pub const TEMPLATE_DATA: &str = "template_data";
pub const FEATURE_TOGGLES: &str = "feature_toggles";
pub const API_BASE: &str = "api_base";
pub const MODEL: &str = "model";

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("settings file {path} is not valid json: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: Option<String>);

    fn flush(&mut self) -> Result<(), SettingsError> {
        Ok(())
    }

    fn get_or_default(&self, key: &str) -> String {
        self.get(key).unwrap_or_default()
    }

    /// Empty strings are stored as a missing key.
    fn set_text(&mut self, key: &str, value: &str) {
        let value = (!value.is_empty()).then(|| value.to_string());
        self.set(key, value);
    }

    fn load_json<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Default,
        Self: Sized,
    {
        let Some(raw) = self.get(key) else {
            return T::default();
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "ignoring unreadable setting");
                T::default()
            }
        }
    }

    fn save_json<T>(&mut self, key: &str, value: &T)
    where
        T: Serialize,
        Self: Sized,
    {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, Some(raw)),
            Err(err) => warn!(key, error = %err, "failed to serialize setting"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Table,
    Template,
    Settings,
}

impl ViewMode {
    pub const ALL: [ViewMode; 3] = [ViewMode::Table, ViewMode::Template, ViewMode::Settings];

    pub fn label(self) -> &'static str {
        match self {
            Self::Table => "Table",
            Self::Template => "Template",
            Self::Settings => "Settings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    pub paste_submit: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self { paste_submit: true }
    }
}

pub fn api_key(store: &impl SettingsStore) -> Option<String> {
    store
        .get(OPENAI_KEY)
        .filter(|key| !key.trim().is_empty())
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .filter(|key| !key.trim().is_empty())
}
