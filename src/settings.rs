use crate::openai::AiError;
use anyhow::Result;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{info, instrument};

pub const BASE_URL: &str = "BASE_URL";
pub const API_KEY: &str = "API_KEY";
pub const MODEL: &str = "MODEL";

/// Keys the chat adapter reads on every call.
pub const AI_SETTING_KEYS: [&str; 3] = [BASE_URL, API_KEY, MODEL];

/// Key/value lookup the chat adapter reads its endpoint configuration from.
///
/// Values are looked up on every call, so changes take effect without a
/// restart.
pub trait SettingsProvider: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
}

/// Settings persisted in the `settings` table.
pub struct SqliteSettingsStore {
    pool: Pool<SqliteConnectionManager>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: i64,
}

impl SqliteSettingsStore {
    pub fn new(pool: Pool<SqliteConnectionManager>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, value))]
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp()],
        )?;
        info!("Stored setting {}", key);
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<Setting>> {
        let conn = self.pool.get()?;
        let setting = conn
            .query_row(
                "SELECT key, value, updated_at FROM settings WHERE key = ?",
                [key],
                |row| {
                    Ok(Setting {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(setting)
    }
}

impl SettingsProvider for SqliteSettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_setting(key)?.map(|setting| setting.value))
    }
}

/// In-memory settings, for tests and for embedding the adapter without a
/// database.
#[derive(Default)]
pub struct StaticSettings {
    values: RwLock<HashMap<String, String>>,
}

impl StaticSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value.to_string());
    }
}

impl SettingsProvider for StaticSettings {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(values.get(key).cloned())
    }
}

/// The three values one chat call needs, read together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: Option<String>,
}

impl AiSettings {
    /// Read the current values. Blank values count as missing; a missing
    /// model is allowed and leaves the choice to the backend.
    pub fn load(provider: &dyn SettingsProvider) -> Result<Self, AiError> {
        let read = |key: &str| -> Result<Option<String>, AiError> {
            let value = provider
                .get(key)
                .map_err(|e| AiError::Settings(format!("{}: {}", key, e)))?;
            Ok(value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()))
        };

        let base_url = read(BASE_URL)?
            .ok_or_else(|| AiError::MissingSetting(BASE_URL.to_string()))?;
        let api_key = read(API_KEY)?
            .ok_or_else(|| AiError::MissingSetting(API_KEY.to_string()))?;
        let model = read(MODEL)?;

        Ok(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Show only the last four characters of a secret.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppState;
    use pretty_assertions::assert_eq;

    #[test]
    fn sqlite_store_round_trips_and_overwrites() -> Result<()> {
        let state = AppState::new_for_testing();
        let store = SqliteSettingsStore::new(state.db.clone());

        assert_eq!(store.get(MODEL)?, None);
        store.set(MODEL, "gpt-4")?;
        assert_eq!(store.get(MODEL)?, Some("gpt-4".to_string()));
        store.set(MODEL, "o3-mini")?;
        assert_eq!(store.get(MODEL)?, Some("o3-mini".to_string()));
        Ok(())
    }

    #[test]
    fn load_reads_all_three_values() {
        let settings = StaticSettings::new()
            .with(BASE_URL, " https://api.example.com/v1 ")
            .with(API_KEY, "sk-test")
            .with(MODEL, "gpt-4");
        let loaded = AiSettings::load(&settings).unwrap();
        assert_eq!(
            loaded,
            AiSettings {
                base_url: "https://api.example.com/v1".to_string(),
                api_key: "sk-test".to_string(),
                model: Some("gpt-4".to_string()),
            }
        );
    }

    #[test]
    fn load_requires_base_url_and_key() {
        let settings = StaticSettings::new().with(API_KEY, "sk-test");
        assert_eq!(
            AiSettings::load(&settings).unwrap_err(),
            AiError::MissingSetting(BASE_URL.to_string())
        );

        let settings = StaticSettings::new()
            .with(BASE_URL, "https://api.example.com")
            .with(API_KEY, "   ");
        assert_eq!(
            AiSettings::load(&settings).unwrap_err(),
            AiError::MissingSetting(API_KEY.to_string())
        );
    }

    #[test]
    fn blank_model_is_none() {
        let settings = StaticSettings::new()
            .with(BASE_URL, "https://api.example.com")
            .with(API_KEY, "sk-test")
            .with(MODEL, "");
        assert_eq!(AiSettings::load(&settings).unwrap().model, None);
    }

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask_secret("sk-abcdef1234"), "*********1234");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret(""), "");
    }
}
