use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gallery::gesture::DEFAULT_THRESHOLD;
use crate::inbox::DEFAULT_DEADLINE;

/// Overrides `data_dir` from the config file.
pub const DATA_DIR_ENV: &str = "MAILROOM_DATA_DIR";
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 366;

#[derive(Debug, Default, Serialize, Deserialize)]
/// Persisted UI/application settings for Mailroom.
pub struct AppConfig {
    pub window_width: Option<f32>,
    pub window_height: Option<f32>,
    pub data_dir: Option<PathBuf>,
    pub long_press_ms: Option<u64>,
    pub default_deadline: Option<String>,
    #[serde(default)]
    pub admin_emails: Vec<String>,
    pub token_ttl_hours: Option<i64>,
    pub last_email: Option<String>,
}

impl AppConfig {
    /// Returns the user config file path, if a config directory is available.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("mailroom").join("config.toml"))
    }

    /// Loads config from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Self {
        toml::from_str(contents).unwrap_or_default()
    }

    /// Writes config to disk, ignoring filesystem/serialization errors.
    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(s) = toml::to_string_pretty(self) {
            let _ = std::fs::write(&path, s);
        }
    }

    /// Where accounts, inboxes and photos live.
    pub fn data_dir(&self) -> PathBuf {
        self.resolve_data_dir(std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
    }

    fn resolve_data_dir(&self, env_override: Option<PathBuf>) -> PathBuf {
        env_override
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| self.data_dir.clone())
            .or_else(|| dirs::data_dir().map(|d| d.join("mailroom")))
            .unwrap_or_else(|| PathBuf::from("mailroom-data"))
    }

    pub fn cache_dir(&self) -> PathBuf {
        dirs::cache_dir()
            .map(|d| d.join("mailroom").join("thumbs"))
            .unwrap_or_else(|| self.data_dir().join("thumbs"))
    }

    pub fn long_press(&self) -> Duration {
        self.long_press_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_THRESHOLD)
    }

    pub fn default_deadline(&self) -> &str {
        self.default_deadline.as_deref().unwrap_or(DEFAULT_DEADLINE)
    }

    /// Configured token lifetime, or the default when unset or outside
    /// `1..=MAX_TOKEN_TTL_HOURS`.
    pub fn token_ttl_hours(&self) -> i64 {
        self.token_ttl_hours
            .filter(|h| (1..=MAX_TOKEN_TTL_HOURS).contains(h))
            .unwrap_or(DEFAULT_TOKEN_TTL_HOURS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = AppConfig::parse("");
        assert_eq!(config.long_press(), Duration::from_millis(500));
        assert_eq!(config.default_deadline(), "26.04.09");
        assert_eq!(config.token_ttl_hours(), 24);
        assert!(config.admin_emails.is_empty());
    }

    #[test]
    fn fields_are_read_from_toml() {
        let config = AppConfig::parse(
            r#"
long_press_ms = 750
default_deadline = "26.12.31"
admin_emails = ["ops@example.com"]
data_dir = "/srv/mailroom"
"#,
        );
        assert_eq!(config.long_press(), Duration::from_millis(750));
        assert_eq!(config.default_deadline(), "26.12.31");
        assert_eq!(config.admin_emails, vec!["ops@example.com"]);
        assert_eq!(config.resolve_data_dir(None), PathBuf::from("/srv/mailroom"));
    }

    #[test]
    fn out_of_range_token_ttl_uses_default() {
        let config = AppConfig::parse("token_ttl_hours = 10000000000");
        assert_eq!(config.token_ttl_hours(), DEFAULT_TOKEN_TTL_HOURS);
        let config = AppConfig::parse("token_ttl_hours = 0");
        assert_eq!(config.token_ttl_hours(), DEFAULT_TOKEN_TTL_HOURS);
        let config = AppConfig::parse("token_ttl_hours = 168");
        assert_eq!(config.token_ttl_hours(), 168);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let config = AppConfig::parse("long_press_ms = \"soon\"");
        assert_eq!(config.long_press_ms, None);
    }

    #[test]
    fn environment_overrides_configured_data_dir() {
        let config = AppConfig {
            data_dir: Some(PathBuf::from("/srv/mailroom")),
            ..AppConfig::default()
        };
        assert_eq!(
            config.resolve_data_dir(Some(PathBuf::from("/tmp/override"))),
            PathBuf::from("/tmp/override")
        );
        assert_eq!(
            config.resolve_data_dir(Some(PathBuf::new())),
            PathBuf::from("/srv/mailroom")
        );
    }
}
