use std::path::Path;

use serde::Deserialize;

pub(crate) const CONFIG_FILE: &str = "chatsync_config.json";
const DEFAULT_HISTORY_AMOUNT: u32 = 50;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) history_amount: Option<u32>,
    // Whether mounting the DM view asks the backend for the user list.
    pub(crate) request_users_on_mount: Option<bool>,
    pub(crate) log_to_file: Option<bool>,
}

pub(crate) fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join(CONFIG_FILE);
    let Ok(bytes) = std::fs::read(&path) else {
        return AppConfig::default();
    };
    serde_json::from_slice::<AppConfig>(&bytes).unwrap_or_default()
}

impl AppConfig {
    pub(crate) fn history_amount(&self) -> u32 {
        let from_env = std::env::var("CHATSYNC_HISTORY_AMOUNT")
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok());
        from_env
            .or(self.history_amount)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_HISTORY_AMOUNT)
    }

    pub(crate) fn request_users_on_mount(&self) -> bool {
        self.request_users_on_mount.unwrap_or(true)
    }

    pub(crate) fn log_to_file(&self) -> bool {
        self.log_to_file.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_app_config(dir.path().to_str().unwrap());
        assert!(cfg.history_amount.is_none());
        assert!(cfg.request_users_on_mount());
        assert!(cfg.log_to_file());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"history_amount": 20, "request_users_on_mount": false, "unknown_key": 1}"#,
        )
        .unwrap();
        let cfg = load_app_config(dir.path().to_str().unwrap());
        assert_eq!(cfg.history_amount, Some(20));
        assert!(!cfg.request_users_on_mount());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), b"{not json").unwrap();
        let cfg = load_app_config(dir.path().to_str().unwrap());
        assert!(cfg.history_amount.is_none());
    }

    #[test]
    fn zero_history_amount_is_rejected() {
        let cfg = AppConfig {
            history_amount: Some(0),
            ..AppConfig::default()
        };
        // Env override is not set in tests; zero falls back to the default.
        if std::env::var("CHATSYNC_HISTORY_AMOUNT").is_err() {
            assert_eq!(cfg.history_amount(), DEFAULT_HISTORY_AMOUNT);
        }
    }
}
