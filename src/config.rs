//! Server configuration from the environment

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_TYPING_DELAY_MS: u64 = 750;

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantConfig {
    pub port: u16,
    /// Session store location
    pub db_path: PathBuf,
    pub typing_delay: Duration,
    /// Whether the page may be asked for the device position
    pub geolocation: bool,
}

impl AssistantConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = var("FRACTURE_ASSIST_SESSION_DB").map_or_else(
            || {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.fracture-assistant/session.db"))
            },
            PathBuf::from,
        );

        let port = var("FRACTURE_ASSIST_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let typing_delay_ms = var("FRACTURE_ASSIST_TYPING_DELAY_MS")
            .and_then(|ms| ms.parse().ok())
            .unwrap_or(DEFAULT_TYPING_DELAY_MS);

        let geolocation = var("FRACTURE_ASSIST_GEOLOCATION").is_none_or(|v| {
            !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "off")
        });

        Self {
            port,
            db_path,
            typing_delay: Duration::from_millis(typing_delay_ms),
            geolocation,
        }
    }
}
