//! Application-level configuration loading for the match runtime.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the binary looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SHAPE_DUEL_CONFIG_PATH";

/// Rounds per game when the configuration does not say otherwise.
const DEFAULT_MAX_ROUNDS: u32 = 3;
/// Countdown length in seconds when the configuration does not say otherwise.
const DEFAULT_COUNTDOWN_SECONDS: u32 = 3;
/// TCP port when the configuration does not say otherwise.
const DEFAULT_PORT: u16 = 1337;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Rounds per game.
    pub max_rounds: u32,
    /// Seconds on the pre-round countdown.
    pub countdown_seconds: u32,
    /// TCP port the host listens on and the joiner connects to.
    pub port: u16,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    ///
    /// A missing file is normal (defaults apply); an unreadable or
    /// unparseable file is reported and also falls back to defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), ?config, "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            countdown_seconds: DEFAULT_COUNTDOWN_SECONDS,
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file; every field is optional
/// and falls back to its built-in default individually.
struct RawConfig {
    max_rounds: Option<u32>,
    countdown_seconds: Option<u32>,
    port: Option<u16>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            max_rounds: value.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS),
            countdown_seconds: value
                .countdown_seconds
                .unwrap_or(DEFAULT_COUNTDOWN_SECONDS),
            port: value.port.unwrap_or(DEFAULT_PORT),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
