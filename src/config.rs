//! Application-level configuration loading, including the dartboard projection.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::scoring::{BoardGeometry, segment::BoardRadii};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "DART_SCORE_BACK_CONFIG_PATH";
/// Buffered row-change events per subscriber before slow receivers start lagging.
const DEFAULT_CHANGE_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Projection used to resolve coordinate hits.
    pub board: BoardGeometry,
    /// Capacity of the row-change broadcast channel.
    pub change_feed_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        capacity = app_config.change_feed_capacity,
                        "loaded configuration"
                    );
                    app_config
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

    /// Parse a JSON document; absent sections keep their defaults.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            board: BoardGeometry::default(),
            change_feed_capacity: DEFAULT_CHANGE_FEED_CAPACITY,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    board: Option<RawBoard>,
    change_feed_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
/// Board projection as written in the configuration file.
struct RawBoard {
    center_x: f64,
    center_y: f64,
    #[serde(default)]
    radii: Option<BoardRadii>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        let board = value
            .board
            .map(|raw| BoardGeometry {
                center_x: raw.center_x,
                center_y: raw.center_y,
                radii: raw.radii.unwrap_or_default(),
            })
            .unwrap_or(defaults.board);
        let change_feed_capacity = value
            .change_feed_capacity
            .filter(|capacity| *capacity > 0)
            .unwrap_or(defaults.change_feed_capacity);

        Self {
            board,
            change_feed_capacity,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_keeps_defaults() {
        let config = AppConfig::from_json("{}").expect("valid json");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn board_section_overrides_centre_and_keeps_default_radii() {
        let config = AppConfig::from_json(
            r#"{"board": {"center_x": 250.0, "center_y": 260.0}, "change_feed_capacity": 8}"#,
        )
        .expect("valid json");

        assert_eq!(config.board.center_x, 250.0);
        assert_eq!(config.board.center_y, 260.0);
        assert_eq!(config.board.radii, BoardRadii::default());
        assert_eq!(config.change_feed_capacity, 8);
    }

    #[test]
    fn zero_capacity_falls_back_to_default() {
        let config = AppConfig::from_json(r#"{"change_feed_capacity": 0}"#).expect("valid json");
        assert_eq!(config.change_feed_capacity, DEFAULT_CHANGE_FEED_CAPACITY);
    }
}
