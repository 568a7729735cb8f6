//! Application-level configuration loading: player limits, phase timers and the word categories.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use tracing::{info, warn};

use crate::state::state_machine::OPTION_COUNT;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SKETCH_RELAY_CONFIG_PATH";

const DEFAULT_MIN_PLAYERS: usize = 3;
const DEFAULT_MAX_PLAYERS: usize = 8;
const DEFAULT_DRAWING_TIME_SECS: u64 = 120;
const DEFAULT_GUESSING_TIME_SECS: u64 = 30;
const DEFAULT_SESSION_ROOT: &str = "drawingGame";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared by every hosted peer.
pub struct AppConfig {
    min_players: usize,
    max_players: usize,
    drawing_time: Duration,
    guessing_time: Duration,
    session_root: String,
    categories: IndexMap<String, Vec<String>>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        min_players = app_config.min_players,
                        max_players = app_config.max_players,
                        categories = app_config.categories.len(),
                        "loaded session config"
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

    /// Valid roster size required for an active round.
    pub fn min_players(&self) -> usize {
        self.min_players
    }

    /// Roster size at which joins are rejected.
    pub fn max_players(&self) -> usize {
        self.max_players
    }

    /// Length of the drawing phase.
    pub fn drawing_time(&self) -> Duration {
        self.drawing_time
    }

    /// Length of the guessing phase.
    pub fn guessing_time(&self) -> Duration {
        self.guessing_time
    }

    /// Store path every session record lives under.
    pub fn session_root(&self) -> &str {
        &self.session_root
    }

    /// Word categories, each holding at least [`OPTION_COUNT`] distinct words.
    pub fn categories(&self) -> &IndexMap<String, Vec<String>> {
        &self.categories
    }

    /// Override player limits, mostly useful for tests.
    pub fn with_player_limits(mut self, min_players: usize, max_players: usize) -> Self {
        self.min_players = min_players.max(1);
        self.max_players = max_players.max(self.min_players);
        self
    }

    /// Override phase timers.
    pub fn with_timers(mut self, drawing_time: Duration, guessing_time: Duration) -> Self {
        self.drawing_time = drawing_time;
        self.guessing_time = guessing_time;
        self
    }

    /// Override the session root path.
    pub fn with_session_root(mut self, root: impl Into<String>) -> Self {
        self.session_root = root.into();
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            min_players: DEFAULT_MIN_PLAYERS,
            max_players: DEFAULT_MAX_PLAYERS,
            drawing_time: Duration::from_secs(DEFAULT_DRAWING_TIME_SECS),
            guessing_time: Duration::from_secs(DEFAULT_GUESSING_TIME_SECS),
            session_root: DEFAULT_SESSION_ROOT.to_string(),
            categories: default_categories(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    min_players: Option<usize>,
    max_players: Option<usize>,
    drawing_time_secs: Option<u64>,
    guessing_time_secs: Option<u64>,
    session_root: Option<String>,
    categories: Option<IndexMap<String, Vec<String>>>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();

        let min_players = value.min_players.unwrap_or(defaults.min_players);
        let max_players = value.max_players.unwrap_or(defaults.max_players);
        let (min_players, max_players) = if min_players == 0 || max_players < min_players {
            warn!(
                min_players,
                max_players, "inconsistent player limits; using defaults"
            );
            (defaults.min_players, defaults.max_players)
        } else {
            (min_players, max_players)
        };

        let categories = match value.categories {
            Some(raw) => {
                let categories = sanitize_categories(raw);
                if categories.is_empty() {
                    warn!("no usable word category in config; using built-in words");
                    defaults.categories
                } else {
                    categories
                }
            }
            None => defaults.categories,
        };

        Self {
            min_players,
            max_players,
            drawing_time: positive_secs(value.drawing_time_secs, defaults.drawing_time),
            guessing_time: positive_secs(value.guessing_time_secs, defaults.guessing_time),
            session_root: value
                .session_root
                .map(|root| root.trim_matches('/').to_string())
                .filter(|root| !root.is_empty() && !root.contains("//"))
                .unwrap_or(defaults.session_root),
            categories,
        }
    }
}

fn positive_secs(value: Option<u64>, fallback: Duration) -> Duration {
    match value {
        Some(0) => {
            warn!("phase timer of zero seconds ignored");
            fallback
        }
        Some(secs) => Duration::from_secs(secs),
        None => fallback,
    }
}

/// Drop blank and duplicate words, then every category too small to build the options from.
fn sanitize_categories(raw: IndexMap<String, Vec<String>>) -> IndexMap<String, Vec<String>> {
    raw.into_iter()
        .filter_map(|(name, words)| {
            let words: IndexSet<String> = words
                .into_iter()
                .map(|word| word.trim().to_string())
                .filter(|word| !word.is_empty())
                .collect();
            if words.len() < OPTION_COUNT {
                warn!(
                    category = %name,
                    words = words.len(),
                    "word category too small; dropping it"
                );
                return None;
            }
            Some((name, words.into_iter().collect()))
        })
        .collect()
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in word list shipped with the binary.
fn default_categories() -> IndexMap<String, Vec<String>> {
    [
        (
            "fruit",
            [
                "apple",
                "banana",
                "orange",
                "grape",
                "watermelon",
                "strawberry",
                "pineapple",
                "pear",
            ],
        ),
        (
            "animals",
            [
                "cat", "dog", "rabbit", "mouse", "elephant", "lion", "giraffe", "panda",
            ],
        ),
        (
            "objects",
            [
                "book", "computer", "phone", "glasses", "umbrella", "key", "wallet", "watch",
            ],
        ),
        (
            "nature",
            [
                "sun", "moon", "star", "cloud", "mountain", "sea", "tree", "flower",
            ],
        ),
    ]
    .into_iter()
    .map(|(category, words)| {
        (
            category.to_string(),
            words.into_iter().map(str::to_string).collect(),
        )
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_categories_are_dropped() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "min_players": 2,
                "categories": {
                    "tiny": ["a", "b", "c"],
                    "dupes": ["x", "x", "y", "z", " "],
                    "colors": ["red", "green", "blue", "yellow"]
                }
            }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.min_players(), 2);
        assert_eq!(config.max_players(), DEFAULT_MAX_PLAYERS);
        assert_eq!(
            config.categories().keys().collect::<Vec<_>>(),
            vec!["colors"]
        );
    }

    #[test]
    fn inconsistent_limits_fall_back_to_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"min_players": 5, "max_players": 2, "drawing_time_secs": 0}"#)
                .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.min_players(), DEFAULT_MIN_PLAYERS);
        assert_eq!(config.max_players(), DEFAULT_MAX_PLAYERS);
        assert_eq!(
            config.drawing_time(),
            Duration::from_secs(DEFAULT_DRAWING_TIME_SECS)
        );
        assert_eq!(config.session_root(), DEFAULT_SESSION_ROOT);
    }

    #[test]
    fn built_in_categories_are_usable() {
        let config = AppConfig::default();
        assert_eq!(config.categories().len(), 4);
        assert!(
            config
                .categories()
                .values()
                .all(|words| words.len() >= OPTION_COUNT)
        );
    }

    #[test]
    fn builders_override_single_settings() {
        let config = AppConfig::default()
            .with_player_limits(2, 4)
            .with_timers(Duration::from_secs(10), Duration::from_secs(5));
        assert_eq!((config.min_players(), config.max_players()), (2, 4));
        assert_eq!(config.drawing_time(), Duration::from_secs(10));
        assert_eq!(config.guessing_time(), Duration::from_secs(5));
        assert_eq!(config.session_root(), DEFAULT_SESSION_ROOT);
    }
}
