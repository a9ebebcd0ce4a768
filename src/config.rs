//! Configuration loading and management

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::hotkey::{BindingAllocator, BindingId, HotkeyBinding, KeyCombo, KeyParseError};

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "SHORTCUT_DAEMON_CONFIG";

/// What the daemon does when a binding fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Toggle the launcher
    Toggle,
    /// Stop listening and exit
    Quit,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Toggle => write!(f, "toggle"),
            Action::Quit => write!(f, "quit"),
        }
    }
}

/// One binding entry as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Optional fixed id; allocated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// Key combination such as `"Alt+R"`
    pub combo: String,
    pub action: Action,
}

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default = "default_bindings")]
    pub bindings: Vec<BindingConfig>,
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_bindings() -> Vec<BindingConfig> {
    vec![
        BindingConfig {
            id: Some(1),
            combo: "Alt+R".to_string(),
            action: Action::Toggle,
        },
        BindingConfig {
            id: Some(2),
            combo: "Alt+Q".to_string(),
            action: Action::Quit,
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            bindings: default_bindings(),
        }
    }
}

/// A binding resolved from configuration, with its action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedBinding {
    pub binding: HotkeyBinding,
    pub action: Action,
}

/// Errors from loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("binding {index}: {source}")]
    Combo {
        index: usize,
        source: KeyParseError,
    },

    #[error("binding {index}: id must be a positive integer")]
    ZeroId { index: usize },

    #[error("binding {index}: id {id} is used more than once")]
    DuplicateId { index: usize, id: u32 },

    #[error("binding {index}: only one quit binding is allowed")]
    MultipleQuit { index: usize },

    #[error("ran out of binding ids")]
    IdsExhausted,
}

impl Config {
    /// Load configuration from the environment, a config file, or defaults
    ///
    /// `SHORTCUT_DAEMON_CONFIG` wins if set; otherwise
    /// `$HOME/.config/shortcut-daemon/config.json` is used when present.
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Default config file location under the user's home directory
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("shortcut-daemon")
                .join("config.json"),
        )
    }

    /// Read and parse a JSON config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Validate the binding list and assign ids to entries without one
    pub fn resolve_bindings(&self) -> Result<Vec<ResolvedBinding>, ConfigError> {
        let mut allocator = BindingAllocator::new();
        for (index, entry) in self.bindings.iter().enumerate() {
            if let Some(raw) = entry.id {
                let id = BindingId::new(raw).ok_or(ConfigError::ZeroId { index })?;
                if !allocator.reserve(id) {
                    return Err(ConfigError::DuplicateId { index, id: raw });
                }
            }
        }

        let mut quit_seen = false;
        let mut resolved = Vec::with_capacity(self.bindings.len());
        for (index, entry) in self.bindings.iter().enumerate() {
            let combo: KeyCombo = entry
                .combo
                .parse()
                .map_err(|source| ConfigError::Combo { index, source })?;

            if entry.action == Action::Quit {
                if quit_seen {
                    return Err(ConfigError::MultipleQuit { index });
                }
                quit_seen = true;
            }

            let id = match entry.id.and_then(BindingId::new) {
                Some(id) => id,
                None => allocator.allocate().ok_or(ConfigError::IdsExhausted)?,
            };

            resolved.push(ResolvedBinding {
                binding: HotkeyBinding::from_combo(id, combo),
                action: entry.action,
            });
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::{KeyCode, Modifiers};

    fn parse(json: &str) -> Config {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_default_bindings() {
        let resolved = Config::default().resolve_bindings().unwrap();
        assert_eq!(resolved.len(), 2);

        assert_eq!(resolved[0].binding.id().get(), 1);
        assert_eq!(resolved[0].binding.modifiers(), Modifiers::ALT);
        assert_eq!(resolved[0].binding.key(), KeyCode::from_char('R').unwrap());
        assert_eq!(resolved[0].action, Action::Toggle);

        assert_eq!(resolved[1].binding.id().get(), 2);
        assert_eq!(resolved[1].action, Action::Quit);
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = parse("{}");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_ids_allocated_around_fixed_ones() {
        let config = parse(
            r#"{"bindings":[
                {"combo":"Ctrl+Alt+B","action":"toggle"},
                {"id":1,"combo":"Ctrl+Alt+Q","action":"quit"},
                {"combo":"Ctrl+Alt+F1","action":"toggle"}
            ]}"#,
        );
        let ids: Vec<u32> = config
            .resolve_bindings()
            .unwrap()
            .iter()
            .map(|r| r.binding.id().get())
            .collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_zero_id_rejected() {
        let config = parse(r#"{"bindings":[{"id":0,"combo":"Alt+R","action":"toggle"}]}"#);
        assert!(matches!(
            config.resolve_bindings(),
            Err(ConfigError::ZeroId { index: 0 })
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let config = parse(
            r#"{"bindings":[
                {"id":4,"combo":"Alt+R","action":"toggle"},
                {"id":4,"combo":"Alt+Q","action":"quit"}
            ]}"#,
        );
        assert!(matches!(
            config.resolve_bindings(),
            Err(ConfigError::DuplicateId { index: 1, id: 4 })
        ));
    }

    #[test]
    fn test_two_quit_bindings_rejected() {
        let config = parse(
            r#"{"bindings":[
                {"combo":"Alt+Q","action":"quit"},
                {"combo":"Alt+X","action":"quit"}
            ]}"#,
        );
        assert!(matches!(
            config.resolve_bindings(),
            Err(ConfigError::MultipleQuit { index: 1 })
        ));
    }

    #[test]
    fn test_bad_combo_reported_with_index() {
        let config = parse(r#"{"bindings":[{"combo":"Hyper+R","action":"toggle"}]}"#);
        let err = config.resolve_bindings().unwrap_err();
        assert!(err.to_string().starts_with("binding 0:"));
    }

    #[test]
    fn test_missing_file_error() {
        let err = Config::from_file(Path::new("/nonexistent/shortcut-daemon.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_default_path_under_config_dir() {
        if let Some(path) = Config::default_path() {
            assert!(path.ends_with(".config/shortcut-daemon/config.json"));
        }
    }
}
