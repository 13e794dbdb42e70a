//! Server configuration, loaded from `pinpoint.toml`.

use std::net::SocketAddr;

use pinpoint_room::{MIN_CAPACITY, RoomConfig};
use serde::Deserialize;

use crate::error::ConfigError;

/// Config file read when `PINPOINT_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "pinpoint.toml";

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Capacity of the game service's command queue.
    pub command_buffer: usize,
    pub rooms: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3001".to_string(),
            command_buffer: 256,
            rooms: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads the config file if it exists, applies environment overrides,
    /// and validates the result.
    ///
    /// The file path comes from `PINPOINT_CONFIG`, falling back to
    /// [`DEFAULT_CONFIG_PATH`]. A missing file means defaults; an
    /// unreadable or malformed one is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("PINPOINT_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg = Self::from_toml(&content)?;
                tracing::info!(%path, "loaded configuration");
                cfg
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(%path, "no config file found, using defaults");
                Self::default()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Applies `PINPOINT_*` overrides. `lookup` returns a variable's
    /// value; empty values are ignored.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(addr) = get("PINPOINT_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(value) = get("PINPOINT_MAX_PLAYERS") {
            self.rooms.max_players = parse_env("PINPOINT_MAX_PLAYERS", value)?;
        }
        if let Some(value) = get("PINPOINT_NEW_ROUND_DELAY_MS") {
            self.rooms.new_round_delay_ms =
                parse_env("PINPOINT_NEW_ROUND_DELAY_MS", value)?;
        }
        Ok(())
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "listen_addr {:?} is not a valid socket address",
                self.listen_addr
            )));
        }
        if self.command_buffer == 0 {
            return Err(ConfigError::Invalid(
                "command_buffer must be > 0".into(),
            ));
        }
        if self.rooms.max_players < MIN_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "rooms.max_players must be at least {MIN_CAPACITY}"
            )));
        }
        if self.rooms.new_round_delay_ms > 60_000 {
            tracing::warn!(
                delay_ms = self.rooms.new_round_delay_ms,
                "new round delay is over a minute"
            );
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(
    var: &'static str,
    value: String,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn test_default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:3001");
        assert_eq!(cfg.command_buffer, 256);
        assert_eq!(cfg.rooms, RoomConfig::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let cfg = ServerConfig::from_toml(
            r#"
listen_addr = "127.0.0.1:9090"

[rooms]
new_round_delay_ms = 500
"#,
        )
        .unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9090");
        assert_eq!(cfg.command_buffer, 256);
        assert_eq!(cfg.rooms.new_round_delay_ms, 500);
        assert_eq!(cfg.rooms.max_players, 6);
    }

    #[test]
    fn test_parse_error() {
        let err = ServerConfig::from_toml("listen_addr = 42").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = ServerConfig::default();
        cfg.apply_overrides(env(&[
            ("PINPOINT_LISTEN_ADDR", "127.0.0.1:4000"),
            ("PINPOINT_MAX_PLAYERS", "2"),
            ("PINPOINT_NEW_ROUND_DELAY_MS", " 0 "),
        ]))
        .unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:4000");
        assert_eq!(cfg.rooms.max_players, 2);
        assert_eq!(cfg.rooms.new_round_delay_ms, 0);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut cfg = ServerConfig::default();
        cfg.apply_overrides(env(&[("PINPOINT_LISTEN_ADDR", "")]))
            .unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:3001");
    }

    #[test]
    fn test_bad_env_number_is_rejected() {
        let mut cfg = ServerConfig::default();
        let err = cfg
            .apply_overrides(env(&[("PINPOINT_MAX_PLAYERS", "six")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Env {
                var: "PINPOINT_MAX_PLAYERS",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_addr = ServerConfig {
            listen_addr: "not an address".into(),
            ..ServerConfig::default()
        };
        assert!(bad_addr.validate().is_err());

        let no_buffer = ServerConfig {
            command_buffer: 0,
            ..ServerConfig::default()
        };
        assert!(no_buffer.validate().is_err());

        let solo = ServerConfig {
            rooms: RoomConfig {
                max_players: 1,
                ..RoomConfig::default()
            },
            ..ServerConfig::default()
        };
        assert!(matches!(solo.validate(), Err(ConfigError::Invalid(_))));
    }
}
