// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a mistyped key is
//! reported at startup instead of silently falling back to a default.

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// HTTP/WebSocket listener settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Message engine settings.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind. `0` picks a free port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Answer CORS preflights for any origin.
    #[serde(default = "default_cors_permissive")]
    pub cors_permissive: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_permissive: default_cors_permissive(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_permissive() -> bool {
    true
}

/// Message engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    /// Commands the processor mailbox holds before callers wait.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Largest accepted chat message content, in bytes.
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: usize,

    /// Frames a connection may have unread before it is dropped with 1008.
    #[serde(default = "default_max_pending_frames")]
    pub max_pending_frames: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            max_content_bytes: default_max_content_bytes(),
            max_pending_frames: default_max_pending_frames(),
        }
    }
}

fn default_mailbox_capacity() -> usize {
    1024
}

fn default_max_content_bytes() -> usize {
    64 * 1024
}

fn default_max_pending_frames() -> usize {
    1024
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Level for courier crates (trace, debug, info, warn, error).
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CourierConfig {
    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_unknown_fields_on_sections() {
        let result: Result<GatewayConfig, _> = toml::from_str("hots = \"0.0.0.0\"");
        assert!(result.is_err());
    }

    #[test]
    fn rendered_defaults_parse_back() {
        let rendered = CourierConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[gateway]"));
        let parsed: CourierConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.gateway.port, 8080);
        assert_eq!(parsed.engine.max_content_bytes, 64 * 1024);
    }
}
