// SPDX-License-Identifier: Apache-2.0 OR MIT

//! FNE server configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// FNE server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// UDP port to listen on (default: 62031, matching the reference FNE)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Repeater login password, SHA-256-hashed against a per-session salt.
    #[serde(default)]
    pub password: String,

    /// Ping interval in milliseconds; also the maintenance tick period.
    #[serde(default = "default_ping_time_ms")]
    pub ping_time_ms: u64,

    /// Missed pings tolerated before a peer is forcibly destroyed.
    #[serde(default = "default_max_missed_pings")]
    pub max_missed_pings: u32,

    /// Voice/data grant hang time in milliseconds.
    #[serde(default = "default_hang_time_ms")]
    pub hang_time_ms: u64,

    /// Maximum number of simultaneously connected peers.
    #[serde(default = "default_max_peers")]
    pub max_peers: usize,

    /// Per-peer bounded outgoing queue depth.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// `m_verifyReg`: require destination registration before granting.
    #[serde(default)]
    pub verify_reg: bool,

    /// `m_verifyAff`: require destination affiliation before granting.
    #[serde(default)]
    pub verify_aff: bool,

    /// `m_disableGrantSrcIdCheck`: skip the source-ID match on grant retry.
    #[serde(default)]
    pub disable_grant_src_id_check: bool,

    /// Authoritative mode: when `true`, the router is the sole arbiter of
    /// grant state and rejects any traffic it cannot itself validate; when
    /// `false`, an external collaborator (REST caller) is trusted to permit
    /// traffic the router would otherwise deny. Ambiguous states (a
    /// non-authoritative router asked to decide without an external
    /// opinion) always fail closed — see `DESIGN.md`.
    #[serde(default = "default_true")]
    pub authoritative: bool,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    62031
}

fn default_ping_time_ms() -> u64 {
    5_000
}

fn default_max_missed_pings() -> u32 {
    5
}

fn default_hang_time_ms() -> u64 {
    15_000
}

fn default_max_peers() -> usize {
    500
}

fn default_queue_depth() -> usize {
    256
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            password: String::new(),
            ping_time_ms: default_ping_time_ms(),
            max_missed_pings: default_max_missed_pings(),
            hang_time_ms: default_hang_time_ms(),
            max_peers: default_max_peers(),
            queue_depth: default_queue_depth(),
            verify_reg: false,
            verify_aff: false,
            disable_grant_src_id_check: false,
            authoritative: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a YAML file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] or [`ConfigError::Serialize`].
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    #[must_use]
    pub fn ping_time(&self) -> Duration {
        Duration::from_millis(self.ping_time_ms)
    }

    #[must_use]
    pub fn hang_time(&self) -> Duration {
        Duration::from_millis(self.hang_time_ms)
    }

    /// Validate configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] when a field fails range
    /// checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("port cannot be 0".into()));
        }
        if self.ping_time_ms == 0 {
            return Err(ConfigError::InvalidValue("ping_time_ms cannot be 0".into()));
        }
        if self.max_missed_pings == 0 {
            return Err(ConfigError::InvalidValue("max_missed_pings cannot be 0".into()));
        }
        if self.max_peers == 0 {
            return Err(ConfigError::InvalidValue("max_peers cannot be 0".into()));
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::InvalidValue("queue_depth cannot be 0".into()));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
}
