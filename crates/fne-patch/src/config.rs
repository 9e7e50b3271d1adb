// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Patch engine configuration (spec.md §4.7, scenario S4).

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for one patch: a source TG crossed onto a destination TG,
/// each side optionally carrying its own traffic encryption key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchConfig {
    pub src_tgid: u32,
    #[serde(default)]
    pub src_slot: u8,
    pub dst_tgid: u32,
    #[serde(default)]
    pub dst_slot: u8,

    /// Source-side TEK, if the source call is encrypted.
    #[serde(default)]
    pub src_key: Option<KeyConfig>,
    /// Destination-side TEK, if re-encryption is required.
    #[serde(default)]
    pub dst_key: Option<KeyConfig>,

    /// Emit a remote-grant-flagged terminator to pre-arm the destination
    /// channel on call start (`grantDemand`).
    #[serde(default)]
    pub grant_demand: bool,

    /// Bridge to an external MMDVM-gateway P25 peer instead of routing
    /// purely within the DVM network.
    #[serde(default)]
    pub mmdvm_reflector: bool,

    #[serde(default = "default_fne_addr")]
    pub fne_addr: String,
    #[serde(default)]
    pub mmdvm_addr: Option<String>,

    /// Call-inactivity timeout, mirroring the grant hang timer.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

/// Algorithm + key identity for one direction's TEK (spec.md §3 "Key item").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Wire algorithm ID: `0x80` unencrypted, `0x81` DES-OFB, `0x84`
    /// AES-256, `0xAA` ARC4.
    pub algorithm: u8,
    pub key_id: u16,
    /// Key material as hex, if already known; otherwise the engine
    /// issues a KMM `INVENTORY_CMD` for this `(algorithm, key_id)` pair.
    #[serde(default)]
    pub key_hex: Option<String>,
}

impl KeyConfig {
    /// Decode `key_hex` into raw key bytes.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if `key_hex` is not valid hex.
    pub fn key_bytes(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        match &self.key_hex {
            None => Ok(None),
            Some(hex) => decode_hex(hex).map(Some).map_err(|e| ConfigError::InvalidValue(e.to_string())),
        }
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, std::num::ParseIntError> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16))
        .collect()
}

fn default_fne_addr() -> String {
    "127.0.0.1:62031".to_string()
}

fn default_call_timeout_ms() -> u64 {
    15_000
}

impl PatchConfig {
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

    /// Validate configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] when a field fails range
    /// checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.src_tgid == self.dst_tgid && self.src_slot == self.dst_slot {
            return Err(ConfigError::InvalidValue("src and dst talkgroup/slot must differ".into()));
        }
        if self.mmdvm_reflector && self.mmdvm_addr.is_none() {
            return Err(ConfigError::InvalidValue("mmdvm_addr required when mmdvm_reflector is set".into()));
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("call_timeout_ms cannot be 0".into()));
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

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> PatchConfig {
        PatchConfig {
            src_tgid: 1000,
            src_slot: 0,
            dst_tgid: 2000,
            dst_slot: 0,
            src_key: Some(KeyConfig {
                algorithm: 0x84,
                key_id: 1,
                key_hex: Some("aa".repeat(32)),
            }),
            dst_key: Some(KeyConfig {
                algorithm: 0xAA,
                key_id: 2,
                key_hex: None,
            }),
            grant_demand: false,
            mmdvm_reflector: false,
            fne_addr: default_fne_addr(),
            mmdvm_addr: None,
            call_timeout_ms: default_call_timeout_ms(),
        }
    }

    #[test]
    fn s4_config_validates() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_identical_src_and_dst() {
        let mut config = base_config();
        config.dst_tgid = config.src_tgid;
        config.dst_slot = config.src_slot;
        assert!(config.validate().is_err());
    }

    #[test]
    fn mmdvm_reflector_requires_address() {
        let mut config = base_config();
        config.mmdvm_reflector = true;
        assert!(config.validate().is_err());
        config.mmdvm_addr = Some("127.0.0.1:41000".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn key_hex_decodes_to_bytes() {
        let config = base_config();
        let bytes = config.src_key.unwrap().key_bytes().unwrap().unwrap();
        assert_eq!(bytes, vec![0xAAu8; 32]);
    }

    #[test]
    fn roundtrips_through_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.yaml");
        let config = base_config();
        config.to_file(&path).unwrap();
        let loaded = PatchConfig::from_file(&path).unwrap();
        assert_eq!(loaded.src_tgid, 1000);
        assert_eq!(loaded.dst_tgid, 2000);
    }
}
