// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Talkgroup patch engine: cross-TG forwarding with optional cross-key
//! re-encryption of P25 voice frames, and the KMM key-delivery exchange
//! that feeds it (spec.md §4.7, components C8/C10).

pub mod config;
pub mod direction;
pub mod engine;
pub mod kmm;
pub mod reflector;

pub use config::{ConfigError, KeyConfig, PatchConfig};
pub use direction::PatchDirection;
pub use engine::PatchEngine;
