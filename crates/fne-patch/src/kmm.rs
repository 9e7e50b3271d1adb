// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Key Management Message protocol (C10, spec.md §4.7): the TEK
//! request/delivery exchange the patch engine runs against the FNE
//! before it is willing to forward audio for a direction.

use std::collections::HashMap;

use dmr_p25_core::model::AlgorithmId;

/// KMM service access point (spec.md §4.7).
pub mod sap {
    pub const UNENCRYPTED: u8 = 0x28;
    pub const ENCRYPTED: u8 = 0x29;
}

/// KMM message type (`KMM_MessageType` in the radio's key-fill protocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KmmOpcode {
    Hello,
    InventoryCmd,
    ModifyKeyCmd,
    Nak,
    Unknown(u8),
}

impl KmmOpcode {
    #[must_use]
    pub fn from_wire(value: u8) -> Self {
        match value {
            0x0C => Self::Hello,
            0x0D => Self::InventoryCmd,
            0x13 => Self::ModifyKeyCmd,
            0x16 => Self::Nak,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Hello => 0x0C,
            Self::InventoryCmd => 0x0D,
            Self::ModifyKeyCmd => 0x13,
            Self::Nak => 0x16,
            Self::Unknown(v) => v,
        }
    }
}

/// `KMM_Status`: the reason a NAK carries when a key request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KmmStatus {
    CmdPerformed,
    CmdNotPerformed,
    ItemNotExist,
    InvalidKeyId,
    InvalidAlgId,
    KeyFail,
    Unknown(u8),
}

impl KmmStatus {
    #[must_use]
    pub fn from_wire(value: u8) -> Self {
        match value {
            0x00 => Self::CmdPerformed,
            0x01 => Self::CmdNotPerformed,
            0x02 => Self::ItemNotExist,
            0x08 => Self::InvalidKeyId,
            0x09 => Self::InvalidAlgId,
            0x0D => Self::KeyFail,
            _ => Self::Unknown(value),
        }
    }

    #[must_use]
    pub fn to_wire(self) -> u8 {
        match self {
            Self::CmdPerformed => 0x00,
            Self::CmdNotPerformed => 0x01,
            Self::ItemNotExist => 0x02,
            Self::InvalidKeyId => 0x08,
            Self::InvalidAlgId => 0x09,
            Self::KeyFail => 0x0D,
            Self::Unknown(v) => v,
        }
    }
}

/// A decoded `MODIFY_KEY_CMD`: a traffic encryption key delivered for
/// `(algorithm, key_id)`.
#[derive(Debug, Clone)]
pub struct KeyDelivery {
    pub algorithm: AlgorithmId,
    pub key_id: u16,
    pub key_bytes: Vec<u8>,
}

/// A decoded KMM message relevant to the patch engine.
#[derive(Debug, Clone)]
pub enum KmmMessage {
    Hello,
    /// Outbound request for a key, targeted by `(algorithm, key_id)`.
    InventoryCmd { algorithm: AlgorithmId, key_id: u16 },
    ModifyKeyCmd(KeyDelivery),
    Nak { status: KmmStatus },
}

/// KMM decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KmmError {
    #[error("KMM message too short: expected at least {expected}, got {actual}")]
    TooShort { expected: usize, actual: usize },
}

/// Encode an `INVENTORY_CMD` requesting the TEK for `(algorithm, key_id)`.
#[must_use]
pub fn encode_inventory_cmd(algorithm: AlgorithmId, key_id: u16) -> Vec<u8> {
    vec![
        KmmOpcode::InventoryCmd.to_wire(),
        algorithm.to_wire(),
        (key_id >> 8) as u8,
        key_id as u8,
    ]
}

/// Decode a raw KMM message body (opcode byte followed by opcode-specific
/// fields).
///
/// # Errors
/// Returns [`KmmError::TooShort`] if the body is too short for its opcode.
pub fn decode(body: &[u8]) -> Result<KmmMessage, KmmError> {
    if body.is_empty() {
        return Err(KmmError::TooShort { expected: 1, actual: 0 });
    }
    match KmmOpcode::from_wire(body[0]) {
        KmmOpcode::Hello => Ok(KmmMessage::Hello),
        KmmOpcode::InventoryCmd => {
            if body.len() < 4 {
                return Err(KmmError::TooShort { expected: 4, actual: body.len() });
            }
            Ok(KmmMessage::InventoryCmd {
                algorithm: AlgorithmId::from_wire(body[1]),
                key_id: (u16::from(body[2]) << 8) | u16::from(body[3]),
            })
        }
        KmmOpcode::ModifyKeyCmd => {
            if body.len() < 4 {
                return Err(KmmError::TooShort { expected: 4, actual: body.len() });
            }
            let algorithm = AlgorithmId::from_wire(body[1]);
            let key_id = (u16::from(body[2]) << 8) | u16::from(body[3]);
            Ok(KmmMessage::ModifyKeyCmd(KeyDelivery {
                algorithm,
                key_id,
                key_bytes: body[4..].to_vec(),
            }))
        }
        KmmOpcode::Nak => {
            if body.len() < 2 {
                return Err(KmmError::TooShort { expected: 2, actual: body.len() });
            }
            Ok(KmmMessage::Nak { status: KmmStatus::from_wire(body[1]) })
        }
        KmmOpcode::Unknown(_) => Ok(KmmMessage::Hello),
    }
}

/// Tracks outstanding `INVENTORY_CMD` requests so an asynchronously
/// arriving `MODIFY_KEY_CMD` or `NAK` can be routed back to the direction
/// that asked for it, keyed on `(algorithm, key_id)` (spec.md §4.7).
#[derive(Debug, Default)]
pub struct PendingKeyRequests {
    pending: HashMap<(u8, u16), ()>,
}

impl PendingKeyRequests {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&mut self, algorithm: AlgorithmId, key_id: u16) {
        self.pending.insert((algorithm.to_wire(), key_id), ());
    }

    #[must_use]
    pub fn is_pending(&self, algorithm: AlgorithmId, key_id: u16) -> bool {
        self.pending.contains_key(&(algorithm.to_wire(), key_id))
    }

    /// Resolve a pending request, whether satisfied by delivery or NAK.
    pub fn resolve(&mut self, algorithm: AlgorithmId, key_id: u16) {
        self.pending.remove(&(algorithm.to_wire(), key_id));
    }
}
