// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trunking Signalling Block (spec.md §4.3): a single Trellis-¾-wrapped
//! 12-byte block carrying channel grants, responses, and site broadcasts.
//!
//! Layout: byte 0 is `LB | PF | TSBKO(6 bits)`, byte 1 is the manufacturer
//! ID, bytes 2-9 are opcode-specific, bytes 10-11 carry the CRC-CCITT-16
//! (no mask; P25 TSBKs are unmasked, unlike DMR's CSBK). Up to three TSBKs
//! are carried back to back in a multi-block TSDU frame; this module codes
//! one block at a time and leaves grouping to the caller.

use crate::codec::crc;
use crate::codec::trellis;

use super::consts::Tsbko;

const BLOCK_LENGTH_BYTES: usize = 12;
const CRC_HI: usize = 10;
const CRC_LO: usize = 11;

/// Opcode-specific TSBK payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsbkBody {
    /// `IOSP_GRP_VCH`: group voice channel grant (request or assignment).
    GroupVoiceGrant {
        svc_options: u8,
        channel: u16,
        dst_tgid: u16,
        src_id: u32,
    },
    /// `IOSP_UU_VCH`: unit-to-unit voice channel grant.
    UnitVoiceGrant {
        svc_options: u8,
        channel: u16,
        dst_id: u32,
        src_id: u32,
    },
    /// `OSP_QUE_RSP`: channel queued, not yet available.
    QueueResponse {
        reason: u8,
        dst_id: u32,
        src_id: u32,
    },
    /// `OSP_DENY_RSP`: request denied.
    DenyResponse {
        reason: u8,
        dst_id: u32,
        src_id: u32,
    },
    /// `IOSP_GRP_AFF`: group affiliation request/response.
    GroupAffiliation { dst_tgid: u16, src_id: u32 },
    /// Any opcode this codec does not interpret further.
    Raw([u8; 8]),
}

/// A fully decoded TSBK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tsbk {
    pub last_block: bool,
    pub protect_flag: bool,
    pub opcode: Tsbko,
    pub mfid: u8,
    pub body: TsbkBody,
}

impl Tsbk {
    #[must_use]
    pub fn new(opcode: Tsbko, body: TsbkBody) -> Self {
        Self {
            last_block: true,
            protect_flag: false,
            opcode,
            mfid: 0,
            body,
        }
    }
}

fn apply_crc(data: &mut [u8; BLOCK_LENGTH_BYTES]) {
    data[CRC_HI] = 0;
    data[CRC_LO] = 0;
    let crc_val = crc::crc16_ccitt(data);
    data[CRC_HI] = (crc_val >> 8) as u8;
    data[CRC_LO] = crc_val as u8;
}

fn verify_crc(data: &[u8; BLOCK_LENGTH_BYTES]) -> bool {
    let expected = (u16::from(data[CRC_HI]) << 8) | u16::from(data[CRC_LO]);
    let mut check = *data;
    check[CRC_HI] = 0;
    check[CRC_LO] = 0;
    crc::verify_crc16(&check, expected)
}

fn pack_24(id: u32) -> [u8; 3] {
    [(id >> 16) as u8, (id >> 8) as u8, id as u8]
}

fn unpack_24(b: &[u8]) -> u32 {
    (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2])
}

/// TSBK decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TsbkError {
    #[error("P25 TSBK trellis decode failed: {0}")]
    Trellis(#[from] trellis::TrellisError),
    #[error("P25 TSBK CRC-CCITT check failed")]
    CrcMismatch,
}

/// Decode a TSBK from its Trellis-¾ block (18 bytes, 144 bits: 171
/// significant + pad, matching [`trellis::decode`]'s block size).
///
/// # Errors
/// Returns [`TsbkError::Trellis`] if the Viterbi decode fails outright, or
/// [`TsbkError::CrcMismatch`] if the recovered block's CRC-CCITT-16 does
/// not match.
pub fn decode(block: &[u8]) -> Result<Tsbk, TsbkError> {
    let data = trellis::decode(block)?;

    if !verify_crc(&data) {
        return Err(TsbkError::CrcMismatch);
    }

    let last_block = data[0] & 0x80 != 0;
    let protect_flag = data[0] & 0x40 != 0;
    let opcode = Tsbko::from_wire(data[0]);
    let mfid = data[1];
    let payload = &data[2..10];

    let body = match opcode {
        Tsbko::IospGrpVch => TsbkBody::GroupVoiceGrant {
            svc_options: payload[0],
            channel: (u16::from(payload[1]) << 8) | u16::from(payload[2]),
            dst_tgid: (u16::from(payload[3]) << 8) | u16::from(payload[4]),
            src_id: unpack_24(&payload[5..8]),
        },
        Tsbko::IospUuVch => TsbkBody::UnitVoiceGrant {
            svc_options: payload[0],
            channel: (u16::from(payload[1]) << 8) | u16::from(payload[2]),
            dst_id: unpack_24(&payload[3..6]),
            src_id: (u32::from(payload[6]) << 8) | u32::from(payload[7]),
        },
        Tsbko::OspQueueResponse => TsbkBody::QueueResponse {
            reason: payload[0],
            dst_id: unpack_24(&payload[2..5]),
            src_id: unpack_24(&payload[5..8]),
        },
        Tsbko::OspDenyResponse => TsbkBody::DenyResponse {
            reason: payload[0],
            dst_id: unpack_24(&payload[2..5]),
            src_id: unpack_24(&payload[5..8]),
        },
        Tsbko::IospGrpAff => TsbkBody::GroupAffiliation {
            dst_tgid: (u16::from(payload[3]) << 8) | u16::from(payload[4]),
            src_id: unpack_24(&payload[5..8]),
        },
        _ => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(payload);
            TsbkBody::Raw(raw)
        }
    };

    Ok(Tsbk {
        last_block,
        protect_flag,
        opcode,
        mfid,
        body,
    })
}

/// Encode a TSBK into its Trellis-¾ block.
#[must_use]
pub fn encode(tsbk: &Tsbk) -> Vec<u8> {
    let mut data = [0u8; BLOCK_LENGTH_BYTES];
    data[0] = tsbk.opcode.to_wire()
        | if tsbk.last_block { 0x80 } else { 0 }
        | if tsbk.protect_flag { 0x40 } else { 0 };
    data[1] = tsbk.mfid;

    match tsbk.body {
        TsbkBody::GroupVoiceGrant {
            svc_options,
            channel,
            dst_tgid,
            src_id,
        } => {
            data[2] = svc_options;
            data[3] = (channel >> 8) as u8;
            data[4] = channel as u8;
            data[5] = (dst_tgid >> 8) as u8;
            data[6] = dst_tgid as u8;
            data[7..10].copy_from_slice(&pack_24(src_id));
        }
        TsbkBody::UnitVoiceGrant {
            svc_options,
            channel,
            dst_id,
            src_id,
        } => {
            data[2] = svc_options;
            data[3] = (channel >> 8) as u8;
            data[4] = channel as u8;
            data[5..8].copy_from_slice(&pack_24(dst_id));
            data[8] = (src_id >> 8) as u8;
            data[9] = src_id as u8;
        }
        TsbkBody::QueueResponse {
            reason,
            dst_id,
            src_id,
        }
        | TsbkBody::DenyResponse {
            reason,
            dst_id,
            src_id,
        } => {
            data[2] = reason;
            data[4..7].copy_from_slice(&pack_24(dst_id));
            data[7..10].copy_from_slice(&pack_24(src_id));
        }
        TsbkBody::GroupAffiliation { dst_tgid, src_id } => {
            data[5] = (dst_tgid >> 8) as u8;
            data[6] = dst_tgid as u8;
            data[7..10].copy_from_slice(&pack_24(src_id));
        }
        TsbkBody::Raw(raw) => {
            data[2..10].copy_from_slice(&raw);
        }
    }

    apply_crc(&mut data);
    trellis::encode(&data)
}
