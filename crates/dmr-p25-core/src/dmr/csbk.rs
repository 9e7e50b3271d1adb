// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Control Signalling Block (CSBK): a single BPTC(196,96)-wrapped 12-byte
//! block used for channel grants, acknowledgements, and site broadcasts.
//!
//! Layout: byte 0 is `LB | PF | CSBKO(6 bits)`, byte 1 is the feature ID,
//! bytes 2-9 are the opcode-specific payload, bytes 10-11 carry the
//! CRC-CCITT-16 masked with [`CSBK_CRC_MASK`]. The grant/ack payload field
//! widths below follow the base `CSBK` framing style used throughout this
//! codebase's DMR opcode family; they are not reproduced from a specific
//! upstream struct (none shipped in the reference extract beyond one stub
//! opcode), so downstream code should treat unknown bits as reserved.

use crate::bptc;
use crate::codec::crc;
use crate::dmr::consts::{Csbko, CSBK_CRC_MASK};

const BLOCK_LENGTH_BYTES: usize = 12;
const CRC_HI: usize = 10;
const CRC_LO: usize = 11;

/// Opcode-specific CSBK payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsbkBody {
    /// `TV_GRANT` / `PV_GRANT` / `BTV_GRANT`: voice channel grant.
    VoiceGrant {
        channel: u16,
        slot: u8,
        dst_id: u32,
        src_id: u32,
        emergency: bool,
    },
    /// `TD_GRANT` / `PD_GRANT`: data channel grant.
    DataGrant {
        channel: u16,
        slot: u8,
        dst_id: u32,
        src_id: u32,
    },
    /// `ACK_RSP`: positive acknowledgement carrying a reason/service code.
    AckResponse {
        reason: u8,
        dst_id: u32,
        src_id: u32,
    },
    /// `NACK_RSP`: negative acknowledgement.
    NackResponse {
        reason: u8,
        dst_id: u32,
        src_id: u32,
    },
    /// Any opcode this codec does not interpret further: the raw 8-byte
    /// payload, passed through unexamined.
    Raw([u8; 8]),
}

/// A fully decoded CSBK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Csbk {
    pub last_block: bool,
    pub protect_flag: bool,
    pub opcode: Csbko,
    pub feature_id: u8,
    pub body: CsbkBody,
}

impl Csbk {
    #[must_use]
    pub fn new(opcode: Csbko, body: CsbkBody) -> Self {
        Self {
            last_block: true,
            protect_flag: false,
            opcode,
            feature_id: 0x00,
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
    data[CRC_HI] ^= CSBK_CRC_MASK[0];
    data[CRC_LO] ^= CSBK_CRC_MASK[1];
}

fn verify_crc(data: &[u8; BLOCK_LENGTH_BYTES]) -> bool {
    let mut check = *data;
    check[CRC_HI] ^= CSBK_CRC_MASK[0];
    check[CRC_LO] ^= CSBK_CRC_MASK[1];
    let expected = (u16::from(check[CRC_HI]) << 8) | u16::from(check[CRC_LO]);
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

/// Decode a CSBK from a 196-bit BPTC block (25 bytes).
///
/// Returns `None` if the CRC-CCITT-16 check fails.
#[must_use]
pub fn decode(block: &[u8; 25]) -> Option<Csbk> {
    let data = bptc::decode(block);
    let mut full = [0u8; BLOCK_LENGTH_BYTES];
    full.copy_from_slice(&data);

    if !verify_crc(&full) {
        return None;
    }

    let last_block = full[0] & 0x80 != 0;
    let protect_flag = full[0] & 0x40 != 0;
    let opcode = Csbko::from_wire(full[0]);
    let feature_id = full[1];
    let payload = &full[2..10];

    let body = match opcode {
        Csbko::TvGrant | Csbko::PvGrant | Csbko::BtvGrant => CsbkBody::VoiceGrant {
            channel: (u16::from(payload[0] & 0x0F) << 8) | u16::from(payload[1]),
            slot: (payload[0] >> 4) & 0x01,
            emergency: payload[0] & 0x80 != 0,
            dst_id: unpack_24(&payload[2..5]),
            src_id: unpack_24(&payload[5..8]),
        },
        Csbko::TdGrant | Csbko::PdGrant => CsbkBody::DataGrant {
            channel: (u16::from(payload[0] & 0x0F) << 8) | u16::from(payload[1]),
            slot: (payload[0] >> 4) & 0x01,
            dst_id: unpack_24(&payload[2..5]),
            src_id: unpack_24(&payload[5..8]),
        },
        Csbko::AckRsp => CsbkBody::AckResponse {
            reason: payload[0],
            dst_id: unpack_24(&payload[2..5]),
            src_id: unpack_24(&payload[5..8]),
        },
        Csbko::NackRsp => CsbkBody::NackResponse {
            reason: payload[0],
            dst_id: unpack_24(&payload[2..5]),
            src_id: unpack_24(&payload[5..8]),
        },
        _ => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(payload);
            CsbkBody::Raw(raw)
        }
    };

    Some(Csbk {
        last_block,
        protect_flag,
        opcode,
        feature_id,
        body,
    })
}

/// Encode a CSBK into a 196-bit BPTC block (25 bytes).
#[must_use]
pub fn encode(csbk: &Csbk) -> [u8; 25] {
    let mut full = [0u8; BLOCK_LENGTH_BYTES];
    full[0] = csbk.opcode.to_wire()
        | if csbk.last_block { 0x80 } else { 0 }
        | if csbk.protect_flag { 0x40 } else { 0 };
    full[1] = csbk.feature_id;

    match csbk.body {
        CsbkBody::VoiceGrant {
            channel,
            slot,
            dst_id,
            src_id,
            emergency,
        } => {
            full[2] = (if emergency { 0x80 } else { 0 })
                | ((slot & 0x01) << 4)
                | ((channel >> 8) as u8 & 0x0F);
            full[3] = channel as u8;
            full[4..7].copy_from_slice(&pack_24(dst_id));
            full[7..10].copy_from_slice(&pack_24(src_id));
        }
        CsbkBody::DataGrant {
            channel,
            slot,
            dst_id,
            src_id,
        } => {
            full[2] = ((slot & 0x01) << 4) | ((channel >> 8) as u8 & 0x0F);
            full[3] = channel as u8;
            full[4..7].copy_from_slice(&pack_24(dst_id));
            full[7..10].copy_from_slice(&pack_24(src_id));
        }
        CsbkBody::AckResponse {
            reason,
            dst_id,
            src_id,
        }
        | CsbkBody::NackResponse {
            reason,
            dst_id,
            src_id,
        } => {
            full[2] = reason;
            full[4..7].copy_from_slice(&pack_24(dst_id));
            full[7..10].copy_from_slice(&pack_24(src_id));
        }
        CsbkBody::Raw(raw) => {
            full[2..10].copy_from_slice(&raw);
        }
    }

    apply_crc(&mut full);
    bptc::encode(&full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_grant_roundtrips() {
        let csbk = Csbk::new(
            Csbko::TvGrant,
            CsbkBody::VoiceGrant {
                channel: 0x0AB,
                slot: 1,
                dst_id: 0x112233,
                src_id: 0x445566,
                emergency: true,
            },
        );
        let block = encode(&csbk);
        let decoded = decode(&block).unwrap();
        assert_eq!(decoded.opcode, Csbko::TvGrant);
        assert_eq!(
            decoded.body,
            CsbkBody::VoiceGrant {
                channel: 0x0AB,
                slot: 1,
                dst_id: 0x112233,
                src_id: 0x445566,
                emergency: true,
            }
        );
    }

    #[test]
    fn data_grant_roundtrips() {
        let csbk = Csbk::new(
            Csbko::TdGrant,
            CsbkBody::DataGrant {
                channel: 0x3FF,
                slot: 0,
                dst_id: 1,
                src_id: 2,
            },
        );
        let block = encode(&csbk);
        let decoded = decode(&block).unwrap();
        assert_eq!(
            decoded.body,
            CsbkBody::DataGrant {
                channel: 0x3FF,
                slot: 0,
                dst_id: 1,
                src_id: 2,
            }
        );
    }

    #[test]
    fn nack_response_carries_reason() {
        use crate::dmr::consts::reason_code;
        let csbk = Csbk::new(
            Csbko::NackRsp,
            CsbkBody::NackResponse {
                reason: reason_code::TS_DENY_RSN_TGT_BUSY,
                dst_id: 100,
                src_id: 200,
            },
        );
        let block = encode(&csbk);
        let decoded = decode(&block).unwrap();
        assert_eq!(
            decoded.body,
            CsbkBody::NackResponse {
                reason: reason_code::TS_DENY_RSN_TGT_BUSY,
                dst_id: 100,
                src_id: 200,
            }
        );
    }

    #[test]
    fn unknown_opcode_passes_through_raw_payload() {
        let csbk = Csbk::new(Csbko::Aloha, CsbkBody::Raw([1, 2, 3, 4, 5, 6, 7, 8]));
        let block = encode(&csbk);
        let decoded = decode(&block).unwrap();
        assert_eq!(decoded.body, CsbkBody::Raw([1, 2, 3, 4, 5, 6, 7, 8]));
    }

    #[test]
    fn corrupted_crc_is_rejected() {
        let mut full = [0u8; BLOCK_LENGTH_BYTES];
        full[0] = Csbko::AckRsp.to_wire();
        apply_crc(&mut full);
        assert!(verify_crc(&full));
        full[CRC_LO] ^= 0xFF;
        assert!(!verify_crc(&full));
    }
}
