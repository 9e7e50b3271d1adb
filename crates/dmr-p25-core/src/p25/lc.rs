// SPDX-License-Identifier: Apache-2.0 OR MIT

//! P25 Link Control (spec.md §4.3): the 12-byte LC payload carried,
//! RS(24,12,13)-protected, in LDU1 and TDULC frames. Byte 0 is
//! `PF(1) | LCO(7 bits)`, byte 1 is the manufacturer ID, the remaining
//! 10 bytes are opcode-specific.

use crate::codec::reed_solomon::{ReedSolomon, RsError};
use super::consts::Lco;

const LC_DATA_LEN: usize = 12;
const LC_CODEWORD_LEN: usize = 24;

fn rs() -> ReedSolomon {
    ReedSolomon::new(LC_CODEWORD_LEN, LC_DATA_LEN)
}

/// Opcode-specific Link Control body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcBody {
    /// `GROUP` / `GROUP_UPDT`: group voice channel user.
    GroupVoice {
        svc_options: u8,
        dst_tgid: u16,
        src_id: u32,
    },
    /// `PRIVATE`: unit-to-unit voice channel user.
    UnitVoice {
        svc_options: u8,
        dst_id: u32,
        src_id: u32,
    },
    /// `CALL_TERM`: call termination or cancellation.
    CallTermination { src_id: u32 },
    /// Any opcode this codec does not interpret further.
    Raw([u8; 10]),
}

/// A fully decoded Link Control record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkControl {
    pub protect_flag: bool,
    pub lco: Lco,
    pub mfid: u8,
    pub body: LcBody,
}

impl LinkControl {
    #[must_use]
    pub fn new(lco: Lco, body: LcBody) -> Self {
        Self {
            protect_flag: false,
            lco,
            mfid: 0,
            body,
        }
    }
}

fn pack_24(id: u32) -> [u8; 3] {
    [(id >> 16) as u8, (id >> 8) as u8, id as u8]
}

fn unpack_24(b: &[u8]) -> u32 {
    (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2])
}

/// Encode a [`LinkControl`] into its 12-byte payload, then RS(24,12,13)
/// protect it into the 24-byte on-wire codeword.
#[must_use]
pub fn encode(lc: &LinkControl) -> [u8; LC_CODEWORD_LEN] {
    let mut data = [0u8; LC_DATA_LEN];
    data[0] = lc.lco.to_wire() | if lc.protect_flag { 0x80 } else { 0 };
    data[1] = lc.mfid;

    match lc.body {
        LcBody::GroupVoice {
            svc_options,
            dst_tgid,
            src_id,
        } => {
            data[2] = svc_options;
            data[3] = (dst_tgid >> 8) as u8;
            data[4] = dst_tgid as u8;
            data[5..8].copy_from_slice(&pack_24(src_id));
        }
        LcBody::UnitVoice {
            svc_options,
            dst_id,
            src_id,
        } => {
            data[2] = svc_options;
            data[3..6].copy_from_slice(&pack_24(dst_id));
            data[6..9].copy_from_slice(&pack_24(src_id));
        }
        LcBody::CallTermination { src_id } => {
            data[6..9].copy_from_slice(&pack_24(src_id));
        }
        LcBody::Raw(raw) => {
            data[2..12].copy_from_slice(&raw);
        }
    }

    let encoded = rs().encode(&data);
    let mut out = [0u8; LC_CODEWORD_LEN];
    out.copy_from_slice(&encoded);
    out
}

/// Decode a 24-byte RS(24,12,13) Link Control codeword.
///
/// # Errors
/// Propagates [`RsError`] if the codeword has more errors than the code
/// can correct.
pub fn decode(block: &[u8; LC_CODEWORD_LEN]) -> Result<LinkControl, RsError> {
    let data = rs().decode(block)?;

    let protect_flag = data[0] & 0x80 != 0;
    let lco = Lco::from_wire(data[0]);
    let mfid = data[1];

    let body = match lco {
        Lco::GroupVoice | Lco::GroupVoiceUpdate => LcBody::GroupVoice {
            svc_options: data[2],
            dst_tgid: (u16::from(data[3]) << 8) | u16::from(data[4]),
            src_id: unpack_24(&data[5..8]),
        },
        Lco::PrivateVoice => LcBody::UnitVoice {
            svc_options: data[2],
            dst_id: unpack_24(&data[3..6]),
            src_id: unpack_24(&data[6..9]),
        },
        Lco::CallTermination => LcBody::CallTermination {
            src_id: unpack_24(&data[6..9]),
        },
        _ => {
            let mut raw = [0u8; 10];
            raw.copy_from_slice(&data[2..12]);
            LcBody::Raw(raw)
        }
    };

    Ok(LinkControl {
        protect_flag,
        lco,
        mfid,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_voice_roundtrips() {
        let lc = LinkControl::new(
            Lco::GroupVoice,
            LcBody::GroupVoice {
                svc_options: 0x80,
                dst_tgid: 100,
                src_id: 0x001234,
            },
        );
        let block = encode(&lc);
        let decoded = decode(&block).unwrap();
        assert_eq!(decoded.lco, Lco::GroupVoice);
        assert_eq!(
            decoded.body,
            LcBody::GroupVoice {
                svc_options: 0x80,
                dst_tgid: 100,
                src_id: 0x001234,
            }
        );
    }

    #[test]
    fn unit_voice_roundtrips() {
        let lc = LinkControl::new(
            Lco::PrivateVoice,
            LcBody::UnitVoice {
                svc_options: 0,
                dst_id: 2000,
                src_id: 1000,
            },
        );
        let block = encode(&lc);
        let decoded = decode(&block).unwrap();
        assert_eq!(
            decoded.body,
            LcBody::UnitVoice {
                svc_options: 0,
                dst_id: 2000,
                src_id: 1000,
            }
        );
    }

    #[test]
    fn corrects_light_byte_errors() {
        let lc = LinkControl::new(
            Lco::GroupVoice,
            LcBody::GroupVoice {
                svc_options: 0,
                dst_tgid: 42,
                src_id: 7,
            },
        );
        let mut block = encode(&lc);
        block[3] ^= 0xFF;
        block[10] ^= 0x55;
        let decoded = decode(&block).unwrap();
        assert_eq!(
            decoded.body,
            LcBody::GroupVoice {
                svc_options: 0,
                dst_tgid: 42,
                src_id: 7,
            }
        );
    }

    #[test]
    fn unknown_lco_passes_through_raw() {
        let raw = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let lc = LinkControl::new(Lco::Unknown(0x3F), LcBody::Raw(raw));
        let block = encode(&lc);
        let decoded = decode(&block).unwrap();
        assert_eq!(decoded.body, LcBody::Raw(raw));
    }
}
