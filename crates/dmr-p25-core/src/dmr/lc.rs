// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Full Link Control (LC), Short LC, and Privacy LC: the 9-byte payload
//! carried in a voice header, terminator, or privacy-indicator burst,
//! protected by RS(12,9) and wrapped in a BPTC(196,96) block.

use crate::bptc;
use crate::codec::crc;
use crate::codec::reed_solomon::ReedSolomon;
use crate::dmr::consts::{
    svc_opt, DataType, Flco, PI_HEADER_CRC_MASK, TERMINATOR_WITH_LC_CRC_MASK,
    VOICE_LC_HEADER_CRC_MASK,
};
use crate::hamming::golay24;

const LC_HEADER_LENGTH_BYTES: usize = 9;
const LC_FULL_LENGTH_BYTES: usize = 12; // 9 data bytes + 3 RS parity bytes

/// Decoded full link-control payload (spec.md §3 "Frame record" LC fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkControl {
    pub protect_flag: bool,
    pub reserved: bool,
    pub flco: Flco,
    pub feature_id: u8,
    pub emergency: bool,
    pub encrypted: bool,
    pub broadcast: bool,
    pub ovcm: bool,
    pub priority: u8,
    pub dst_id: u32,
    pub src_id: u32,
}

impl LinkControl {
    #[must_use]
    pub fn new(flco: Flco, src_id: u32, dst_id: u32) -> Self {
        Self {
            protect_flag: false,
            reserved: false,
            flco,
            feature_id: 0x00, // FID_ETSI
            emergency: false,
            encrypted: false,
            broadcast: false,
            ovcm: false,
            priority: 0x02,
            dst_id,
            src_id,
        }
    }

    fn to_bytes(self) -> [u8; LC_HEADER_LENGTH_BYTES] {
        let mut out = [0u8; LC_HEADER_LENGTH_BYTES];
        out[0] = self.flco.to_wire()
            | if self.protect_flag { 0x80 } else { 0 }
            | if self.reserved { 0x40 } else { 0 };
        out[1] = self.feature_id;
        out[2] = (if self.emergency { svc_opt::EMERGENCY } else { 0 })
            | (if self.encrypted { 0x40 } else { 0 })
            | (if self.broadcast { svc_opt::BCAST } else { 0 })
            | (if self.ovcm { svc_opt::OVCM } else { 0 })
            | (self.priority & 0x03);
        out[3] = (self.dst_id >> 16) as u8;
        out[4] = (self.dst_id >> 8) as u8;
        out[5] = self.dst_id as u8;
        out[6] = (self.src_id >> 16) as u8;
        out[7] = (self.src_id >> 8) as u8;
        out[8] = self.src_id as u8;
        out
    }

    fn from_bytes(data: &[u8; LC_HEADER_LENGTH_BYTES]) -> Self {
        Self {
            protect_flag: data[0] & 0x80 != 0,
            reserved: data[0] & 0x40 != 0,
            flco: Flco::from_wire(data[0]),
            feature_id: data[1],
            emergency: data[2] & svc_opt::EMERGENCY != 0,
            encrypted: data[2] & 0x40 != 0,
            broadcast: data[2] & svc_opt::BCAST != 0,
            ovcm: data[2] & svc_opt::OVCM != 0,
            priority: data[2] & 0x03,
            dst_id: (u32::from(data[3]) << 16) | (u32::from(data[4]) << 8) | u32::from(data[5]),
            src_id: (u32::from(data[6]) << 16) | (u32::from(data[7]) << 8) | u32::from(data[8]),
        }
    }
}

fn rs_129() -> ReedSolomon {
    ReedSolomon::new(LC_FULL_LENGTH_BYTES, LC_HEADER_LENGTH_BYTES)
}

fn crc_mask_for(data_type: DataType) -> Option<[u8; 3]> {
    match data_type {
        DataType::VoiceLcHeader => Some(VOICE_LC_HEADER_CRC_MASK),
        DataType::TerminatorWithLc => Some(TERMINATOR_WITH_LC_CRC_MASK),
        _ => None,
    }
}

/// Encode a full LC into a 196-bit BPTC block (25 bytes), applying RS(12,9)
/// FEC and the data-type-specific CRC XOR mask.
///
/// # Panics
/// Panics if `data_type` is not `VoiceLcHeader` or `TerminatorWithLc` — the
/// only two burst types that carry a full LC.
#[must_use]
pub fn encode(lc: &LinkControl, data_type: DataType) -> [u8; 25] {
    let mask = crc_mask_for(data_type).expect("full LC only valid for voice/terminator bursts");
    let data = lc.to_bytes();
    let rs = rs_129();
    let codeword = rs.encode(&data);

    // RS129::encode in the reference implementation returns parity in
    // reverse order (parity[2], parity[1], parity[0]); our generic RS
    // encoder appends parity forward, so mirror that ordering here.
    let parity = &codeword[9..12];
    let mut lc_data = [0u8; 12];
    lc_data[..9].copy_from_slice(&data);
    lc_data[9] = parity[2] ^ mask[0];
    lc_data[10] = parity[1] ^ mask[1];
    lc_data[11] = parity[0] ^ mask[2];

    bptc::encode(&lc_data)
}

/// Decode a full LC from a 196-bit BPTC block.
///
/// RS(12,9) is used as a detector only here, matching the reference
/// decoder's `edac::RS129::check()` (spec.md: "Decoder detects up to 3
/// errors; on decode failure the LC is rejected by the caller") — a
/// correctable-but-wrong codeword is rejected, not silently repaired.
/// Returns `None` if the BPTC-recovered RS(12,9) codeword fails that check
/// (or the burst does not actually carry an LC).
#[must_use]
pub fn decode(block: &[u8; 25], data_type: DataType) -> Option<LinkControl> {
    let mask = crc_mask_for(data_type)?;
    let mut lc_data = bptc::decode(block);
    lc_data[9] ^= mask[0];
    lc_data[10] ^= mask[1];
    lc_data[11] ^= mask[2];

    // Un-mirror the parity byte order to match our generic RS layout.
    let mut codeword = [0u8; 12];
    codeword[..9].copy_from_slice(&lc_data[..9]);
    codeword[9] = lc_data[11];
    codeword[10] = lc_data[10];
    codeword[11] = lc_data[9];

    let rs = rs_129();
    if !rs.check(&codeword) {
        return None;
    }
    let mut data = [0u8; 9];
    data.copy_from_slice(&lc_data[..9]);
    Some(LinkControl::from_bytes(&data))
}

/// Decoded privacy-indicator LC (carries algorithm ID and key ID rather
/// than the full LC's service-option/address fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrivacyLc {
    pub algorithm_id: u8,
    pub key_id: u8,
    pub dst_id: u32,
}

impl PrivacyLc {
    fn to_bytes(self) -> [u8; LC_HEADER_LENGTH_BYTES] {
        let mut out = [0u8; LC_HEADER_LENGTH_BYTES];
        out[1] = self.algorithm_id;
        out[2] = self.key_id;
        out[3] = (self.dst_id >> 16) as u8;
        out[4] = (self.dst_id >> 8) as u8;
        out[5] = self.dst_id as u8;
        out
    }

    fn from_bytes(data: &[u8; LC_HEADER_LENGTH_BYTES]) -> Self {
        Self {
            algorithm_id: data[1],
            key_id: data[2],
            dst_id: (u32::from(data[3]) << 16) | (u32::from(data[4]) << 8) | u32::from(data[5]),
        }
    }
}

/// Encode a privacy-indicator LC: CRC-CCITT-16 protected (not RS), masked
/// with [`PI_HEADER_CRC_MASK`], then BPTC(196,96)-wrapped.
#[must_use]
pub fn encode_pi(lc: &PrivacyLc) -> [u8; 25] {
    let mut lc_data = [0u8; 12];
    lc_data[..9].copy_from_slice(&lc.to_bytes());

    lc_data[10] ^= PI_HEADER_CRC_MASK[0];
    lc_data[11] ^= PI_HEADER_CRC_MASK[1];
    let computed = crc::crc16_ccitt(&lc_data);
    lc_data[10] = (computed >> 8) as u8;
    lc_data[11] = computed as u8;
    lc_data[10] ^= PI_HEADER_CRC_MASK[0];
    lc_data[11] ^= PI_HEADER_CRC_MASK[1];

    bptc::encode(&lc_data)
}

/// Decode a privacy-indicator LC. Per the upstream network behavior, a
/// zeroed CRC field (both bytes `0x00`) means the sender never populated
/// it; in that case the payload is trusted without verification.
#[must_use]
pub fn decode_pi(block: &[u8; 25]) -> Option<PrivacyLc> {
    let mut lc_data = bptc::decode(block);

    if lc_data[10] != 0x00 || lc_data[11] != 0x00 {
        lc_data[10] ^= PI_HEADER_CRC_MASK[0];
        lc_data[11] ^= PI_HEADER_CRC_MASK[1];
        let expected = (u16::from(lc_data[10]) << 8) | u16::from(lc_data[11]);
        let mut check_data = lc_data;
        check_data[10] = 0;
        check_data[11] = 0;
        if !crc::verify_crc16(&check_data, expected) {
            return None;
        }
        lc_data[10] ^= PI_HEADER_CRC_MASK[0];
        lc_data[11] ^= PI_HEADER_CRC_MASK[1];
    }

    let mut data = [0u8; 9];
    data.copy_from_slice(&lc_data[..9]);
    Some(PrivacyLc::from_bytes(&data))
}

/// Short-Link Control Opcode (`SLCO`), carried in the 2 high bits of a
/// Short LC's 12-bit payload (ETSI TS 102 361-1 `SLCO::E`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortLco {
    None,
    Act,
    Tscc,
    Payload,
}

impl ShortLco {
    #[must_use]
    pub fn from_wire(value: u8) -> Self {
        match value & 0x03 {
            0x00 => Self::None,
            0x01 => Self::Act,
            0x02 => Self::Tscc,
            _ => Self::Payload,
        }
    }

    #[must_use]
    pub fn to_wire(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Act => 0x01,
            Self::Tscc => 0x02,
            Self::Payload => 0x03,
        }
    }
}

/// Short Link Control: the 12-bit `{SLCO(2), data(10)}` payload carried in
/// voice burst B, Golay(24,12,8)-coded rather than BPTC-wrapped like the
/// Full LC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortLc {
    pub opcode: ShortLco,
    /// Low 10 bits significant.
    pub data: u16,
}

impl ShortLc {
    fn to_word(self) -> u16 {
        (u16::from(self.opcode.to_wire()) << 10) | (self.data & 0x03FF)
    }

    fn from_word(word: u16) -> Self {
        Self {
            opcode: ShortLco::from_wire((word >> 10) as u8),
            data: word & 0x03FF,
        }
    }
}

/// Encode a Short LC into its 24-bit Golay(24,12,8) codeword.
#[must_use]
pub fn encode_short_lc(lc: &ShortLc) -> u32 {
    golay24::encode(lc.to_word())
}

/// Decode a Short LC from its 24-bit Golay(24,12,8) codeword.
///
/// Per spec.md §4.1's best-effort FEC philosophy (also applied to BPTC),
/// the Golay decoder always returns a result; `corrected` reports whether
/// any bits were flipped to reach it, so the caller can weigh the result
/// against a downstream check before trusting it.
#[must_use]
pub fn decode_short_lc(codeword: u32) -> (ShortLc, bool) {
    let (word, corrected) = golay24::decode(codeword);
    (ShortLc::from_word(word), corrected)
}
