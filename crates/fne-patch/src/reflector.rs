// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `mmdvmP25Reflector` framing (spec.md §4.7): the per-IMBE 11-byte record
//! set an external MMDVM-gateway P25 peer speaks, `REC62`..`REC73` plus the
//! `REC80` end-of-call marker. Kept byte-compatible with upstream MMDVM so a
//! gateway built against that framing needs no DFSI awareness.

use dmr_p25_core::crypto::{Mi, MI_LENGTH_BYTES};
use dmr_p25_core::model::AlgorithmId;
use dmr_p25_core::p25::consts::RAW_IMBE_LENGTH_BYTES;
use dmr_p25_core::p25::lc::{LcBody, LinkControl};
use dmr_p25_core::p25::ldu::{EncryptionSync, ImbeCodewords, Ldu1Frame, Ldu2Frame};

/// Tag byte for the end-of-call record.
pub const END_OF_CALL_TAG: u8 = 0x80;

/// LDU1 record tags, one per IMBE codeword, in transmission order.
pub const LDU1_TAGS: [u8; 9] = [0x62, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0x6A];
/// LDU2 record tags, one per IMBE codeword, in transmission order.
pub const LDU2_TAGS: [u8; 9] = [0x6B, 0x6C, 0x6D, 0x6E, 0x6F, 0x70, 0x71, 0x72, 0x73];

/// A single decoded MMDVM P25 reflector record.
#[derive(Debug, Clone)]
pub enum MmdvmRecord {
    /// One IMBE codeword from an LDU1 record set, plus whatever ancillary
    /// LC field that tag number carries.
    Ldu1 { tag: u8, imbe: [u8; RAW_IMBE_LENGTH_BYTES] },
    /// One IMBE codeword from an LDU2 record set, plus whatever ancillary
    /// MI/algorithm field that tag number carries.
    Ldu2 { tag: u8, imbe: [u8; RAW_IMBE_LENGTH_BYTES] },
    EndOfCall,
}

/// Reflector frame decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReflectorError {
    #[error("reflector record too short: expected at least {expected}, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("unrecognized reflector record tag 0x{0:02X}")]
    UnknownTag(u8),
}

fn template_len(tag: u8) -> usize {
    match tag {
        0x62 | 0x6B => 22,
        0x63 | 0x6C => 14,
        0x6A | 0x73 => 16,
        0x80 => 17,
        _ => 17,
    }
}

fn imbe_offset(tag: u8) -> usize {
    match tag {
        0x62 | 0x6B => 10,
        0x63 | 0x6C => 1,
        _ => 5,
    }
}

/// Encode the nine `REC62`..`REC6A` records that carry one LDU1 frame.
#[must_use]
pub fn encode_ldu1(frame: &Ldu1Frame, lsd1: u8, lsd2: u8, end: bool) -> Vec<Vec<u8>> {
    let (lco, dst_id, src_id) = link_control_fields(&frame.lc);

    let mut records = Vec::with_capacity(10);
    for (i, &tag) in LDU1_TAGS.iter().enumerate() {
        let mut buf = vec![0u8; template_len(tag)];
        buf[0] = tag;
        match tag {
            0x64 => {
                buf[1] = lco;
                buf[2] = frame.lc.mfid;
            }
            0x65 => {
                buf[1] = (dst_id >> 16) as u8;
                buf[2] = (dst_id >> 8) as u8;
                buf[3] = dst_id as u8;
            }
            0x66 => {
                buf[1] = (src_id >> 16) as u8;
                buf[2] = (src_id >> 8) as u8;
                buf[3] = src_id as u8;
            }
            0x6A => {
                buf[1] = lsd1;
                buf[2] = lsd2;
            }
            _ => {}
        }
        let off = imbe_offset(tag);
        buf[off..off + RAW_IMBE_LENGTH_BYTES].copy_from_slice(&frame.imbe[i]);
        records.push(buf);
    }

    if end {
        records.push(end_of_call_record());
    }
    records
}

/// Encode the nine `REC6B`..`REC73` records that carry one LDU2 frame.
#[must_use]
pub fn encode_ldu2(frame: &Ldu2Frame, lsd1: u8, lsd2: u8, end: bool) -> Vec<Vec<u8>> {
    let mi = frame.enc_sync.mi.as_bytes();
    let key_id = frame.enc_sync.key_id;

    let mut records = Vec::with_capacity(10);
    for (i, &tag) in LDU2_TAGS.iter().enumerate() {
        let mut buf = vec![0u8; template_len(tag)];
        buf[0] = tag;
        match tag {
            0x6D => buf[1..4].copy_from_slice(&mi[0..3]),
            0x6E => buf[1..4].copy_from_slice(&mi[3..6]),
            0x6F => buf[1..4].copy_from_slice(&mi[6..9]),
            0x70 => {
                buf[1] = frame.enc_sync.algorithm.to_wire();
                buf[2] = (key_id >> 8) as u8;
                buf[3] = key_id as u8;
            }
            0x73 => {
                buf[1] = lsd1;
                buf[2] = lsd2;
            }
            _ => {}
        }
        let off = imbe_offset(tag);
        buf[off..off + RAW_IMBE_LENGTH_BYTES].copy_from_slice(&frame.imbe[i]);
        records.push(buf);
    }

    if end {
        records.push(end_of_call_record());
    }
    records
}

fn end_of_call_record() -> Vec<u8> {
    let mut buf = vec![0u8; 17];
    buf[0] = END_OF_CALL_TAG;
    buf
}

fn link_control_fields(lc: &LinkControl) -> (u8, u32, u32) {
    match lc.body {
        LcBody::GroupVoice { dst_tgid, src_id, .. } => (lc.lco.to_wire(), u32::from(dst_tgid), src_id),
        LcBody::UnitVoice { dst_id, src_id, .. } => (lc.lco.to_wire(), dst_id, src_id),
        LcBody::CallTermination { src_id } => (lc.lco.to_wire(), 0, src_id),
        LcBody::Raw(_) => (lc.lco.to_wire(), 0, 0),
    }
}

/// Decode one reflector record by its leading tag byte.
///
/// # Errors
/// Returns [`ReflectorError::TooShort`] or [`ReflectorError::UnknownTag`].
pub fn decode_record(bytes: &[u8]) -> Result<MmdvmRecord, ReflectorError> {
    if bytes.is_empty() {
        return Err(ReflectorError::TooShort { expected: 1, actual: 0 });
    }
    let tag = bytes[0];
    if tag == END_OF_CALL_TAG {
        return Ok(MmdvmRecord::EndOfCall);
    }

    let off = imbe_offset(tag);
    if bytes.len() < off + RAW_IMBE_LENGTH_BYTES {
        return Err(ReflectorError::TooShort { expected: off + RAW_IMBE_LENGTH_BYTES, actual: bytes.len() });
    }
    let mut imbe = [0u8; RAW_IMBE_LENGTH_BYTES];
    imbe.copy_from_slice(&bytes[off..off + RAW_IMBE_LENGTH_BYTES]);

    if LDU1_TAGS.contains(&tag) {
        Ok(MmdvmRecord::Ldu1 { tag, imbe })
    } else if LDU2_TAGS.contains(&tag) {
        Ok(MmdvmRecord::Ldu2 { tag, imbe })
    } else {
        Err(ReflectorError::UnknownTag(tag))
    }
}

/// Reassembles a full LDU1 or LDU2 record set from individual records,
/// since the gateway sends one UDP datagram per record rather than one
/// per LDU (spec.md §4.7: "destination-side MI is regenerated per LDU2
/// record set").
#[derive(Debug, Default)]
pub struct RecordSetAssembler {
    ldu1_imbe: [Option<[u8; RAW_IMBE_LENGTH_BYTES]>; 9],
    ldu2_imbe: [Option<[u8; RAW_IMBE_LENGTH_BYTES]>; 9],
    mi_bytes: [u8; MI_LENGTH_BYTES],
    algorithm: AlgorithmId,
    key_id: u16,
}

impl RecordSetAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self { algorithm: AlgorithmId::Unencrypted, ..Default::default() }
    }

    /// Feed one decoded record into the assembler, returning a completed
    /// LDU1 frame once all nine of its records have arrived. The caller
    /// supplies the Link Control to attach (the reflector protocol does
    /// not carry a full LC, only LCO/dst/src, so fields not representable
    /// fall back to what was last known).
    pub fn feed_ldu1(&mut self, tag: u8, imbe: [u8; RAW_IMBE_LENGTH_BYTES]) -> Option<ImbeCodewords> {
        let idx = LDU1_TAGS.iter().position(|&t| t == tag)?;
        self.ldu1_imbe[idx] = Some(imbe);
        if self.ldu1_imbe.iter().all(Option::is_some) {
            let codewords: ImbeCodewords = std::array::from_fn(|i| self.ldu1_imbe[i].take().unwrap());
            Some(codewords)
        } else {
            None
        }
    }

    pub fn feed_ldu2_mi_fragment(&mut self, tag: u8, fragment: &[u8; 3]) {
        match tag {
            0x6D => self.mi_bytes[0..3].copy_from_slice(fragment),
            0x6E => self.mi_bytes[3..6].copy_from_slice(fragment),
            0x6F => self.mi_bytes[6..9].copy_from_slice(fragment),
            _ => {}
        }
    }

    pub fn feed_ldu2_key(&mut self, algorithm: AlgorithmId, key_id: u16) {
        self.algorithm = algorithm;
        self.key_id = key_id;
    }

    /// Feed one decoded LDU2 record, returning the completed codewords and
    /// regenerated encryption-sync block once all nine have arrived.
    pub fn feed_ldu2(&mut self, tag: u8, imbe: [u8; RAW_IMBE_LENGTH_BYTES]) -> Option<(ImbeCodewords, EncryptionSync)> {
        let idx = LDU2_TAGS.iter().position(|&t| t == tag)?;
        self.ldu2_imbe[idx] = Some(imbe);
        if self.ldu2_imbe.iter().all(Option::is_some) {
            let codewords: ImbeCodewords = std::array::from_fn(|i| self.ldu2_imbe[i].take().unwrap());
            let enc_sync = EncryptionSync {
                mi: Mi::new(self.mi_bytes),
                algorithm: self.algorithm,
                key_id: self.key_id,
            };
            Some((codewords, enc_sync))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmr_p25_core::p25::consts::Lco;

    fn sample_imbe() -> ImbeCodewords {
        std::array::from_fn(|i| {
            let mut cw = [0u8; RAW_IMBE_LENGTH_BYTES];
            cw[0] = i as u8;
            cw
        })
    }

    #[test]
    fn ldu1_round_trips_through_record_set() {
        let lc = LinkControl::new(
            Lco::GroupVoice,
            LcBody::GroupVoice { svc_options: 0, dst_tgid: 100, src_id: 10 },
        );
        let frame = Ldu1Frame { imbe: sample_imbe(), lc };
        let records = encode_ldu1(&frame, 0, 0, false);
        assert_eq!(records.len(), 9);

        let mut asm = RecordSetAssembler::new();
        let mut result = None;
        for record in &records {
            match decode_record(record).unwrap() {
                MmdvmRecord::Ldu1 { tag, imbe } => result = asm.feed_ldu1(tag, imbe).or(result),
                other => panic!("unexpected record: {other:?}"),
            }
        }
        assert_eq!(result.unwrap(), frame.imbe);
    }

    #[test]
    fn ldu2_round_trips_mi_and_key_through_record_set() {
        let enc_sync = EncryptionSync { mi: Mi::new([1, 2, 3, 4, 5, 6, 7, 8, 9]), algorithm: AlgorithmId::Arc4, key_id: 0x0002 };
        let frame = Ldu2Frame { imbe: sample_imbe(), enc_sync };
        let records = encode_ldu2(&frame, 0, 0, true);
        assert_eq!(records.len(), 10);

        let mut asm = RecordSetAssembler::new();
        let mut result = None;
        let mut saw_end = false;
        for record in &records {
            match decode_record(record).unwrap() {
                MmdvmRecord::Ldu2 { tag, imbe } => {
                    if let 0x6D | 0x6E | 0x6F = tag {
                        let mut frag = [0u8; 3];
                        frag.copy_from_slice(&record[1..4]);
                        asm.feed_ldu2_mi_fragment(tag, &frag);
                    }
                    if tag == 0x70 {
                        asm.feed_ldu2_key(AlgorithmId::from_wire(record[1]), (u16::from(record[2]) << 8) | u16::from(record[3]));
                    }
                    result = asm.feed_ldu2(tag, imbe).or(result);
                }
                MmdvmRecord::EndOfCall => saw_end = true,
                other => panic!("unexpected record: {other:?}"),
            }
        }
        let (imbe, sync) = result.unwrap();
        assert_eq!(imbe, frame.imbe);
        assert_eq!(sync, enc_sync);
        assert!(saw_end);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(decode_record(&[0x99, 0, 0]).unwrap_err(), ReflectorError::UnknownTag(0x99));
    }
}
