// SPDX-License-Identifier: Apache-2.0 OR MIT

//! P25 LDU1/LDU2 voice frames (spec.md §4.3): nine 11-byte IMBE codewords
//! plus an interleaved link-control or encryption-sync block.
//!
//! This module works on the *payload* of an LDU superframe — after the
//! 6-byte sync and 8-byte NID have been stripped by the caller (typically
//! via [`super::nid`]) and the per-72-bit status symbols have been removed
//! from the surrounding bitstream by [`super::nid::strip_status_symbols`].
//! IMBE content is opaque here: the codec never inspects codeword bits,
//! only locates and replaces them, matching spec.md §1's "vocoder content
//! is opaque payload" non-goal.

use crate::crypto::{Mi, MI_LENGTH_BYTES};
use crate::model::AlgorithmId;
use crate::p25::lc::{LcBody, LinkControl};
use crate::codec::reed_solomon::{ReedSolomon, RsError};

use super::consts::{Lco, RAW_IMBE_LENGTH_BYTES};

/// Nine IMBE codewords, 11 bytes each, one per LDU voice frame.
pub type ImbeCodewords = [[u8; RAW_IMBE_LENGTH_BYTES]; 9];

const ENC_SYNC_DATA_LEN: usize = 12;
const ENC_SYNC_CODEWORD_LEN: usize = 24;

fn enc_sync_rs() -> ReedSolomon {
    ReedSolomon::new(ENC_SYNC_CODEWORD_LEN, ENC_SYNC_DATA_LEN)
}

/// LDU2's encryption-sync block: the MI update and key metadata for the
/// call's crypto state (spec.md §4.3: "LDU2 carries the MI update and key
/// metadata").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionSync {
    pub mi: Mi,
    pub algorithm: AlgorithmId,
    pub key_id: u16,
}

#[must_use]
pub fn encode_encryption_sync(sync: &EncryptionSync) -> [u8; ENC_SYNC_CODEWORD_LEN] {
    let mut data = [0u8; ENC_SYNC_DATA_LEN];
    data[..MI_LENGTH_BYTES].copy_from_slice(sync.mi.as_bytes());
    data[9] = sync.algorithm.to_wire();
    data[10] = (sync.key_id >> 8) as u8;
    data[11] = sync.key_id as u8;

    let encoded = enc_sync_rs().encode(&data);
    let mut out = [0u8; ENC_SYNC_CODEWORD_LEN];
    out.copy_from_slice(&encoded);
    out
}

/// # Errors
/// Propagates [`RsError`] when the codeword has more errors than the code
/// can correct.
pub fn decode_encryption_sync(
    block: &[u8; ENC_SYNC_CODEWORD_LEN],
) -> Result<EncryptionSync, RsError> {
    let data = enc_sync_rs().decode(block)?;
    let mut mi_bytes = [0u8; MI_LENGTH_BYTES];
    mi_bytes.copy_from_slice(&data[..MI_LENGTH_BYTES]);
    Ok(EncryptionSync {
        mi: Mi::new(mi_bytes),
        algorithm: AlgorithmId::from_wire(data[9]),
        key_id: (u16::from(data[10]) << 8) | u16::from(data[11]),
    })
}

/// A decoded LDU1 frame: nine IMBE codewords plus the voice call's full
/// Link Control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ldu1Frame {
    pub imbe: ImbeCodewords,
    pub lc: LinkControl,
}

/// A decoded LDU2 frame: nine IMBE codewords plus the encryption-sync block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ldu2Frame {
    pub imbe: ImbeCodewords,
    pub enc_sync: EncryptionSync,
}

/// Apply a crypto keystream, byte-wise, to every IMBE codeword in place
/// (`crypt_imbe` applied per-frame: spec.md §4.3 "the core must not attempt
/// to decode audio", so encryption is purely a byte XOR over the 9 opaque
/// codewords).
pub fn crypt_imbe_frames(imbe: &mut ImbeCodewords, crypto: &crate::crypto::P25Crypto) -> Result<(), crate::crypto::CryptoError> {
    for codeword in imbe.iter_mut() {
        crypto.crypt_imbe(codeword)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_imbe() -> ImbeCodewords {
        std::array::from_fn(|i| {
            let mut cw = [0u8; RAW_IMBE_LENGTH_BYTES];
            cw[0] = i as u8;
            cw
        })
    }

    #[test]
    fn encryption_sync_roundtrips() {
        let sync = EncryptionSync {
            mi: Mi::new([1, 2, 3, 4, 5, 6, 7, 8, 9]),
            algorithm: AlgorithmId::Arc4,
            key_id: 0x0002,
        };
        let block = encode_encryption_sync(&sync);
        let decoded = decode_encryption_sync(&block).unwrap();
        assert_eq!(decoded, sync);
    }

    #[test]
    fn encryption_sync_corrects_light_errors() {
        let sync = EncryptionSync {
            mi: Mi::zero(),
            algorithm: AlgorithmId::Aes256,
            key_id: 1,
        };
        let mut block = encode_encryption_sync(&sync);
        block[2] ^= 0xFF;
        assert_eq!(decode_encryption_sync(&block).unwrap(), sync);
    }

    #[test]
    fn ldu1_frame_carries_group_voice_lc() {
        let lc = LinkControl::new(
            Lco::GroupVoice,
            LcBody::GroupVoice {
                svc_options: 0,
                dst_tgid: 100,
                src_id: 10,
            },
        );
        let frame = Ldu1Frame {
            imbe: sample_imbe(),
            lc,
        };
        assert_eq!(frame.imbe[3][0], 3);
        assert_eq!(
            frame.lc.body,
            LcBody::GroupVoice {
                svc_options: 0,
                dst_tgid: 100,
                src_id: 10,
            }
        );
    }

    #[test]
    fn crypt_imbe_frames_is_involution() {
        use crate::model::AlgorithmId as Alg;
        let mut crypto = crate::crypto::P25Crypto::new();
        crypto.set_tek(Alg::Aes256, vec![0x11; 32], 1).unwrap();

        let original = sample_imbe();
        let mut frames = original.clone();
        crypt_imbe_frames(&mut frames, &crypto).unwrap();
        assert_ne!(frames, original);
        crypt_imbe_frames(&mut frames, &crypto).unwrap();
        assert_eq!(frames, original);
    }
}
