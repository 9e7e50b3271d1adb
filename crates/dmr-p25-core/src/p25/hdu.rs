// SPDX-License-Identifier: Apache-2.0 OR MIT

//! P25 Header Data Unit (spec.md §4.3): the frame that precedes a voice
//! superframe, carrying the destination TGID, MFID, crypto algorithm ID,
//! key ID, and the 9-byte initial Message Indicator, RS(36,20)-protected.

use crate::codec::reed_solomon::{ReedSolomon, RsError};
use crate::crypto::{Mi, MI_LENGTH_BYTES};
use crate::model::AlgorithmId;

const HDU_DATA_LEN: usize = 20;
const HDU_CODEWORD_LEN: usize = 36;

fn rs() -> ReedSolomon {
    ReedSolomon::new(HDU_CODEWORD_LEN, HDU_DATA_LEN)
}

/// A decoded HDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hdu {
    pub dst_tgid: u16,
    pub mfid: u8,
    pub algorithm: AlgorithmId,
    pub key_id: u16,
    pub mi: Mi,
}

/// Encode an [`Hdu`] into its 36-byte RS(36,20) on-wire codeword.
#[must_use]
pub fn encode(hdu: &Hdu) -> [u8; HDU_CODEWORD_LEN] {
    let mut data = [0u8; HDU_DATA_LEN];
    data[..MI_LENGTH_BYTES].copy_from_slice(hdu.mi.as_bytes());
    data[9] = hdu.mfid;
    data[10] = hdu.algorithm.to_wire();
    data[11] = (hdu.key_id >> 8) as u8;
    data[12] = hdu.key_id as u8;
    data[13] = (hdu.dst_tgid >> 8) as u8;
    data[14] = hdu.dst_tgid as u8;

    let encoded = rs().encode(&data);
    let mut out = [0u8; HDU_CODEWORD_LEN];
    out.copy_from_slice(&encoded);
    out
}

/// Decode a 36-byte RS(36,20) HDU codeword.
///
/// # Errors
/// Propagates [`RsError`] when the codeword has more errors than the code
/// can correct.
pub fn decode(block: &[u8; HDU_CODEWORD_LEN]) -> Result<Hdu, RsError> {
    let data = rs().decode(block)?;

    let mut mi_bytes = [0u8; MI_LENGTH_BYTES];
    mi_bytes.copy_from_slice(&data[..MI_LENGTH_BYTES]);

    Ok(Hdu {
        dst_tgid: (u16::from(data[13]) << 8) | u16::from(data[14]),
        mfid: data[9],
        algorithm: AlgorithmId::from_wire(data[10]),
        key_id: (u16::from(data[11]) << 8) | u16::from(data[12]),
        mi: Mi::new(mi_bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hdu_roundtrips() {
        let hdu = Hdu {
            dst_tgid: 2000,
            mfid: 0x90,
            algorithm: AlgorithmId::Aes256,
            key_id: 1,
            mi: Mi::new([1, 2, 3, 4, 5, 6, 7, 8, 9]),
        };
        let block = encode(&hdu);
        let decoded = decode(&block).unwrap();
        assert_eq!(decoded, hdu);
    }

    #[test]
    fn hdu_corrects_light_errors() {
        let hdu = Hdu {
            dst_tgid: 42,
            mfid: 0,
            algorithm: AlgorithmId::Arc4,
            key_id: 0x0002,
            mi: Mi::zero(),
        };
        let mut block = encode(&hdu);
        block[0] ^= 0x01;
        block[20] ^= 0xFF;
        let decoded = decode(&block).unwrap();
        assert_eq!(decoded, hdu);
    }

    #[test]
    fn unencrypted_roundtrips() {
        let hdu = Hdu {
            dst_tgid: 1,
            mfid: 0,
            algorithm: AlgorithmId::Unencrypted,
            key_id: 0,
            mi: Mi::zero(),
        };
        let block = encode(&hdu);
        assert_eq!(decode(&block).unwrap(), hdu);
    }
}
