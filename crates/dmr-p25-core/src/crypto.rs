// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Link-layer voice keystream generation (C9): AES-256 and ARC4 IMBE
//! keystreams, and the per-call Message Indicator (MI) that seeds them,
//! per spec.md §4.3/§4.8 and ETSI TS 102 361-4.
//!
//! This module never decodes audio: it only produces and applies a
//! byte-wise keystream over opaque IMBE/AMBE codeword bytes.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes256;

use crate::model::AlgorithmId;

/// Length in bytes of a P25 Message Indicator.
pub const MI_LENGTH_BYTES: usize = 9;

/// A P25 Message Indicator: the per-call seed for the link-layer keystream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mi(pub [u8; MI_LENGTH_BYTES]);

impl Mi {
    #[must_use]
    pub fn new(bytes: [u8; MI_LENGTH_BYTES]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn zero() -> Self {
        Self([0u8; MI_LENGTH_BYTES])
    }

    /// Advance the MI by one LDU (spec.md §4.3, §9 Open Question).
    ///
    /// The source material references ETSI TS 102 361-4 without fully
    /// parametrising the step function; this implementation resolves that
    /// ambiguity explicitly (spec.md §9) with a single, swappable LFSR-style
    /// byte shift: the 9-byte MI is treated as a big shift register with
    /// feedback taps at bytes 0, 1, 3, and 8, shifted left by one byte per
    /// call. Isolating the step here means the exact polynomial can be
    /// replaced without touching any caller.
    pub fn advance(&mut self) {
        let feedback = self.0[0] ^ self.0[1] ^ self.0[3] ^ self.0[8];
        for i in 0..MI_LENGTH_BYTES - 1 {
            self.0[i] = self.0[i + 1];
        }
        self.0[MI_LENGTH_BYTES - 1] = feedback;
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; MI_LENGTH_BYTES] {
        &self.0
    }
}

/// Generate `len` bytes of AES-256 keystream by CBC-mode-encrypting an
/// expanding 16-byte counter seeded by `mi` (spec.md §4.3).
///
/// Block `i`'s plaintext is a zero-padded little-endian counter `i`; it is
/// XORed with the previous ciphertext block (CBC chaining, with the MI
/// zero-padded to 16 bytes as the initial chaining value) and encrypted
/// under `key`.
#[must_use]
pub fn aes256_keystream(key: &[u8; 32], mi: &Mi, len: usize) -> Vec<u8> {
    let cipher = Aes256::new_from_slice(key).expect("AES-256 key is exactly 32 bytes");

    let mut chain = [0u8; 16];
    chain[..MI_LENGTH_BYTES].copy_from_slice(mi.as_bytes());

    let mut out = Vec::with_capacity(len);
    let mut counter: u64 = 0;
    while out.len() < len {
        let mut block = [0u8; 16];
        block[..8].copy_from_slice(&counter.to_le_bytes());
        for i in 0..16 {
            block[i] ^= chain[i];
        }
        let mut ga = GenericArray::clone_from_slice(&block);
        cipher.encrypt_block(&mut ga);
        chain.copy_from_slice(ga.as_slice());
        out.extend_from_slice(&chain);
        counter = counter.wrapping_add(1);
    }
    out.truncate(len);
    out
}

/// Generate `len` bytes of ARC4 keystream from `key`, per ETSI TS 102 361-4:
/// the key schedule discards its first 256 bytes of output before any
/// keystream is used operationally.
#[must_use]
pub fn arc4_keystream(key: &[u8], len: usize) -> Vec<u8> {
    const DISCARD: usize = 256;

    let mut s: [u8; 256] = std::array::from_fn(|i| i as u8);
    let mut j: u8 = 0;
    for i in 0..256 {
        j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
        s.swap(i, j as usize);
    }

    let mut i: u8 = 0;
    let mut j: u8 = 0;
    let mut next = |s: &mut [u8; 256]| -> u8 {
        i = i.wrapping_add(1);
        j = j.wrapping_add(s[i as usize]);
        s.swap(i as usize, j as usize);
        let idx = s[i as usize].wrapping_add(s[j as usize]);
        s[idx as usize]
    };

    for _ in 0..DISCARD {
        next(&mut s);
    }

    (0..len).map(|_| next(&mut s)).collect()
}

/// Errors from [`P25Crypto`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("no traffic encryption key loaded")]
    NoKey,
    #[error("unsupported algorithm for keystream generation: {0:?}")]
    UnsupportedAlgorithm(AlgorithmId),
    #[error("AES-256 key must be exactly 32 bytes, got {0}")]
    BadKeyLength(usize),
}

/// Per-call/per-direction crypto context: holds the active TEK, the current
/// MI, and produces/applies the IMBE keystream (spec.md §4.3, §4.7).
#[derive(Clone)]
pub struct P25Crypto {
    algorithm: AlgorithmId,
    key: Vec<u8>,
    key_id: u16,
    mi: Mi,
}

impl P25Crypto {
    #[must_use]
    pub fn new() -> Self {
        Self {
            algorithm: AlgorithmId::Unencrypted,
            key: Vec::new(),
            key_id: 0,
            mi: Mi::zero(),
        }
    }

    /// `set_tek(alg, key, key_id)` per spec.md §4.3.
    ///
    /// # Errors
    /// Returns [`CryptoError::BadKeyLength`] if `algorithm` is AES-256 and
    /// `key` is not 32 bytes.
    pub fn set_tek(
        &mut self,
        algorithm: AlgorithmId,
        key: Vec<u8>,
        key_id: u16,
    ) -> Result<(), CryptoError> {
        if algorithm == AlgorithmId::Aes256 && key.len() != 32 {
            return Err(CryptoError::BadKeyLength(key.len()));
        }
        self.algorithm = algorithm;
        self.key = key;
        self.key_id = key_id;
        Ok(())
    }

    pub fn set_mi(&mut self, mi: Mi) {
        self.mi = mi;
    }

    #[must_use]
    pub fn mi(&self) -> Mi {
        self.mi
    }

    #[must_use]
    pub fn algorithm(&self) -> AlgorithmId {
        self.algorithm
    }

    #[must_use]
    pub fn key_id(&self) -> u16 {
        self.key_id
    }

    pub fn advance_mi(&mut self) {
        self.mi.advance();
    }

    /// Generate `len` bytes of keystream under the loaded TEK and current MI.
    ///
    /// # Errors
    /// [`CryptoError::NoKey`] if unencrypted or no key has been loaded;
    /// [`CryptoError::UnsupportedAlgorithm`] for DES-OFB (out of scope: the
    /// core forwards DES-encrypted audio opaquely but cannot itself
    /// generate its keystream).
    pub fn generate_keystream(&self, len: usize) -> Result<Vec<u8>, CryptoError> {
        match self.algorithm {
            AlgorithmId::Unencrypted => Err(CryptoError::NoKey),
            AlgorithmId::Aes256 => {
                let mut key = [0u8; 32];
                if self.key.len() != 32 {
                    return Err(CryptoError::BadKeyLength(self.key.len()));
                }
                key.copy_from_slice(&self.key);
                Ok(aes256_keystream(&key, &self.mi, len))
            }
            AlgorithmId::Arc4 => {
                if self.key.is_empty() {
                    return Err(CryptoError::NoKey);
                }
                // Seed the RC4 key schedule with key || MI, matching the
                // DVM convention of keying ARC4 from TEK + per-call MI.
                let mut seed = self.key.clone();
                seed.extend_from_slice(self.mi.as_bytes());
                Ok(arc4_keystream(&seed, len))
            }
            other @ AlgorithmId::DesOfb | other @ AlgorithmId::Unknown(_) => {
                Err(CryptoError::UnsupportedAlgorithm(other))
            }
        }
    }

    /// XOR-apply the keystream over an IMBE/AMBE frame in place
    /// (`crypt_imbe`): symmetric, so the same call encrypts or decrypts.
    ///
    /// # Errors
    /// Propagates [`Self::generate_keystream`] errors.
    pub fn crypt_imbe(&self, frame: &mut [u8]) -> Result<(), CryptoError> {
        let keystream = self.generate_keystream(frame.len())?;
        for (b, k) in frame.iter_mut().zip(keystream.iter()) {
            *b ^= k;
        }
        Ok(())
    }
}

impl Default for P25Crypto {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for P25Crypto {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mi_advance_changes_state_deterministically() {
        let mut a = Mi::new([1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let mut b = a;
        a.advance();
        b.advance();
        assert_eq!(a, b);
        assert_ne!(a, Mi::new([1, 2, 3, 4, 5, 6, 7, 8, 9]));
    }

    #[test]
    fn mi_advance_is_not_fixed_point_for_nonzero_seed() {
        let mut mi = Mi::new([0xAA; 9]);
        let original = mi;
        mi.advance();
        assert_ne!(mi, original);
    }

    #[test]
    fn aes256_keystream_is_deterministic_and_not_all_zero() {
        let key = [0x11u8; 32];
        let mi = Mi::new([1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let a = aes256_keystream(&key, &mi, 33);
        let b = aes256_keystream(&key, &mi, 33);
        assert_eq!(a, b);
        assert_eq!(a.len(), 33);
        assert!(a.iter().any(|&b| b != 0));
    }

    #[test]
    fn aes256_keystream_differs_per_mi() {
        let key = [0x22u8; 32];
        let a = aes256_keystream(&key, &Mi::new([1; 9]), 16);
        let b = aes256_keystream(&key, &Mi::new([2; 9]), 16);
        assert_ne!(a, b);
    }

    #[test]
    fn arc4_keystream_is_deterministic() {
        let key = b"testkey1234567890";
        let a = arc4_keystream(key, 64);
        let b = arc4_keystream(key, 64);
        assert_eq!(a, b);
    }

    #[test]
    fn crypt_imbe_is_involution_under_same_state() {
        let mut ctx = P25Crypto::new();
        ctx.set_tek(AlgorithmId::Aes256, vec![0x33; 32], 1).unwrap();
        ctx.set_mi(Mi::new([9, 8, 7, 6, 5, 4, 3, 2, 1]));

        let original = [0xAAu8; 11];
        let mut frame = original;
        ctx.crypt_imbe(&mut frame).unwrap();
        assert_ne!(frame, original);
        ctx.crypt_imbe(&mut frame).unwrap();
        assert_eq!(frame, original);
    }

    #[test]
    fn cross_key_reencryption_changes_ciphertext() {
        // spec.md S4: decrypt under one TEK, re-encrypt under a different one.
        let mut src = P25Crypto::new();
        src.set_tek(AlgorithmId::Aes256, vec![0xAA; 32], 1).unwrap();
        src.set_mi(Mi::zero());

        let mut dst = P25Crypto::new();
        dst.set_tek(AlgorithmId::Arc4, b"dstkey".to_vec(), 2).unwrap();
        dst.set_mi(Mi::zero());

        let plaintext = [0x42u8; 11];
        let mut encrypted = plaintext;
        src.crypt_imbe(&mut encrypted).unwrap();
        assert_ne!(encrypted, plaintext);

        let mut decrypted = encrypted;
        src.crypt_imbe(&mut decrypted).unwrap();
        assert_eq!(decrypted, plaintext);

        let mut reencrypted = decrypted;
        dst.crypt_imbe(&mut reencrypted).unwrap();
        assert_ne!(reencrypted, decrypted);
        assert_ne!(reencrypted, encrypted);
    }

    #[test]
    fn no_key_loaded_is_an_error() {
        let ctx = P25Crypto::new();
        assert_eq!(
            ctx.generate_keystream(11).unwrap_err(),
            CryptoError::NoKey
        );
    }

    #[test]
    fn bad_aes_key_length_is_rejected() {
        let mut ctx = P25Crypto::new();
        assert_eq!(
            ctx.set_tek(AlgorithmId::Aes256, vec![0; 16], 1).unwrap_err(),
            CryptoError::BadKeyLength(16)
        );
    }
}
