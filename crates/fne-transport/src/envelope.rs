// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Preshared-key datagram envelope (spec.md §4.5, §6): a 16-byte AES
//! key-wrap header followed by the AES-CTR-encrypted remainder of the
//! datagram body. Used optionally, after the RTP/framing header, to
//! protect the FNE-to-peer link itself (distinct from the per-call P25
//! voice encryption in [`dmr_p25_core::crypto`]).
//!
//! The counter-mode keystream here follows the same "encrypt an expanding
//! counter block under the fixed key" construction as
//! [`dmr_p25_core::crypto::aes256_keystream`], but XORs the counter
//! ciphertext directly against the payload (true CTR) rather than
//! CBC-chaining it, since the preshared-key envelope has no per-call MI to
//! seed a chain from.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use ring::rand::{SecureRandom, SystemRandom};

pub const AES_WRAPPED_PCKT_KEY_LEN: usize = 16;

/// Envelope encode/decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("preshared key must be exactly {AES_WRAPPED_PCKT_KEY_LEN} bytes, got {0}")]
    BadKeyLength(usize),
    #[error("wrapped envelope shorter than its header: expected at least {AES_WRAPPED_PCKT_KEY_LEN} bytes, got {0}")]
    TooShort(usize),
    #[error("system RNG failed to generate a nonce")]
    RngFailure,
}

fn keystream(key: &[u8; AES_WRAPPED_PCKT_KEY_LEN], nonce: &[u8; AES_WRAPPED_PCKT_KEY_LEN], len: usize) -> Vec<u8> {
    let cipher = Aes128::new_from_slice(key).expect("AES-128 key is exactly 16 bytes");
    let mut out = Vec::with_capacity(len);
    let mut counter = u128::from_be_bytes(*nonce);
    while out.len() < len {
        let block = counter.to_be_bytes();
        let mut ga = GenericArray::clone_from_slice(&block);
        cipher.encrypt_block(&mut ga);
        out.extend_from_slice(ga.as_slice());
        counter = counter.wrapping_add(1);
    }
    out.truncate(len);
    out
}

/// Wrap `body` under `key`: prepends a random 16-byte nonce used as the
/// AES-CTR starting counter, then XORs the body with the resulting
/// keystream.
///
/// # Errors
/// Returns [`EnvelopeError::BadKeyLength`] if `key` is not 16 bytes.
pub fn wrap(key: &[u8], body: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    if key.len() != AES_WRAPPED_PCKT_KEY_LEN {
        return Err(EnvelopeError::BadKeyLength(key.len()));
    }
    let mut key_arr = [0u8; AES_WRAPPED_PCKT_KEY_LEN];
    key_arr.copy_from_slice(key);

    let mut nonce = [0u8; AES_WRAPPED_PCKT_KEY_LEN];
    SystemRandom::new().fill(&mut nonce).map_err(|_| EnvelopeError::RngFailure)?;

    let ks = keystream(&key_arr, &nonce, body.len());
    let mut out = Vec::with_capacity(AES_WRAPPED_PCKT_KEY_LEN + body.len());
    out.extend_from_slice(&nonce);
    out.extend(body.iter().zip(ks.iter()).map(|(b, k)| b ^ k));
    Ok(out)
}

/// Unwrap an envelope produced by [`wrap`].
///
/// # Errors
/// Returns [`EnvelopeError::BadKeyLength`] or [`EnvelopeError::TooShort`].
pub fn unwrap(key: &[u8], envelope: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    if key.len() != AES_WRAPPED_PCKT_KEY_LEN {
        return Err(EnvelopeError::BadKeyLength(key.len()));
    }
    if envelope.len() < AES_WRAPPED_PCKT_KEY_LEN {
        return Err(EnvelopeError::TooShort(envelope.len()));
    }
    let mut key_arr = [0u8; AES_WRAPPED_PCKT_KEY_LEN];
    key_arr.copy_from_slice(key);
    let mut nonce = [0u8; AES_WRAPPED_PCKT_KEY_LEN];
    nonce.copy_from_slice(&envelope[..AES_WRAPPED_PCKT_KEY_LEN]);

    let ciphertext = &envelope[AES_WRAPPED_PCKT_KEY_LEN..];
    let ks = keystream(&key_arr, &nonce, ciphertext.len());
    Ok(ciphertext.iter().zip(ks.iter()).map(|(b, k)| b ^ k).collect())
}
