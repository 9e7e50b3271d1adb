// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-direction patch state: one side's TEK, its call lifecycle, and the
//! crypto context that decrypts/re-encrypts its IMBE traffic (spec.md §4.7).

use dmr_p25_core::crypto::{Mi, P25Crypto};
use dmr_p25_core::model::AlgorithmId;

use crate::kmm::KeyDelivery;

/// One side of a patch (source or destination talkgroup).
pub struct PatchDirection {
    pub tgid: u32,
    pub slot: u8,
    crypto: P25Crypto,
    tek_loaded: bool,
    stream_id: Option<u32>,
    call_started_ms: Option<u64>,
    /// `(algorithm, key_id)` of a TEK this direction is configured for but
    /// has not yet received, awaiting a KMM `MODIFY_KEY_CMD` (spec.md §4.7).
    awaiting_key: Option<(AlgorithmId, u16)>,
}

impl PatchDirection {
    #[must_use]
    pub fn new(tgid: u32, slot: u8) -> Self {
        Self {
            tgid,
            slot,
            crypto: P25Crypto::new(),
            tek_loaded: false,
            stream_id: None,
            call_started_ms: None,
            awaiting_key: None,
        }
    }

    /// Mark this direction as configured for `(algorithm, key_id)` but
    /// without key material yet: the engine must issue a KMM
    /// `INVENTORY_CMD` and hold traffic until the key arrives.
    pub fn mark_awaiting_key(&mut self, algorithm: AlgorithmId, key_id: u16) {
        self.awaiting_key = Some((algorithm, key_id));
    }

    /// `(algorithm, key_id)` to request over KMM, if this direction is
    /// still waiting on one.
    #[must_use]
    pub fn pending_key_request(&self) -> Option<(AlgorithmId, u16)> {
        self.awaiting_key
    }

    /// Apply a KMM key delivery if it satisfies this direction's pending
    /// request. Returns whether the key was consumed.
    ///
    /// # Errors
    /// Propagates [`dmr_p25_core::crypto::CryptoError`] for a malformed key.
    pub fn apply_key_delivery(
        &mut self,
        delivery: &KeyDelivery,
    ) -> Result<bool, dmr_p25_core::crypto::CryptoError> {
        if self.awaiting_key != Some((delivery.algorithm, delivery.key_id)) {
            return Ok(false);
        }
        self.load_tek(delivery.algorithm, delivery.key_bytes.clone(), delivery.key_id)?;
        self.awaiting_key = None;
        Ok(true)
    }

    /// Load this direction's traffic encryption key, delivered by a KMM
    /// `MODIFY_KEY_CMD` or supplied directly from configuration.
    ///
    /// # Errors
    /// Propagates [`dmr_p25_core::crypto::CryptoError`] for a malformed key.
    pub fn load_tek(
        &mut self,
        algorithm: AlgorithmId,
        key: Vec<u8>,
        key_id: u16,
    ) -> Result<(), dmr_p25_core::crypto::CryptoError> {
        self.crypto.set_tek(algorithm, key, key_id)?;
        self.tek_loaded = true;
        Ok(())
    }

    /// Whether a TEK has been loaded (unencrypted traffic never needs one).
    #[must_use]
    pub fn is_ready(&self, requires_key: bool) -> bool {
        !requires_key || self.tek_loaded
    }

    #[must_use]
    pub fn algorithm(&self) -> AlgorithmId {
        self.crypto.algorithm()
    }

    #[must_use]
    pub fn key_id(&self) -> u16 {
        self.crypto.key_id()
    }

    #[must_use]
    pub fn mi(&self) -> Mi {
        self.crypto.mi()
    }

    #[must_use]
    pub fn crypto_ref(&self) -> &P25Crypto {
        &self.crypto
    }

    pub fn set_mi(&mut self, mi: Mi) {
        self.crypto.set_mi(mi);
    }

    /// Begin a call on this direction at `now_ms`, resetting the MI to the
    /// value carried by the first LDU1 of the inbound call.
    pub fn start_call(&mut self, stream_id: u32, mi: Mi, now_ms: u64) {
        self.stream_id = Some(stream_id);
        self.call_started_ms = Some(now_ms);
        self.crypto.set_mi(mi);
    }

    #[must_use]
    pub fn stream_id(&self) -> Option<u32> {
        self.stream_id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.stream_id.is_some()
    }

    /// Advance the MI by one LDU, independently of the other direction.
    pub fn advance_mi(&mut self) {
        self.crypto.advance_mi();
    }

    /// XOR-apply this direction's keystream over an IMBE frame in place.
    ///
    /// # Errors
    /// Propagates [`dmr_p25_core::crypto::CryptoError`].
    pub fn crypt_imbe(&self, frame: &mut [u8]) -> Result<(), dmr_p25_core::crypto::CryptoError> {
        self.crypto.crypt_imbe(frame)
    }

    /// End the current call and report its duration in milliseconds.
    ///
    /// Idempotent: calling this on an already-inactive direction is a no-op
    /// that returns `None`.
    pub fn end_call(&mut self, now_ms: u64) -> Option<u64> {
        let started = self.call_started_ms.take()?;
        self.stream_id = None;
        Some(now_ms.saturating_sub(started))
    }
}
