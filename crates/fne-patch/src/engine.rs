// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Talkgroup patch engine: cross-TG forwarding with optional cross-key
//! re-encryption of P25 voice frames (spec.md §4.7, scenario S4).

use dmr_p25_core::crypto::CryptoError;
use dmr_p25_core::model::AlgorithmId;
use dmr_p25_core::p25::lc::{LcBody, LinkControl};
use dmr_p25_core::p25::ldu::{crypt_imbe_frames, EncryptionSync, Ldu1Frame, Ldu2Frame};

use crate::direction::PatchDirection;
use crate::kmm::{KmmMessage, PendingKeyRequests};

/// A single patch between two talkgroups, carrying each side's crypto
/// state independently (spec.md §4.7: "the patch must not assume both
/// sides share a key").
pub struct PatchEngine {
    pub src: PatchDirection,
    pub dst: PatchDirection,
    pending_keys: PendingKeyRequests,
}

impl PatchEngine {
    #[must_use]
    pub fn new(src: PatchDirection, dst: PatchDirection) -> Self {
        Self { src, dst, pending_keys: PendingKeyRequests::new() }
    }

    /// `(algorithm, key_id)` pairs this engine still needs to request over
    /// KMM, for any direction marked via [`PatchDirection::mark_awaiting_key`]
    /// that hasn't already been requested. Each pair returned is recorded as
    /// pending so a repeated call doesn't re-request it.
    pub fn take_pending_key_requests(&mut self) -> Vec<(AlgorithmId, u16)> {
        let mut out = Vec::new();
        for dir in [&self.src, &self.dst] {
            if let Some((algorithm, key_id)) = dir.pending_key_request() {
                if !self.pending_keys.is_pending(algorithm, key_id) {
                    self.pending_keys.record_request(algorithm, key_id);
                    out.push((algorithm, key_id));
                }
            }
        }
        out
    }

    /// Feed a decoded KMM message to the engine: a `MODIFY_KEY_CMD` loads
    /// the matching direction's TEK and unblocks forwarding for it; a `NAK`
    /// just clears the pending request so it isn't retried forever.
    ///
    /// # Errors
    /// Propagates [`CryptoError`] if a delivered key is malformed.
    pub fn handle_kmm(&mut self, message: &KmmMessage) -> Result<(), CryptoError> {
        match message {
            KmmMessage::ModifyKeyCmd(delivery) => {
                if self.src.apply_key_delivery(delivery)? || self.dst.apply_key_delivery(delivery)? {
                    self.pending_keys.resolve(delivery.algorithm, delivery.key_id);
                }
            }
            KmmMessage::Nak { status } => {
                log::warn!("KMM key request NAKed: {status:?}");
            }
            KmmMessage::Hello | KmmMessage::InventoryCmd { .. } => {}
        }
        Ok(())
    }

    /// Whether both sides are ready to carry traffic: the destination
    /// side needs a loaded TEK only if it differs from the source's
    /// algorithm (unencrypted-to-unencrypted forwarding never blocks).
    #[must_use]
    pub fn is_ready(&self) -> bool {
        let src_needs_key = self.src.algorithm() != AlgorithmId::Unencrypted;
        let dst_needs_key = self.dst.algorithm() != AlgorithmId::Unencrypted;
        self.src.is_ready(src_needs_key) && self.dst.is_ready(dst_needs_key)
    }

    /// Forward an LDU1 frame from the source talkgroup onto the
    /// destination talkgroup, rewriting the Link Control's talkgroup and
    /// re-encrypting the IMBE payload under the destination TEK.
    ///
    /// # Errors
    /// Propagates [`CryptoError`] if either side's keystream cannot be
    /// generated.
    pub fn forward_ldu1(&mut self, frame: &Ldu1Frame, stream_id: u32, now_ms: u64) -> Result<Ldu1Frame, CryptoError> {
        if !self.src.is_active() {
            self.src.start_call(stream_id, dmr_p25_core::crypto::Mi::zero(), now_ms);
        }
        if !self.dst.is_active() {
            self.dst.start_call(stream_id, dmr_p25_core::crypto::Mi::zero(), now_ms);
        }

        let mut imbe = frame.imbe;
        crypt_imbe_frames(&mut imbe, self.src_crypto())?;
        crypt_imbe_frames(&mut imbe, self.dst_crypto())?;

        let lc = rewrite_lc_tgid(&frame.lc, self.dst.tgid);

        Ok(Ldu1Frame { imbe, lc })
    }

    /// Forward an LDU2 frame, advancing each direction's MI by one step
    /// and rewriting the encryption-sync block to the destination's
    /// algorithm and key ID.
    ///
    /// # Errors
    /// Propagates [`CryptoError`] if either side's keystream cannot be
    /// generated.
    pub fn forward_ldu2(&mut self, frame: &Ldu2Frame) -> Result<Ldu2Frame, CryptoError> {
        self.src.set_mi(frame.enc_sync.mi);

        let mut imbe = frame.imbe;
        crypt_imbe_frames(&mut imbe, self.src_crypto())?;
        crypt_imbe_frames(&mut imbe, self.dst_crypto())?;

        let enc_sync = EncryptionSync {
            mi: self.dst.mi(),
            algorithm: self.dst.algorithm(),
            key_id: self.dst.key_id(),
        };

        self.src.advance_mi();
        self.dst.advance_mi();

        Ok(Ldu2Frame { imbe, enc_sync })
    }

    fn src_crypto(&self) -> &dmr_p25_core::crypto::P25Crypto {
        self.src.crypto_ref()
    }

    fn dst_crypto(&self) -> &dmr_p25_core::crypto::P25Crypto {
        self.dst.crypto_ref()
    }

    /// Tear down the patch's call state on both sides, logging the
    /// call's duration. Idempotent.
    pub fn end_call(&mut self, now_ms: u64) {
        if let Some(duration) = self.src.end_call(now_ms) {
            log::info!(
                "patch call ended: tg {} -> tg {} ({} ms)",
                self.src.tgid,
                self.dst.tgid,
                duration
            );
        }
        self.dst.end_call(now_ms);
    }
}

fn rewrite_lc_tgid(lc: &LinkControl, dst_tgid: u32) -> LinkControl {
    let mut rewritten = *lc;
    if let LcBody::GroupVoice { svc_options, src_id, .. } = lc.body {
        rewritten.body = LcBody::GroupVoice {
            svc_options,
            dst_tgid: dst_tgid as u16,
            src_id,
        };
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmr_p25_core::crypto::Mi;
    use dmr_p25_core::p25::consts::Lco;
    use dmr_p25_core::p25::consts::RAW_IMBE_LENGTH_BYTES;

    fn sample_imbe() -> [[u8; RAW_IMBE_LENGTH_BYTES]; 9] {
        std::array::from_fn(|i| {
            let mut cw = [0x42u8; RAW_IMBE_LENGTH_BYTES];
            cw[0] = i as u8;
            cw
        })
    }

    fn sample_engine() -> PatchEngine {
        let mut src = PatchDirection::new(1000, 0);
        src.load_tek(AlgorithmId::Aes256, vec![0xAA; 32], 0x0001).unwrap();
        src.set_mi(Mi::zero());

        let mut dst = PatchDirection::new(2000, 0);
        dst.load_tek(AlgorithmId::Arc4, b"dstkey".to_vec(), 0x0002).unwrap();
        dst.set_mi(Mi::zero());

        PatchEngine::new(src, dst)
    }

    #[test]
    fn s4_cross_key_reencryption_changes_algorithm_and_key_id() {
        let mut engine = sample_engine();
        assert!(engine.is_ready());

        let lc = LinkControl::new(
            Lco::GroupVoice,
            LcBody::GroupVoice {
                svc_options: 0,
                dst_tgid: 1000,
                src_id: 10,
            },
        );
        let src_frame = Ldu1Frame { imbe: sample_imbe(), lc };

        let mut encrypted_in = src_frame.clone();
        crypt_imbe_frames(&mut encrypted_in.imbe, engine.src_crypto()).unwrap();

        let forwarded = engine.forward_ldu1(&encrypted_in, 42, 0).unwrap();

        assert_eq!(
            forwarded.lc.body,
            LcBody::GroupVoice {
                svc_options: 0,
                dst_tgid: 2000,
                src_id: 10
            }
        );
        assert_ne!(forwarded.imbe, src_frame.imbe);

        let ldu2 = Ldu2Frame {
            imbe: sample_imbe(),
            enc_sync: EncryptionSync {
                mi: Mi::zero(),
                algorithm: AlgorithmId::Aes256,
                key_id: 0x0001,
            },
        };
        let forwarded2 = engine.forward_ldu2(&ldu2).unwrap();
        assert_eq!(forwarded2.enc_sync.algorithm, AlgorithmId::Arc4);
        assert_eq!(forwarded2.enc_sync.key_id, 0x0002);
        assert_ne!(forwarded2.enc_sync.mi, Mi::zero());
    }

    #[test]
    fn startup_requests_keys_and_forwarding_unblocks_on_delivery() {
        use crate::kmm::KeyDelivery;

        let mut src = PatchDirection::new(1000, 0);
        src.mark_awaiting_key(AlgorithmId::Aes256, 1);
        let dst = PatchDirection::new(2000, 0);
        let mut engine = PatchEngine::new(src, dst);

        assert!(!engine.is_ready());
        let requests = engine.take_pending_key_requests();
        assert_eq!(requests, vec![(AlgorithmId::Aes256, 1)]);
        // A second call doesn't re-request what's already pending.
        assert!(engine.take_pending_key_requests().is_empty());

        engine
            .handle_kmm(&KmmMessage::ModifyKeyCmd(KeyDelivery {
                algorithm: AlgorithmId::Aes256,
                key_id: 1,
                key_bytes: vec![0xAA; 32],
            }))
            .unwrap();

        assert!(engine.is_ready());
    }

    #[test]
    fn not_ready_until_both_teks_loaded() {
        let src = PatchDirection::new(1000, 0);
        let dst = PatchDirection::new(2000, 0);
        let engine = PatchEngine::new(src, dst);
        assert!(engine.is_ready());

        let mut src = PatchDirection::new(1000, 0);
        src.load_tek(AlgorithmId::Aes256, vec![0xAA; 32], 1).unwrap();
        let dst = PatchDirection::new(2000, 0);
        let engine = PatchEngine::new(src, dst);
        assert!(!engine.is_ready());
    }

    #[test]
    fn end_call_resets_activity_on_both_sides() {
        let mut engine = sample_engine();
        let lc = LinkControl::new(
            Lco::GroupVoice,
            LcBody::GroupVoice {
                svc_options: 0,
                dst_tgid: 1000,
                src_id: 10,
            },
        );
        let frame = Ldu1Frame { imbe: sample_imbe(), lc };
        engine.forward_ldu1(&frame, 1, 0).unwrap();
        assert!(engine.src.is_active());
        assert!(engine.dst.is_active());

        engine.end_call(5_000);
        assert!(!engine.src.is_active());
        assert!(!engine.dst.is_active());
    }
}
