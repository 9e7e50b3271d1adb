// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Routing core (spec.md §4.6-§4.7, component C7): the grant acquisition
//! sequence and the TG/RID ACL checks that gate it. This module is
//! protocol-agnostic; DMR/P25-specific wire encodings of a
//! [`DenyReason`] are the caller's responsibility (the DMR and P25
//! `reason_code` modules in `dmr_p25_core` carry the numeric values).

use crate::acl::{RadioIdTable, TalkgroupRuleTable};
use crate::affiliation::AffiliationRegistry;
use crate::grant::{GrantDenial, GrantOutcome, GrantTable};

/// DMR "all-call" destination TGIDs (`WUID_ALL`/`WUID_ALLZ`/`WUID_ALLL`):
/// broadcast directly, never granted (spec.md §4.6 step 1).
pub const DMR_ALL_CALL_TGIDS: [u32; 3] = [0xFF_FFFF, 0xFF_FFFE, 0xFF_FFFD];

/// P25 "all-call" destination TGID (`TGID_ALL`): P25 has no ALLZ/ALLL
/// analog, unlike DMR.
pub const P25_ALL_CALL_TGIDS: [u32; 1] = [0xFFFF];

/// Which air-interface protocol a grant request is for, since the two
/// protocols' all-call TGIDs are disjoint (spec.md §4.6 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Dmr,
    P25,
}

impl Protocol {
    #[must_use]
    pub fn is_all_call(self, tgid: u32) -> bool {
        match self {
            Self::Dmr => DMR_ALL_CALL_TGIDS.contains(&tgid),
            Self::P25 => P25_ALL_CALL_TGIDS.contains(&tgid),
        }
    }
}

/// Why an ACL check or grant request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// `TS_DENY_RSN_TGT_BUSY` / `DENY_SVC_IN_USE`: another source holds an
    /// active grant.
    TargetBusy,
    /// `TS_DENY_RSN_TGT_GROUP_NOT_VALID` / `DENY_TGT_GROUP_NOT_VALID`: the
    /// talkgroup rule is inactive or unknown.
    TargetGroupNotValid,
    /// `TS_DENY_RSN_TGT_NOT_REG` / `DENY_TGT_UNIT_NOT_VALID`: destination
    /// radio ID validation failed (unit-to-unit).
    DestinationNotValid,
    /// Source radio ID validation failed (disabled/unknown RID).
    SourceNotValid,
    /// `m_verifyReg`: destination is not registered.
    NotRegistered,
    /// `m_verifyAff`: destination has no affiliated peer.
    NotAffiliated,
}

/// Outcome of a call-routing grant request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantRequestOutcome {
    /// Not gated by the grant table at all; broadcast directly.
    AllCall,
    /// A fresh grant was recorded.
    Granted,
    /// The requesting source already held this TG's grant; hang timer
    /// extended.
    Retried,
    /// Refused with a specific reason.
    Denied(DenyReason),
    /// `affiliated-only` rule with no affiliated peer: silently dropped,
    /// no NAK sent (spec.md §4.6 step 3).
    DroppedSilently,
}

/// ACL and grant-table decision engine. Tables are owned directly (not
/// wrapped in a lock) here; the server binary wraps this struct in
/// `parking_lot::RwLock`/`Mutex` per spec.md §5's sharing model.
#[derive(Debug, Default)]
pub struct RoutingCore {
    pub affiliations: AffiliationRegistry,
    pub grants: GrantTable,
    pub radio_ids: RadioIdTable,
    pub rules: TalkgroupRuleTable,
}

impl RoutingCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// ACL order (spec.md §4.7): source-radio-ID -> destination-radio-ID
    /// (unit-to-unit only) -> talkgroup validation -> registration check
    /// (`verify_reg`) -> affiliation check (`verify_aff`). Returns the
    /// first failing check.
    ///
    /// # Errors
    /// Returns the first [`DenyReason`] encountered in ACL order.
    pub fn check_acl(
        &self,
        src_id: u32,
        dst_radio_id: Option<u32>,
        tgid: u32,
        slot: u8,
        verify_reg: bool,
        verify_aff: bool,
    ) -> Result<(), DenyReason> {
        if !self.radio_ids.is_enabled(src_id) {
            return Err(DenyReason::SourceNotValid);
        }
        if let Some(dst) = dst_radio_id {
            if !self.radio_ids.is_enabled(dst) {
                return Err(DenyReason::DestinationNotValid);
            }
        }
        let rule = self.rules.find(tgid, slot).ok_or(DenyReason::TargetGroupNotValid)?;
        if !rule.active {
            return Err(DenyReason::TargetGroupNotValid);
        }
        if verify_reg && !self.affiliations.any_peer_registered(src_id) {
            return Err(DenyReason::NotRegistered);
        }
        if verify_aff && !self.affiliations.any_peer_affiliated(tgid) {
            return Err(DenyReason::NotAffiliated);
        }
        Ok(())
    }

    /// Run the full grant acquisition sequence for a voice call request on
    /// `tgid` from `src_id` on `origin_peer` (spec.md §4.6, steps 1-5).
    #[allow(clippy::too_many_arguments)]
    pub fn request_group_grant(
        &mut self,
        protocol: Protocol,
        tgid: u32,
        slot: u8,
        src_id: u32,
        origin_peer: u32,
        channel: u16,
        now_ms: u64,
        verify_reg: bool,
        verify_aff: bool,
        disable_grant_src_id_check: bool,
    ) -> GrantRequestOutcome {
        if protocol.is_all_call(tgid) {
            return GrantRequestOutcome::AllCall;
        }

        let Some(rule) = self.rules.find(tgid, slot) else {
            return GrantRequestOutcome::Denied(DenyReason::TargetGroupNotValid);
        };
        if !rule.active {
            return GrantRequestOutcome::Denied(DenyReason::TargetGroupNotValid);
        }
        if rule.affiliated_only && !self.affiliations.any_peer_affiliated(tgid) {
            return GrantRequestOutcome::DroppedSilently;
        }

        if let Err(reason) = self.check_acl(src_id, None, tgid, slot, verify_reg, verify_aff) {
            return GrantRequestOutcome::Denied(reason);
        }

        match self.grants.try_grant(
            tgid,
            src_id,
            origin_peer,
            channel,
            slot,
            true,
            now_ms,
            disable_grant_src_id_check,
        ) {
            Ok(GrantOutcome::Granted) => GrantRequestOutcome::Granted,
            Ok(GrantOutcome::Retried) => GrantRequestOutcome::Retried,
            Err(GrantDenial::Busy) => GrantRequestOutcome::Denied(DenyReason::TargetBusy),
        }
    }

    /// Release a grant (terminator frame) and return the peers the rule
    /// permits forwarding to, for caller-side call-teardown bookkeeping.
    pub fn release_grant(&mut self, tgid: u32) {
        self.grants.release(tgid);
    }

    /// Maintenance tick: expire hung grants and destroy peers past their
    /// ping deadline. Returns the set of TGIDs released by hang-time
    /// expiry, for the release callback.
    pub fn expire_hung_grants(&mut self, now_ms: u64, hang_time_ms: u64) -> Vec<u32> {
        self.grants.expire_hung_grants(now_ms, hang_time_ms)
    }

    /// Release every grant owned by a disconnecting peer and wipe its
    /// affiliation table (spec.md: "on explicit release when an origin
    /// peer disconnects" / "peer destruction ... its affiliation entries
    /// are removed with it").
    pub fn destroy_peer(&mut self, peer_id: u32) {
        self.grants.release_all_for_peer(peer_id);
        self.affiliations.remove_peer(peer_id);
    }

    /// Which peers are permitted to receive traffic for `(tgid, slot)`
    /// given the talkgroup rule's inclusion/exclusion lists.
    #[must_use]
    pub fn permitted_peers<'a>(&self, tgid: u32, slot: u8, candidates: &'a [u32]) -> Vec<&'a u32> {
        match self.rules.find(tgid, slot) {
            Some(rule) => candidates.iter().filter(|&&p| rule.permits_peer(p)).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::TalkgroupRule;

    fn core_with_rule(tgid: u32, slot: u8, affiliated_only: bool, inclusion: Vec<u32>, exclusion: Vec<u32>) -> RoutingCore {
        let mut core = RoutingCore::new();
        core.rules = TalkgroupRuleTable::new(vec![TalkgroupRule {
            tgid,
            slot,
            active: true,
            affiliated_only,
            parrot: false,
            inclusion,
            exclusion,
            rewrites: Vec::new(),
            preferred_peers: Vec::new(),
        }]);
        core
    }

    #[test]
    fn p25_all_call_bypasses_grant_table() {
        let mut core = RoutingCore::new();
        let outcome = core.request_group_grant(Protocol::P25, 0xFFFF, 1, 10, 1, 5, 0, false, false, false);
        assert_eq!(outcome, GrantRequestOutcome::AllCall);
    }

    #[test]
    fn dmr_all_call_ids_bypass_grant_table_but_are_not_p25_all_call() {
        let mut core = RoutingCore::new();
        for tgid in DMR_ALL_CALL_TGIDS {
            let outcome = core.request_group_grant(Protocol::Dmr, tgid, 1, 10, 1, 5, 0, false, false, false);
            assert_eq!(outcome, GrantRequestOutcome::AllCall);
        }
        // DMR's all-call IDs are 24-bit and must not collide with P25's 16-bit one.
        assert!(!Protocol::P25.is_all_call(0xFF_FFFF));
    }

    #[test]
    fn unknown_tgid_is_denied_not_valid() {
        let mut core = RoutingCore::new();
        let outcome = core.request_group_grant(Protocol::Dmr, 100, 1, 10, 1, 5, 0, false, false, false);
        assert_eq!(outcome, GrantRequestOutcome::Denied(DenyReason::TargetGroupNotValid));
    }

    #[test]
    fn affiliated_only_with_no_affiliation_drops_silently() {
        let mut core = core_with_rule(100, 1, true, Vec::new(), Vec::new());
        let outcome = core.request_group_grant(Protocol::Dmr, 100, 1, 10, 1, 5, 0, false, false, false);
        assert_eq!(outcome, GrantRequestOutcome::DroppedSilently);
    }

    #[test]
    fn s3_grant_then_retry_then_busy_from_other_source() {
        let mut core = core_with_rule(100, 1, false, vec![1, 2], vec![3]);
        let outcome = core.request_group_grant(Protocol::Dmr, 100, 1, 10, 1, 5, 0, false, false, false);
        assert_eq!(outcome, GrantRequestOutcome::Granted);

        core.release_grant(100);
        let retry = core.request_group_grant(Protocol::Dmr, 100, 1, 10, 1, 5, 1_000, false, false, false);
        assert_eq!(retry, GrantRequestOutcome::Granted);

        let busy = core.request_group_grant(Protocol::Dmr, 100, 1, 11, 3, 5, 1_500, false, false, false);
        assert_eq!(busy, GrantRequestOutcome::Denied(DenyReason::TargetBusy));
    }

    #[test]
    fn permitted_peers_respects_inclusion_and_exclusion() {
        let core = core_with_rule(100, 1, false, vec![1, 2], Vec::new());
        let candidates = [1u32, 2, 3];
        let permitted: Vec<u32> = core.permitted_peers(100, 1, &candidates).into_iter().copied().collect();
        assert_eq!(permitted, vec![1, 2]);
    }

    #[test]
    fn verify_reg_blocks_grant_when_unregistered() {
        let core = core_with_rule(100, 1, false, Vec::new(), Vec::new());
        let result = core.check_acl(10, None, 100, 1, true, false);
        assert_eq!(result, Err(DenyReason::NotRegistered));
    }

    #[test]
    fn destroy_peer_releases_its_grants_and_affiliations() {
        let mut core = core_with_rule(100, 1, false, Vec::new(), Vec::new());
        core.request_group_grant(Protocol::Dmr, 100, 1, 10, 7, 5, 0, false, false, false);
        core.affiliations.peer_mut(7).affiliate(10, 100);

        core.destroy_peer(7);

        assert!(core.grants.get(100).is_none());
        assert!(!core.affiliations.any_peer_affiliated(100));
    }
}
