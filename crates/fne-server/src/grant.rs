// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Grant table (spec.md §3 "Grant table (routing core)", §4.6 grant
//! acquisition sequence): at most one active grant per destination TGID,
//! released on terminator, hang-time expiry, or explicit peer-disconnect
//! release.

use std::collections::HashMap;

/// A single active channel/slot reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantRecord {
    pub channel: u16,
    pub slot: u8,
    pub src_id: u32,
    pub granted_at_ms: u64,
    pub last_active_ms: u64,
    pub group: bool,
    pub origin_peer: u32,
}

/// Outcome of a grant request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// A new grant was recorded.
    Granted,
    /// The same source retried its own active grant; the hang timer was
    /// extended.
    Retried,
}

/// Why a grant request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantDenial {
    /// Another source holds an active grant on this TGID
    /// (`TS_DENY_RSN_TGT_BUSY`).
    Busy,
}

#[derive(Debug, Default)]
pub struct GrantTable {
    grants: HashMap<u32, GrantRecord>,
}

impl GrantTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, tgid: u32) -> Option<&GrantRecord> {
        self.grants.get(&tgid)
    }

    /// Attempt to acquire (or retry) a grant for `tgid`.
    ///
    /// Spec.md's collision policy: a retry from the same source extends
    /// the hang timer; a request from a different source while a grant is
    /// active is denied as busy, unless `disable_src_id_check` (legacy
    /// interop with `m_disableGrantSrcIdCheck`) is set.
    ///
    /// # Errors
    /// Returns [`GrantDenial::Busy`] when another source holds the grant.
    pub fn try_grant(
        &mut self,
        tgid: u32,
        src_id: u32,
        origin_peer: u32,
        channel: u16,
        slot: u8,
        group: bool,
        now_ms: u64,
        disable_src_id_check: bool,
    ) -> Result<GrantOutcome, GrantDenial> {
        if let Some(existing) = self.grants.get_mut(&tgid) {
            if existing.src_id == src_id || disable_src_id_check {
                existing.last_active_ms = now_ms;
                return Ok(GrantOutcome::Retried);
            }
            return Err(GrantDenial::Busy);
        }

        self.grants.insert(
            tgid,
            GrantRecord {
                channel,
                slot,
                src_id,
                granted_at_ms: now_ms,
                last_active_ms: now_ms,
                group,
                origin_peer,
            },
        );
        Ok(GrantOutcome::Granted)
    }

    /// Release a grant explicitly, e.g. on terminator frame or origin-peer
    /// disconnect.
    pub fn release(&mut self, tgid: u32) -> Option<GrantRecord> {
        self.grants.remove(&tgid)
    }

    /// Release every grant owned by `origin_peer` (peer disconnect).
    pub fn release_all_for_peer(&mut self, origin_peer: u32) -> Vec<u32> {
        let expired: Vec<u32> = self
            .grants
            .iter()
            .filter(|(_, g)| g.origin_peer == origin_peer)
            .map(|(&tgid, _)| tgid)
            .collect();
        for tgid in &expired {
            self.grants.remove(tgid);
        }
        expired
    }

    /// Release every grant whose hang timer has expired, returning the
    /// released TGIDs so the caller can invoke the release callback
    /// (spec.md: "invoke the release callback").
    pub fn expire_hung_grants(&mut self, now_ms: u64, hang_time_ms: u64) -> Vec<u32> {
        let expired: Vec<u32> = self
            .grants
            .iter()
            .filter(|(_, g)| now_ms.saturating_sub(g.last_active_ms) >= hang_time_ms)
            .map(|(&tgid, _)| tgid)
            .collect();
        for tgid in &expired {
            self.grants.remove(tgid);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_then_denies_different_source() {
        let mut table = GrantTable::new();
        assert_eq!(
            table.try_grant(100, 10, 1, 5, 1, true, 0, false),
            Ok(GrantOutcome::Granted)
        );
        assert_eq!(
            table.try_grant(100, 11, 2, 5, 1, true, 1_000, false),
            Err(GrantDenial::Busy)
        );
    }

    #[test]
    fn retry_from_same_source_extends_hang_timer() {
        let mut table = GrantTable::new();
        table.try_grant(100, 10, 1, 5, 1, true, 0, false).unwrap();
        assert_eq!(
            table.try_grant(100, 10, 1, 5, 1, true, 5_000, false),
            Ok(GrantOutcome::Retried)
        );
        assert_eq!(table.get(100).unwrap().last_active_ms, 5_000);
    }

    #[test]
    fn disable_src_id_check_allows_any_source_to_retry() {
        let mut table = GrantTable::new();
        table.try_grant(100, 10, 1, 5, 1, true, 0, false).unwrap();
        assert_eq!(
            table.try_grant(100, 11, 2, 5, 1, true, 1_000, true),
            Ok(GrantOutcome::Retried)
        );
    }

    #[test]
    fn s3_retry_after_release_from_original_source_succeeds() {
        let mut table = GrantTable::new();
        table.try_grant(100, 10, 1, 5, 1, true, 0, false).unwrap();
        table.release(100);
        assert_eq!(
            table.try_grant(100, 10, 1, 5, 1, true, 2_000, false),
            Ok(GrantOutcome::Granted)
        );
        assert_eq!(
            table.try_grant(100, 11, 3, 5, 1, true, 2_500, false),
            Err(GrantDenial::Busy)
        );
    }

    #[test]
    fn expire_hung_grants_releases_stale_entries() {
        let mut table = GrantTable::new();
        table.try_grant(100, 10, 1, 5, 1, true, 0, false).unwrap();
        assert!(table.expire_hung_grants(10_000, 15_000).is_empty());
        assert_eq!(table.expire_hung_grants(15_000, 15_000), vec![100]);
        assert!(table.get(100).is_none());
    }

    #[test]
    fn release_all_for_peer_only_touches_its_own_grants() {
        let mut table = GrantTable::new();
        table.try_grant(100, 10, 1, 5, 1, true, 0, false).unwrap();
        table.try_grant(200, 20, 2, 6, 2, true, 0, false).unwrap();
        let released = table.release_all_for_peer(1);
        assert_eq!(released, vec![100]);
        assert!(table.get(100).is_none());
        assert!(table.get(200).is_some());
    }
}
