// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-peer affiliation tables (spec.md §3 "Affiliation table (per peer)").
//!
//! Each peer owns a `source-radio-id -> destination-talkgroup-id` mapping
//! (unique key on source) plus a set of registered source radio IDs. The
//! registry below indexes every peer's table by peer ID so the routing
//! core can answer "does any peer hold an affiliation for TG `D`?" without
//! walking the peer table directly.

use std::collections::{HashMap, HashSet};

/// One peer's affiliation state.
#[derive(Debug, Default, Clone)]
pub struct PeerAffiliations {
    /// `source-radio-id -> destination-tgid`.
    affiliations: HashMap<u32, u32>,
    /// Registered (but not necessarily affiliated) source radio IDs.
    registered: HashSet<u32>,
}

impl PeerAffiliations {
    pub fn affiliate(&mut self, src_id: u32, tgid: u32) {
        self.affiliations.insert(src_id, tgid);
    }

    pub fn deaffiliate(&mut self, src_id: u32) {
        self.affiliations.remove(&src_id);
    }

    pub fn register(&mut self, src_id: u32) {
        self.registered.insert(src_id);
    }

    pub fn deregister(&mut self, src_id: u32) {
        self.registered.remove(&src_id);
        self.affiliations.remove(&src_id);
    }

    /// Bulk-replace every affiliation held by this peer
    /// (`NET_ANNC_SUBFUNC_AFFILS`).
    pub fn bulk_replace(&mut self, entries: impl IntoIterator<Item = (u32, u32)>) {
        self.affiliations = entries.into_iter().collect();
    }

    #[must_use]
    pub fn is_registered(&self, src_id: u32) -> bool {
        self.registered.contains(&src_id)
    }

    #[must_use]
    pub fn tgid_for(&self, src_id: u32) -> Option<u32> {
        self.affiliations.get(&src_id).copied()
    }

    #[must_use]
    pub fn holds_tgid(&self, tgid: u32) -> bool {
        self.affiliations.values().any(|&t| t == tgid)
    }
}

/// Global index of every connected peer's affiliation table.
#[derive(Debug, Default)]
pub struct AffiliationRegistry {
    by_peer: HashMap<u32, PeerAffiliations>,
}

impl AffiliationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peer_mut(&mut self, peer_id: u32) -> &mut PeerAffiliations {
        self.by_peer.entry(peer_id).or_default()
    }

    /// Destroy a peer's affiliation table entirely, e.g. on peer
    /// disconnect or ping timeout (spec.md: "peer destruction ... its
    /// affiliation entries are removed with it").
    pub fn remove_peer(&mut self, peer_id: u32) -> Option<PeerAffiliations> {
        self.by_peer.remove(&peer_id)
    }

    /// Whether any connected peer currently holds an affiliation for
    /// `tgid` (used by the `affiliated-only` grant check).
    #[must_use]
    pub fn any_peer_affiliated(&self, tgid: u32) -> bool {
        self.by_peer.values().any(|p| p.holds_tgid(tgid))
    }

    /// Whether any connected peer has registered `src_id`
    /// (`m_verifyReg`).
    #[must_use]
    pub fn any_peer_registered(&self, src_id: u32) -> bool {
        self.by_peer.values().any(|p| p.is_registered(src_id))
    }
}
