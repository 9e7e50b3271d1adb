// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Routing core integration tests (spec.md §8, scenario S3).

use fne_server::acl::{TalkgroupRule, TalkgroupRuleTable};
use fne_server::router::{DenyReason, GrantRequestOutcome, Protocol, RoutingCore};

fn rule(tgid: u32, slot: u8, inclusion: Vec<u32>, exclusion: Vec<u32>) -> TalkgroupRule {
    TalkgroupRule {
        tgid,
        slot,
        active: true,
        affiliated_only: false,
        parrot: false,
        inclusion,
        exclusion,
        rewrites: Vec::new(),
        preferred_peers: Vec::new(),
    }
}

#[test]
fn s3_dmr_group_voice_grant_lifecycle() {
    let mut core = RoutingCore::new();
    core.rules = TalkgroupRuleTable::new(vec![rule(100, 1, vec![1, 2], vec![3])]);

    let granted = core.request_group_grant(Protocol::Dmr, 100, 1, 10, 1, 5, 0, false, false, false);
    assert_eq!(granted, GrantRequestOutcome::Granted);

    let candidates = [1u32, 2, 3];
    let permitted: Vec<u32> = core.permitted_peers(100, 1, &candidates).into_iter().copied().collect();
    assert_eq!(permitted, vec![1, 2], "peer 3 is excluded from TG 100");

    core.release_grant(100);

    let retry_same_src = core.request_group_grant(Protocol::Dmr, 100, 1, 10, 1, 5, 1_000, false, false, false);
    assert_eq!(retry_same_src, GrantRequestOutcome::Granted);

    let denied_other_src = core.request_group_grant(Protocol::Dmr, 100, 1, 11, 3, 5, 1_500, false, false, false);
    assert_eq!(denied_other_src, GrantRequestOutcome::Denied(DenyReason::TargetBusy));
}

#[test]
fn peer_disconnect_wipes_grants_and_affiliations() {
    let mut core = RoutingCore::new();
    core.rules = TalkgroupRuleTable::new(vec![rule(200, 2, Vec::new(), Vec::new())]);
    core.affiliations.peer_mut(7).affiliate(70, 200);

    core.request_group_grant(Protocol::Dmr, 200, 2, 70, 7, 3, 0, false, false, false);
    assert!(core.grants.get(200).is_some());

    core.destroy_peer(7);

    assert!(core.grants.get(200).is_none());
    assert!(!core.affiliations.any_peer_affiliated(200));
}

#[test]
fn hang_time_expiry_releases_grant_independently_of_terminator() {
    let mut core = RoutingCore::new();
    core.rules = TalkgroupRuleTable::new(vec![rule(300, 1, Vec::new(), Vec::new())]);

    core.request_group_grant(Protocol::Dmr, 300, 1, 30, 9, 4, 0, false, false, false);
    assert!(core.expire_hung_grants(10_000, 15_000).is_empty());
    assert_eq!(core.expire_hung_grants(15_000, 15_000), vec![300]);
}
