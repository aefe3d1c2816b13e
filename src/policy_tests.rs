use super::*;
use std::collections::{HashMap, HashSet};
use crate::error::AclError;

// In-memory lookup; `down` simulates an unreachable database.
#[derive(Default)]
struct FakeLookup {
    allowed: HashSet<String>,
    banned: HashSet<String>,
    banned_events: HashSet<String>,
    allowed_kinds: HashSet<i32>,
    disallowed_kinds: HashSet<i32>,
    blocked: HashSet<IpAddr>,
    admins: HashMap<String, MethodSet>,
    down: bool,
}

impl FakeLookup {
    fn check(&self) -> AclResult<()> {
        if self.down { return Err(AclError::storage("database ping failed")(sqlx::Error::PoolTimedOut)); }
        Ok(())
    }
}

#[async_trait]
impl AclLookup for FakeLookup {
    async fn is_allowed_identity(&self, pubkey: &str) -> AclResult<bool> { self.check()?; Ok(self.allowed.contains(pubkey)) }
    async fn is_banned_identity(&self, pubkey: &str) -> AclResult<bool> { self.check()?; Ok(self.banned.contains(pubkey)) }
    async fn is_banned_event(&self, id: &str) -> AclResult<bool> { self.check()?; Ok(self.banned_events.contains(id)) }
    async fn kind_verdict(&self, kind: i32) -> AclResult<KindVerdict> {
        self.check()?;
        Ok(if self.disallowed_kinds.contains(&kind) {
            KindVerdict::Disallowed
        } else if self.allowed_kinds.contains(&kind) {
            KindVerdict::Allowed
        } else if !self.allowed_kinds.is_empty() {
            KindVerdict::NotAllowlisted
        } else {
            KindVerdict::Unlisted
        })
    }
    async fn is_blocked_address(&self, ip: IpAddr) -> AclResult<bool> { self.check()?; Ok(self.blocked.contains(&ip)) }
    async fn get_admin_methods(&self, pubkey: &str) -> AclResult<Option<MethodSet>> { self.check()?; Ok(self.admins.get(pubkey).cloned()) }
}

const OWNER: &str = "00aa";
const ALICE: &str = "a11ce";
const MALLORY: &str = "ma11";

fn ev<'a>(id: &'a str, pubkey: &'a str, kind: i32) -> InboundEvent<'a> { InboundEvent { id, pubkey, kind } }

fn policy(lookup: FakeLookup) -> AccessPolicy<FakeLookup> { AccessPolicy::new(lookup, Some(OWNER.to_string())) }

#[tokio::test]
async fn allowed_pubkey_and_owner_can_write() {
    let mut l = FakeLookup::default();
    l.allowed.insert(ALICE.into());
    let p = policy(l);
    assert_eq!(p.check_event(ev("e1", ALICE, 1)).await, Decision::Accept);
    assert_eq!(p.check_event(ev("e2", OWNER, 1)).await, Decision::Accept);
    assert_eq!(p.check_event(ev("e3", MALLORY, 1)).await, Decision::Reject(PRIVATE_RELAY_MSG.into()));
}

#[tokio::test]
async fn lookup_failure_rejects_instead_of_allowing() {
    let mut l = FakeLookup::default();
    l.allowed.insert(ALICE.into());
    l.down = true;
    let p = policy(l);
    assert_eq!(p.check_event(ev("e1", ALICE, 1)).await, Decision::Reject(LOOKUP_FAILED_MSG.into()));
    assert_eq!(p.authorize_call(ALICE, "banpubkey").await, Decision::Reject(LOOKUP_FAILED_MSG.into()));
    assert_eq!(p.check_address("203.0.113.5".parse().unwrap()).await, Decision::Reject(LOOKUP_FAILED_MSG.into()));
}

#[tokio::test]
async fn owner_bypasses_store_even_when_down() {
    let l = FakeLookup { down: true, ..Default::default() };
    let p = policy(l);
    assert!(p.check_event(ev("e1", OWNER, 1)).await.is_accept());
    assert!(p.authorize_call(OWNER, "grantadmin").await.is_accept());
}

#[tokio::test]
async fn bans_win_over_allow_list() {
    let mut l = FakeLookup::default();
    l.allowed.insert(ALICE.into());
    l.banned.insert(ALICE.into());
    let p = policy(l);
    assert!(!p.check_event(ev("e1", ALICE, 1)).await.is_accept());

    let mut l = FakeLookup::default();
    l.allowed.insert(ALICE.into());
    l.banned_events.insert("bad".into());
    let p = policy(l);
    assert!(!p.check_event(ev("bad", ALICE, 1)).await.is_accept());
    assert!(p.check_event(ev("good", ALICE, 1)).await.is_accept());
}

#[tokio::test]
async fn kind_lists_filter_events() {
    let mut l = FakeLookup::default();
    l.allowed.insert(ALICE.into());
    l.disallowed_kinds.insert(4);
    let p = policy(l);
    assert!(p.check_event(ev("e1", ALICE, 1)).await.is_accept());
    assert!(!p.check_event(ev("e2", ALICE, 4)).await.is_accept());

    let mut l = FakeLookup::default();
    l.allowed.insert(ALICE.into());
    l.allowed_kinds.insert(1);
    let p = policy(l);
    assert!(p.check_event(ev("e1", ALICE, 1)).await.is_accept());
    assert!(!p.check_event(ev("e2", ALICE, 7)).await.is_accept());
}

#[tokio::test]
async fn management_calls_need_owner_or_matching_grant() {
    let mut l = FakeLookup::default();
    l.admins.insert(ALICE.into(), vec!["banpubkey", "listbannedpubkeys"].into_iter().collect());
    let p = policy(l);
    assert!(p.authorize_call(ALICE, "banpubkey").await.is_accept());
    assert!(!p.authorize_call(ALICE, "grantadmin").await.is_accept());
    assert!(!p.authorize_call(MALLORY, "banpubkey").await.is_accept());
    assert!(!p.authorize_call("", "banpubkey").await.is_accept());
}

#[tokio::test]
async fn blank_owner_means_no_owner() {
    let p = AccessPolicy::new(FakeLookup::default(), Some("  ".into()));
    assert_eq!(p.owner(), None);
    assert!(!p.check_event(ev("e1", "", 1)).await.is_accept());
    assert!(!p.authorize_call("", "stats").await.is_accept());
}

#[tokio::test]
async fn blocked_addresses_are_rejected() {
    let mut l = FakeLookup::default();
    l.blocked.insert("203.0.113.5".parse().unwrap());
    let p = policy(l);
    assert!(!p.check_address("203.0.113.5".parse().unwrap()).await.is_accept());
    assert!(p.check_address("203.0.113.9".parse().unwrap()).await.is_accept());
}
