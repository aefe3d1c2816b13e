//! Concurrent adjudication and the management surface end to end.

mod common;

use anyhow::Result;
use futures::future::join_all;
use serde_json::json;

use relay_acl::management::{ManagementApi, ManagementResponse};
use relay_acl::model::RelayInfo;
use relay_acl::policy::{Decision, InboundEvent};
use relay_acl::{AclError, AclStore};

use common::{find_event, unique, unique_kind};

fn api(store: &AclStore, owner: &str) -> ManagementApi {
    let info = RelayInfo { name: "test relay".into(), description: "for tests".into(), icon: String::new(), pubkey: Some(owner.into()) };
    ManagementApi::new(store.clone(), Some(owner.to_string()), info)
}

fn note<'a>(id: &'a str, pubkey: &'a str, kind: i32) -> InboundEvent<'a> {
    InboundEvent { id, pubkey, kind }
}

#[tokio::test]
async fn concurrent_allow_and_ban_leave_one_membership() -> Result<()> {
    let Some(store) = common::store().await? else { return Ok(()) };
    for _ in 0..10 {
        let id = unique("e2");
        store.flag_for_moderation(&id, "race").await?;
        let (a, b) = tokio::join!(store.allow_event(&id, "looks fine"), store.ban_event(&id, "spam"));
        a?;
        b?;
        let allowed = find_event(&store.list_allowed_events().await?, &id).is_some();
        let banned = find_event(&store.list_banned_events().await?, &id).is_some();
        assert!(allowed ^ banned, "{} allowed={} banned={}", id, allowed, banned);
        assert!(find_event(&store.list_pending_moderation().await?, &id).is_none());
    }
    Ok(())
}

#[tokio::test]
async fn many_concurrent_kind_flips_settle_on_one_list() -> Result<()> {
    let Some(store) = common::store().await? else { return Ok(()) };
    let kind = unique_kind();
    let flips = (0..16).map(|i| {
        let store = store.clone();
        async move { if i % 2 == 0 { store.allow_kind(kind).await } else { store.disallow_kind(kind).await } }
    });
    for r in join_all(flips).await { r?; }
    let allowed = store.list_allowed_kinds().await?.contains(&kind);
    let disallowed = store.list_disallowed_kinds().await?.contains(&kind);
    assert!(allowed ^ disallowed);
    store.disallow_kind(kind).await?;
    Ok(())
}

#[tokio::test]
async fn owner_ban_clears_allow_entry() -> Result<()> {
    let Some(store) = common::store().await? else { return Ok(()) };
    let owner = unique("owner");
    let api = api(&store, &owner);
    let pk = unique("pk");

    let res = api.handle(&owner, "allowpubkey", &json!([pk, "friend"])).await?;
    assert_eq!(res, ManagementResponse::Ok(json!(true)));
    api.handle(&owner, "banpubkey", &json!([pk, "turned"])).await?;
    assert!(!store.is_allowed_identity(&pk).await?);
    assert!(store.is_banned_identity(&pk).await?);

    let ManagementResponse::Ok(list) = api.handle(&owner, "listbannedpubkeys", &json!([])).await? else {
        panic!("owner was rejected");
    };
    let entries = list.as_array().cloned().unwrap_or_default();
    assert!(entries.contains(&json!({"pubkey": pk, "reason": "turned"})));
    Ok(())
}

#[tokio::test]
async fn callers_need_a_matching_grant() -> Result<()> {
    let Some(store) = common::store().await? else { return Ok(()) };
    let owner = unique("owner");
    let api = api(&store, &owner);
    let helper = unique("helper");
    let stranger = unique("stranger");

    let res = api.handle(&stranger, "banevent", &json!([unique("ev")])).await?;
    assert!(matches!(res, ManagementResponse::Rejected(_)));
    let res = api.handle("", "stats", &json!([])).await?;
    assert!(matches!(res, ManagementResponse::Rejected(_)));

    api.handle(&owner, "grantadmin", &json!([helper, ["banevent"]])).await?;
    let id = unique("ev");
    assert!(api.handle(&helper, "banevent", &json!([id, "spam"])).await?.is_ok());
    assert!(store.is_banned_event(&id).await?);
    assert!(!api.handle(&helper, "grantadmin", &json!([stranger, ["banevent"]])).await?.is_ok());

    api.handle(&owner, "revokeadmin", &json!([helper])).await?;
    assert!(!api.handle(&helper, "banevent", &json!([unique("ev")])).await?.is_ok());
    Ok(())
}

#[tokio::test]
async fn owner_errors_surface_as_errors() -> Result<()> {
    let Some(store) = common::store().await? else { return Ok(()) };
    let owner = unique("owner");
    let api = api(&store, &owner);
    assert!(matches!(api.handle(&owner, "nosuchmethod", &json!([])).await, Err(AclError::InvalidArgument(_))));
    assert!(matches!(api.handle(&owner, "unallowpubkey", &json!([unique("pk")])).await, Err(AclError::NotFound(_))));
    assert!(matches!(api.handle(&owner, "blockip", &json!(["300.1.1.1"])).await, Err(AclError::InvalidArgument(_))));
    Ok(())
}

#[tokio::test]
async fn relay_info_changes_are_stored_and_visible() -> Result<()> {
    let Some(store) = common::store().await? else { return Ok(()) };
    let owner = unique("owner");
    let api = api(&store, &owner);
    let name = unique("name");

    api.handle(&owner, "changerelayname", &json!([name])).await?;
    assert_eq!(api.relay_info().name, name);
    assert_eq!(store.get_metadata("name").await?, name);

    let ManagementResponse::Ok(stats) = api.handle(&owner, "stats", &json!([])).await? else {
        panic!("owner was rejected");
    };
    assert_eq!(stats["name"], json!(name));
    assert_eq!(stats["version"], json!(env!("CARGO_PKG_VERSION")));
    assert!(stats["counts"]["banned_pubkeys"].is_i64());
    Ok(())
}

#[tokio::test]
async fn kind_and_ip_calls_round_trip() -> Result<()> {
    let Some(store) = common::store().await? else { return Ok(()) };
    let owner = unique("owner");
    let api = api(&store, &owner);
    let kind = unique_kind();

    api.handle(&owner, "disallowkind", &json!([kind])).await?;
    let ManagementResponse::Ok(kinds) = api.handle(&owner, "listdisallowedkinds", &json!([])).await? else {
        panic!("owner was rejected");
    };
    assert!(kinds.as_array().map(|a| a.contains(&json!(kind))).unwrap_or(false));

    let ip = common::unique_ip();
    api.handle(&owner, "blockip", &json!([ip.to_string(), "abuse"])).await?;
    let ManagementResponse::Ok(ips) = api.handle(&owner, "listblockedips", &json!([])).await? else {
        panic!("owner was rejected");
    };
    assert!(ips.as_array().map(|a| a.contains(&json!({"ip": ip.to_string(), "reason": "abuse"}))).unwrap_or(false));
    api.handle(&owner, "unblockip", &json!([ip.to_string()])).await?;
    assert!(!store.is_blocked_address(ip).await?);
    Ok(())
}

#[tokio::test]
async fn policy_reads_live_lists() -> Result<()> {
    let Some(store) = common::store().await? else { return Ok(()) };
    let owner = unique("owner");
    let api = api(&store, &owner);
    let pk = unique("pk");
    // a kind of our own on the allow list passes whatever other tests did to the kind lists
    let kind = unique_kind();
    store.allow_kind(kind).await?;

    assert!(!api.policy().check_event(note("e-before", &pk, kind)).await.is_accept());
    store.add_allowed_identity(&pk, "").await?;
    assert_eq!(api.policy().check_event(note("e-after", &pk, kind)).await, Decision::Accept);
    assert!(api.policy().check_event(note("e-owner", &owner, kind)).await.is_accept());

    let banned_id = unique("ev");
    store.ban_event(&banned_id, "nope").await?;
    assert!(!api.policy().check_event(note(&banned_id, &pk, kind)).await.is_accept());

    // moving it to the disallowed list drops it from the allow list again
    store.disallow_kind(kind).await?;
    assert!(!store.list_allowed_kinds().await?.contains(&kind));
    Ok(())
}
