//! Access decisions the relay engine asks for.
//!
//! Two gates sit on top of the store:
//! - event acceptance for a private relay (owner and allowed pubkeys may write),
//! - management call authorization (owner, or an admin grant covering the method).
//!
//! Both fail closed: when a lookup errors the request is rejected and the cause logged,
//! so an unreachable database is never mistaken for permission. The configured owner
//! bypasses the lists entirely, which is the bootstrap path before any grant exists.

use std::net::IpAddr;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::AclResult;
use crate::methods::MethodSet;
use crate::store::{AclStore, KindVerdict};

/// Read-only lookups the policy needs. `AclStore` is the production implementation.
#[async_trait]
pub trait AclLookup: Send + Sync {
    async fn is_allowed_identity(&self, pubkey: &str) -> AclResult<bool>;
    async fn is_banned_identity(&self, pubkey: &str) -> AclResult<bool>;
    async fn is_banned_event(&self, id: &str) -> AclResult<bool>;
    async fn kind_verdict(&self, kind: i32) -> AclResult<KindVerdict>;
    async fn is_blocked_address(&self, ip: IpAddr) -> AclResult<bool>;
    async fn get_admin_methods(&self, pubkey: &str) -> AclResult<Option<MethodSet>>;
}

#[async_trait]
impl AclLookup for AclStore {
    async fn is_allowed_identity(&self, pubkey: &str) -> AclResult<bool> { AclStore::is_allowed_identity(self, pubkey).await }
    async fn is_banned_identity(&self, pubkey: &str) -> AclResult<bool> { AclStore::is_banned_identity(self, pubkey).await }
    async fn is_banned_event(&self, id: &str) -> AclResult<bool> { AclStore::is_banned_event(self, id).await }
    async fn kind_verdict(&self, kind: i32) -> AclResult<KindVerdict> { AclStore::kind_verdict(self, kind).await }
    async fn is_blocked_address(&self, ip: IpAddr) -> AclResult<bool> { AclStore::is_blocked_address(self, ip).await }
    async fn get_admin_methods(&self, pubkey: &str) -> AclResult<Option<MethodSet>> { AclStore::get_admin_methods(self, pubkey).await }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject(String),
}

impl Decision {
    pub fn is_accept(&self) -> bool { matches!(self, Decision::Accept) }

    fn reject<S: Into<String>>(msg: S) -> Self { Decision::Reject(msg.into()) }
}

/// The parts of an inbound event the policy looks at.
#[derive(Debug, Clone, Copy)]
pub struct InboundEvent<'a> {
    pub id: &'a str,
    pub pubkey: &'a str,
    pub kind: i32,
}

pub const PRIVATE_RELAY_MSG: &str = "this is a private relay, only the owner can write here";
pub const LOOKUP_FAILED_MSG: &str = "error checking authorization";

pub struct AccessPolicy<L: AclLookup> {
    lookup: L,
    owner: Option<String>,
}

impl<L: AclLookup> AccessPolicy<L> {
    /// A blank owner is treated as no owner.
    pub fn new(lookup: L, owner: Option<String>) -> Self {
        let owner = owner.map(|o| o.trim().to_string()).filter(|o| !o.is_empty());
        Self { lookup, owner }
    }

    pub fn lookup(&self) -> &L { &self.lookup }
    pub fn owner(&self) -> Option<&str> { self.owner.as_deref() }

    pub fn is_owner(&self, pubkey: &str) -> bool {
        matches!(self.owner.as_deref(), Some(o) if o == pubkey)
    }

    /// Decide whether an inbound event may be stored.
    pub async fn check_event(&self, ev: InboundEvent<'_>) -> Decision {
        if self.is_owner(ev.pubkey) { return Decision::Accept; }
        match self.evaluate_event(ev).await {
            Ok(Decision::Reject(msg)) => {
                info!(target: "relay_acl::policy", "rejected event {} from {}: {}", ev.id, ev.pubkey, msg);
                Decision::Reject(msg)
            }
            Ok(d) => d,
            Err(e) => {
                warn!(target: "relay_acl::policy", "error checking event {} from {}: {}", ev.id, ev.pubkey, e);
                Decision::reject(LOOKUP_FAILED_MSG)
            }
        }
    }

    async fn evaluate_event(&self, ev: InboundEvent<'_>) -> AclResult<Decision> {
        if self.lookup.is_banned_identity(ev.pubkey).await? {
            return Ok(Decision::reject("blocked: pubkey is banned"));
        }
        if self.lookup.is_banned_event(ev.id).await? {
            return Ok(Decision::reject("blocked: event is banned"));
        }
        match self.lookup.kind_verdict(ev.kind).await? {
            KindVerdict::Disallowed => return Ok(Decision::reject(format!("blocked: kind {} is not accepted", ev.kind))),
            KindVerdict::NotAllowlisted => return Ok(Decision::reject(format!("blocked: kind {} is not on the allowed list", ev.kind))),
            KindVerdict::Allowed | KindVerdict::Unlisted => {}
        }
        if self.lookup.is_allowed_identity(ev.pubkey).await? {
            return Ok(Decision::Accept);
        }
        Ok(Decision::reject(PRIVATE_RELAY_MSG))
    }

    /// Decide whether a connection from `ip` may proceed.
    pub async fn check_address(&self, ip: IpAddr) -> Decision {
        match self.lookup.is_blocked_address(ip).await {
            Ok(false) => Decision::Accept,
            Ok(true) => {
                info!(target: "relay_acl::policy", "rejected blocked ip {}", ip);
                Decision::reject("blocked: ip is blocked")
            }
            Err(e) => {
                warn!(target: "relay_acl::policy", "error checking ip {}: {}", ip, e);
                Decision::reject(LOOKUP_FAILED_MSG)
            }
        }
    }

    /// Decide whether `caller` may invoke management method `method`.
    pub async fn authorize_call(&self, caller: &str, method: &str) -> Decision {
        if caller.is_empty() {
            return Decision::reject("auth-required: management calls need an authenticated pubkey");
        }
        if self.is_owner(caller) { return Decision::Accept; }
        match self.lookup.get_admin_methods(caller).await {
            Ok(Some(methods)) if methods.contains(method) => Decision::Accept,
            Ok(_) => {
                info!(target: "relay_acl::policy", "denied management call {} for {}", method, caller);
                Decision::reject(format!("unauthorized: {} may not call {}", caller, method))
            }
            Err(e) => {
                warn!(target: "relay_acl::policy", "error checking admin grant for {}: {}", caller, e);
                Decision::reject(LOOKUP_FAILED_MSG)
            }
        }
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
