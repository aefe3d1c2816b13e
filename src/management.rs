//! Management call dispatch.
//!
//! Method names follow NIP-86 (`banpubkey`, `listbannedevents`, ...) plus `grantadmin`,
//! `revokeadmin` and `flagevent`. Params arrive as a JSON array in positional order.
//! Every call is authorized before its params are decoded, so an unauthorized caller
//! learns nothing about which methods exist.

use std::net::IpAddr;

use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{AclError, AclResult};
use crate::methods::MethodSet;
use crate::model::{parse_address, RelayInfo, RelayInfoKey};
use crate::policy::{AccessPolicy, Decision};
use crate::store::AclStore;

pub const SUPPORTED_METHODS: &[&str] = &[
    "supportedmethods",
    "banpubkey",
    "unbanpubkey",
    "listbannedpubkeys",
    "allowpubkey",
    "unallowpubkey",
    "listallowedpubkeys",
    "listeventsneedingmoderation",
    "flagevent",
    "allowevent",
    "banevent",
    "listbannedevents",
    "listallowedevents",
    "changerelayname",
    "changerelaydescription",
    "changerelayicon",
    "allowkind",
    "disallowkind",
    "listallowedkinds",
    "listdisallowedkinds",
    "blockip",
    "unblockip",
    "listblockedips",
    "grantadmin",
    "revokeadmin",
    "stats",
];

/// A decoded management call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementCall {
    SupportedMethods,
    BanPubkey { pubkey: String, reason: String },
    UnbanPubkey { pubkey: String },
    ListBannedPubkeys,
    AllowPubkey { pubkey: String, reason: String },
    UnallowPubkey { pubkey: String },
    ListAllowedPubkeys,
    ListEventsNeedingModeration,
    FlagEvent { id: String, reason: String },
    AllowEvent { id: String, reason: String },
    BanEvent { id: String, reason: String },
    ListBannedEvents,
    ListAllowedEvents,
    ChangeRelayInfo { key: RelayInfoKey, value: String },
    AllowKind(i32),
    DisallowKind(i32),
    ListAllowedKinds,
    ListDisallowedKinds,
    BlockIp { ip: IpAddr, reason: String },
    UnblockIp { ip: IpAddr },
    ListBlockedIps,
    GrantAdmin { pubkey: String, methods: MethodSet },
    RevokeAdmin { pubkey: String, methods: Vec<String> },
    Stats,
}

/// Positional params of one call.
struct Params<'a> {
    method: &'a str,
    items: &'a [Value],
}

impl<'a> Params<'a> {
    fn new(method: &'a str, params: &'a Value) -> AclResult<Self> {
        match params {
            Value::Null => Ok(Self { method, items: &[] }),
            Value::Array(items) => Ok(Self { method, items }),
            other => Err(AclError::invalid(format!("{}: params must be an array, got {}", method, other))),
        }
    }

    fn string(&self, idx: usize, what: &str) -> AclResult<String> {
        match self.items.get(idx) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Some(Value::String(_)) | None | Some(Value::Null) => {
                Err(AclError::invalid(format!("{}: {} cannot be empty", self.method, what)))
            }
            Some(other) => Err(AclError::invalid(format!("{}: {} must be a string, got {}", self.method, what, other))),
        }
    }

    /// Optional trailing reason; absent or null reads as empty.
    fn reason(&self, idx: usize) -> AclResult<String> {
        match self.items.get(idx) {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(AclError::invalid(format!("{}: reason must be a string, got {}", self.method, other))),
        }
    }

    /// Free text that may be empty, as when clearing the relay icon.
    fn text(&self, idx: usize, what: &str) -> AclResult<String> {
        match self.items.get(idx) {
            Some(Value::String(s)) => Ok(s.clone()),
            None => Err(AclError::invalid(format!("{}: missing {}", self.method, what))),
            Some(other) => Err(AclError::invalid(format!("{}: {} must be a string, got {}", self.method, what, other))),
        }
    }

    /// Kinds are accepted as numbers or numeric strings.
    fn kind(&self, idx: usize) -> AclResult<i32> {
        let Some(v) = self.items.get(idx) else {
            return Err(AclError::invalid(format!("{}: missing kind", self.method)));
        };
        let bad = || AclError::invalid(format!("{}: invalid kind {}", self.method, v));
        match v {
            Value::Number(n) => n.as_i64().and_then(|k| i32::try_from(k).ok()).ok_or_else(bad),
            Value::String(s) => s.trim().parse::<i32>().map_err(|_| bad()),
            _ => Err(bad()),
        }
    }

    fn ip(&self, idx: usize) -> AclResult<IpAddr> {
        parse_address(&self.string(idx, "ip")?)
    }

    /// A method list given either as an array or as one comma-separated string.
    fn methods(&self, idx: usize) -> AclResult<Vec<String>> {
        match self.items.get(idx) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(s.split(',').map(|m| m.trim().to_string()).filter(|m| !m.is_empty()).collect()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.trim().to_string()),
                    other => Err(AclError::invalid(format!("{}: method names must be strings, got {}", self.method, other))),
                })
                .filter(|r| !matches!(r, Ok(m) if m.is_empty()))
                .collect(),
            Some(other) => Err(AclError::invalid(format!("{}: methods must be an array, got {}", self.method, other))),
        }
    }
}

impl ManagementCall {
    /// Decode `method` and its positional `params`.
    pub fn parse(method: &str, params: &Value) -> AclResult<Self> {
        let p = Params::new(method, params)?;
        let call = match method {
            "supportedmethods" => ManagementCall::SupportedMethods,
            "banpubkey" => ManagementCall::BanPubkey { pubkey: p.string(0, "pubkey")?, reason: p.reason(1)? },
            "unbanpubkey" => ManagementCall::UnbanPubkey { pubkey: p.string(0, "pubkey")? },
            "listbannedpubkeys" => ManagementCall::ListBannedPubkeys,
            "allowpubkey" => ManagementCall::AllowPubkey { pubkey: p.string(0, "pubkey")?, reason: p.reason(1)? },
            "unallowpubkey" => ManagementCall::UnallowPubkey { pubkey: p.string(0, "pubkey")? },
            "listallowedpubkeys" => ManagementCall::ListAllowedPubkeys,
            "listeventsneedingmoderation" => ManagementCall::ListEventsNeedingModeration,
            "flagevent" => ManagementCall::FlagEvent { id: p.string(0, "event id")?, reason: p.reason(1)? },
            "allowevent" => ManagementCall::AllowEvent { id: p.string(0, "event id")?, reason: p.reason(1)? },
            "banevent" => ManagementCall::BanEvent { id: p.string(0, "event id")?, reason: p.reason(1)? },
            "listbannedevents" => ManagementCall::ListBannedEvents,
            "listallowedevents" => ManagementCall::ListAllowedEvents,
            "changerelayname" => ManagementCall::ChangeRelayInfo { key: RelayInfoKey::Name, value: p.string(0, "name")? },
            "changerelaydescription" => {
                ManagementCall::ChangeRelayInfo { key: RelayInfoKey::Description, value: p.text(0, "description")? }
            }
            "changerelayicon" => ManagementCall::ChangeRelayInfo { key: RelayInfoKey::Icon, value: p.text(0, "icon")? },
            "allowkind" => ManagementCall::AllowKind(p.kind(0)?),
            "disallowkind" => ManagementCall::DisallowKind(p.kind(0)?),
            "listallowedkinds" => ManagementCall::ListAllowedKinds,
            "listdisallowedkinds" => ManagementCall::ListDisallowedKinds,
            "blockip" => ManagementCall::BlockIp { ip: p.ip(0)?, reason: p.reason(1)? },
            "unblockip" => ManagementCall::UnblockIp { ip: p.ip(0)? },
            "listblockedips" => ManagementCall::ListBlockedIps,
            "grantadmin" => {
                let pubkey = p.string(0, "pubkey")?;
                let methods: MethodSet = p.methods(1)?.into_iter().collect();
                if methods.is_empty() {
                    return Err(AclError::invalid("grantadmin: at least one method is required"));
                }
                ManagementCall::GrantAdmin { pubkey, methods }
            }
            "revokeadmin" => ManagementCall::RevokeAdmin { pubkey: p.string(0, "pubkey")?, methods: p.methods(1)? },
            "stats" => ManagementCall::Stats,
            other => return Err(AclError::invalid(format!("unknown method '{}'", other))),
        };
        Ok(call)
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            ManagementCall::SupportedMethods => "supportedmethods",
            ManagementCall::BanPubkey { .. } => "banpubkey",
            ManagementCall::UnbanPubkey { .. } => "unbanpubkey",
            ManagementCall::ListBannedPubkeys => "listbannedpubkeys",
            ManagementCall::AllowPubkey { .. } => "allowpubkey",
            ManagementCall::UnallowPubkey { .. } => "unallowpubkey",
            ManagementCall::ListAllowedPubkeys => "listallowedpubkeys",
            ManagementCall::ListEventsNeedingModeration => "listeventsneedingmoderation",
            ManagementCall::FlagEvent { .. } => "flagevent",
            ManagementCall::AllowEvent { .. } => "allowevent",
            ManagementCall::BanEvent { .. } => "banevent",
            ManagementCall::ListBannedEvents => "listbannedevents",
            ManagementCall::ListAllowedEvents => "listallowedevents",
            ManagementCall::ChangeRelayInfo { key: RelayInfoKey::Name, .. } => "changerelayname",
            ManagementCall::ChangeRelayInfo { key: RelayInfoKey::Description, .. } => "changerelaydescription",
            ManagementCall::ChangeRelayInfo { key: RelayInfoKey::Icon, .. } => "changerelayicon",
            ManagementCall::AllowKind(_) => "allowkind",
            ManagementCall::DisallowKind(_) => "disallowkind",
            ManagementCall::ListAllowedKinds => "listallowedkinds",
            ManagementCall::ListDisallowedKinds => "listdisallowedkinds",
            ManagementCall::BlockIp { .. } => "blockip",
            ManagementCall::UnblockIp { .. } => "unblockip",
            ManagementCall::ListBlockedIps => "listblockedips",
            ManagementCall::GrantAdmin { .. } => "grantadmin",
            ManagementCall::RevokeAdmin { .. } => "revokeadmin",
            ManagementCall::Stats => "stats",
        }
    }

    /// True when the call changes stored state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            ManagementCall::SupportedMethods
                | ManagementCall::ListBannedPubkeys
                | ManagementCall::ListAllowedPubkeys
                | ManagementCall::ListEventsNeedingModeration
                | ManagementCall::ListBannedEvents
                | ManagementCall::ListAllowedEvents
                | ManagementCall::ListAllowedKinds
                | ManagementCall::ListDisallowedKinds
                | ManagementCall::ListBlockedIps
                | ManagementCall::Stats
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManagementResponse {
    Ok(Value),
    /// The caller is not allowed to make this call.
    Rejected(String),
}

impl ManagementResponse {
    pub fn is_ok(&self) -> bool { matches!(self, ManagementResponse::Ok(_)) }
}

/// NIP-86 response body: `{"result": ...}` on success, `{"error": "..."}` otherwise.
pub fn rpc_body(outcome: &AclResult<ManagementResponse>) -> Value {
    match outcome {
        Ok(ManagementResponse::Ok(result)) => json!({ "result": result }),
        Ok(ManagementResponse::Rejected(msg)) => json!({ "error": msg }),
        Err(e) => json!({ "error": e.to_string() }),
    }
}

pub struct ManagementApi {
    store: AclStore,
    policy: AccessPolicy<AclStore>,
    relay_info: RwLock<RelayInfo>,
}

impl ManagementApi {
    pub fn new(store: AclStore, owner: Option<String>, relay_info: RelayInfo) -> Self {
        let policy = AccessPolicy::new(store.clone(), owner);
        Self { store, policy, relay_info: RwLock::new(relay_info) }
    }

    pub fn store(&self) -> &AclStore { &self.store }
    pub fn policy(&self) -> &AccessPolicy<AclStore> { &self.policy }

    /// Current relay info, including changes made through this dispatcher.
    pub fn relay_info(&self) -> RelayInfo { self.relay_info.read().clone() }

    /// Authorize `caller` for `method`, then decode and run the call.
    pub async fn handle(&self, caller: &str, method: &str, params: &Value) -> AclResult<ManagementResponse> {
        if let Decision::Reject(msg) = self.policy.authorize_call(caller, method).await {
            return Ok(ManagementResponse::Rejected(msg));
        }
        let call = ManagementCall::parse(method, params)?;
        let result = self.dispatch(call.clone()).await?;
        if call.is_mutation() {
            info!(target: "relay_acl::management", "{} by {}", call.method_name(), caller);
        } else {
            debug!(target: "relay_acl::management", "{} by {}", call.method_name(), caller);
        }
        Ok(ManagementResponse::Ok(result))
    }

    async fn dispatch(&self, call: ManagementCall) -> AclResult<Value> {
        let s = &self.store;
        let done = Value::Bool(true);
        match call {
            ManagementCall::SupportedMethods => Ok(json!(SUPPORTED_METHODS)),
            ManagementCall::BanPubkey { pubkey, reason } => {
                s.ban_identity_exclusive(&pubkey, &reason).await?;
                Ok(done)
            }
            ManagementCall::UnbanPubkey { pubkey } => {
                s.unban_identity(&pubkey).await?;
                Ok(done)
            }
            ManagementCall::ListBannedPubkeys => Ok(json!(s.list_banned_identities().await?)),
            ManagementCall::AllowPubkey { pubkey, reason } => {
                s.add_allowed_identity(&pubkey, &reason).await?;
                Ok(done)
            }
            ManagementCall::UnallowPubkey { pubkey } => {
                s.remove_allowed_identity(&pubkey).await?;
                Ok(done)
            }
            ManagementCall::ListAllowedPubkeys => Ok(json!(s.list_allowed_identities().await?)),
            ManagementCall::ListEventsNeedingModeration => Ok(json!(s.list_pending_moderation().await?)),
            ManagementCall::FlagEvent { id, reason } => {
                s.flag_for_moderation(&id, &reason).await?;
                Ok(done)
            }
            ManagementCall::AllowEvent { id, reason } => {
                s.allow_event(&id, &reason).await?;
                Ok(done)
            }
            ManagementCall::BanEvent { id, reason } => {
                s.ban_event(&id, &reason).await?;
                Ok(done)
            }
            ManagementCall::ListBannedEvents => Ok(json!(s.list_banned_events().await?)),
            ManagementCall::ListAllowedEvents => Ok(json!(s.list_allowed_events().await?)),
            ManagementCall::ChangeRelayInfo { key, value } => {
                s.set_metadata(key.as_str(), &value).await?;
                self.relay_info.write().set(key, value);
                Ok(done)
            }
            ManagementCall::AllowKind(kind) => {
                s.allow_kind(kind).await?;
                Ok(done)
            }
            ManagementCall::DisallowKind(kind) => {
                s.disallow_kind(kind).await?;
                Ok(done)
            }
            ManagementCall::ListAllowedKinds => Ok(json!(s.list_allowed_kinds().await?)),
            ManagementCall::ListDisallowedKinds => Ok(json!(s.list_disallowed_kinds().await?)),
            ManagementCall::BlockIp { ip, reason } => {
                s.block_address(ip, &reason).await?;
                Ok(done)
            }
            ManagementCall::UnblockIp { ip } => {
                s.unblock_address(ip).await?;
                Ok(done)
            }
            ManagementCall::ListBlockedIps => Ok(json!(s.list_blocked_addresses().await?)),
            ManagementCall::GrantAdmin { pubkey, methods } => {
                s.grant_admin(&pubkey, &methods).await?;
                Ok(done)
            }
            ManagementCall::RevokeAdmin { pubkey, methods } => {
                s.revoke_admin(&pubkey, &methods).await?;
                Ok(done)
            }
            ManagementCall::Stats => {
                let info = self.relay_info();
                let counts = s.count_lists().await?;
                Ok(json!({
                    "name": info.name,
                    "version": env!("CARGO_PKG_VERSION"),
                    "counts": counts,
                }))
            }
        }
    }
}

#[cfg(test)]
#[path = "management_tests.rs"]
mod tests;
