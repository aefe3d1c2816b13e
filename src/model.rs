use std::net::IpAddr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::methods::MethodSet;

/// Entry of the allowed or banned pubkey lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdentityReason {
    pub pubkey: String,
    #[serde(default)]
    pub reason: String,
}

/// Entry of the pending, allowed or banned event lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventReason {
    pub id: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressReason {
    pub ip: IpAddr,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminGrant {
    pub pubkey: String,
    pub methods: MethodSet,
    pub created_at: NaiveDateTime,
}

/// Keys of the relay information document that the management surface can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayInfoKey {
    Name,
    Description,
    Icon,
}

impl RelayInfoKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayInfoKey::Name => "name",
            RelayInfoKey::Description => "description",
            RelayInfoKey::Icon => "icon",
        }
    }

    pub fn all() -> &'static [RelayInfoKey] {
        use RelayInfoKey::*;
        &[Name, Description, Icon]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayInfo {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub icon: String,
    /// Owner pubkey advertised in the information document.
    #[serde(default)]
    pub pubkey: Option<String>,
}

impl RelayInfo {
    pub fn get(&self, key: RelayInfoKey) -> &str {
        match key {
            RelayInfoKey::Name => &self.name,
            RelayInfoKey::Description => &self.description,
            RelayInfoKey::Icon => &self.icon,
        }
    }

    pub fn set(&mut self, key: RelayInfoKey, value: String) {
        match key {
            RelayInfoKey::Name => self.name = value,
            RelayInfoKey::Description => self.description = value,
            RelayInfoKey::Icon => self.icon = value,
        }
    }
}

/// Parse an address literal for the block list.
pub fn parse_address(raw: &str) -> crate::error::AclResult<IpAddr> {
    let s = raw.trim();
    if s.is_empty() { return Err(crate::error::AclError::invalid("ip cannot be empty")); }
    // tolerate the bracketed IPv6 form used in URLs
    let s = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')).unwrap_or(s);
    s.parse::<IpAddr>()
        .map_err(|e| crate::error::AclError::invalid(format!("invalid ip '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AclError;

    #[test]
    fn parse_address_accepts_v4_and_v6() {
        assert_eq!(parse_address("203.0.113.5").unwrap().to_string(), "203.0.113.5");
        assert_eq!(parse_address(" 2001:db8::1 ").unwrap().to_string(), "2001:db8::1");
        assert_eq!(parse_address("[::1]").unwrap().to_string(), "::1");
    }

    #[test]
    fn parse_address_rejects_garbage() {
        assert!(matches!(parse_address(""), Err(AclError::InvalidArgument(_))));
        assert!(matches!(parse_address("203.0.113"), Err(AclError::InvalidArgument(_))));
        assert!(matches!(parse_address("example.com"), Err(AclError::InvalidArgument(_))));
    }

    #[test]
    fn relay_info_get_set_by_key() {
        let mut info = RelayInfo::default();
        for k in RelayInfoKey::all() { info.set(*k, format!("v-{}", k.as_str())); }
        assert_eq!(info.get(RelayInfoKey::Name), "v-name");
        assert_eq!(info.get(RelayInfoKey::Description), "v-description");
        assert_eq!(info.get(RelayInfoKey::Icon), "v-icon");
    }
}
