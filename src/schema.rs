//! Relations backing the ACL store.
//!
//! Ten independent tables keyed by natural identifiers. There are no foreign keys;
//! cross-table consistency is kept by the store's transactions. Installation is
//! create-if-missing only. Adding columns later needs an explicit migration step.

use sqlx::PgPool;
use tracing::debug;

use crate::error::{AclError, AclResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    AllowedPubkeys,
    BannedPubkeys,
    EventsNeedingModeration,
    AllowedEvents,
    BannedEvents,
    AllowedKinds,
    DisallowedKinds,
    BlockedIps,
    Admins,
    RelayInfo,
}

pub fn all_tables() -> &'static [TableKind] {
    use TableKind::*;
    &[
        AllowedPubkeys, BannedPubkeys, EventsNeedingModeration, AllowedEvents, BannedEvents,
        AllowedKinds, DisallowedKinds, BlockedIps, Admins, RelayInfo,
    ]
}

impl TableKind {
    pub fn table_name(&self) -> &'static str {
        match self {
            TableKind::AllowedPubkeys => "allowed_pubkeys",
            TableKind::BannedPubkeys => "banned_pubkeys",
            TableKind::EventsNeedingModeration => "events_needing_moderation",
            TableKind::AllowedEvents => "allowed_events",
            TableKind::BannedEvents => "banned_events",
            TableKind::AllowedKinds => "allowed_kinds",
            TableKind::DisallowedKinds => "disallowed_kinds",
            TableKind::BlockedIps => "blocked_ips",
            TableKind::Admins => "admins",
            TableKind::RelayInfo => "relay_info",
        }
    }

    /// Primary key column.
    pub fn key_column(&self) -> &'static str {
        match self {
            TableKind::AllowedPubkeys | TableKind::BannedPubkeys | TableKind::Admins => "pubkey",
            TableKind::EventsNeedingModeration | TableKind::AllowedEvents | TableKind::BannedEvents => "id",
            TableKind::AllowedKinds | TableKind::DisallowedKinds => "kind",
            TableKind::BlockedIps => "ip",
            TableKind::RelayInfo => "key",
        }
    }

    pub fn has_reason(&self) -> bool {
        !matches!(self, TableKind::AllowedKinds | TableKind::DisallowedKinds | TableKind::Admins | TableKind::RelayInfo)
    }

    /// Name of the mutually exclusive family a table belongs to. Moves between members
    /// of the same family serialize on this name plus the key.
    pub fn family(&self) -> &'static str {
        match self {
            TableKind::AllowedPubkeys | TableKind::BannedPubkeys => "pubkey",
            TableKind::EventsNeedingModeration | TableKind::AllowedEvents | TableKind::BannedEvents => "event",
            TableKind::AllowedKinds | TableKind::DisallowedKinds => "kind",
            TableKind::BlockedIps => "ip",
            TableKind::Admins => "admin",
            TableKind::RelayInfo => "relay_info",
        }
    }

    pub fn ddl(&self) -> &'static str {
        match self {
            TableKind::AllowedPubkeys => "CREATE TABLE IF NOT EXISTS allowed_pubkeys (
                pubkey VARCHAR(64) PRIMARY KEY,
                reason TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            TableKind::BannedPubkeys => "CREATE TABLE IF NOT EXISTS banned_pubkeys (
                pubkey VARCHAR(64) PRIMARY KEY,
                reason TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            TableKind::EventsNeedingModeration => "CREATE TABLE IF NOT EXISTS events_needing_moderation (
                id VARCHAR(64) PRIMARY KEY,
                reason TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            TableKind::AllowedEvents => "CREATE TABLE IF NOT EXISTS allowed_events (
                id VARCHAR(64) PRIMARY KEY,
                reason TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            TableKind::BannedEvents => "CREATE TABLE IF NOT EXISTS banned_events (
                id VARCHAR(64) PRIMARY KEY,
                reason TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            TableKind::AllowedKinds => "CREATE TABLE IF NOT EXISTS allowed_kinds (
                kind INTEGER PRIMARY KEY,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            TableKind::DisallowedKinds => "CREATE TABLE IF NOT EXISTS disallowed_kinds (
                kind INTEGER PRIMARY KEY,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            TableKind::BlockedIps => "CREATE TABLE IF NOT EXISTS blocked_ips (
                ip INET PRIMARY KEY,
                reason TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            TableKind::Admins => "CREATE TABLE IF NOT EXISTS admins (
                pubkey VARCHAR(64) PRIMARY KEY,
                methods TEXT[],
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            TableKind::RelayInfo => "CREATE TABLE IF NOT EXISTS relay_info (
                key VARCHAR(64) PRIMARY KEY,
                value TEXT,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
        }
    }
}

/// Create every relation that does not exist yet. Stops at the first failure.
pub async fn install(pool: &PgPool) -> AclResult<()> {
    for table in all_tables() {
        sqlx::query(table.ddl())
            .execute(pool)
            .await
            .map_err(AclError::storage(format!("failed to create table {}", table.table_name())))?;
        debug!(target: "relay_acl::schema", "table {} created/verified", table.table_name());
    }
    Ok(())
}
