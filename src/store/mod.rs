//!
//! relay-acl store
//! ---------------
//! Durable moderation and access-control lists for the relay, kept in PostgreSQL.
//!
//! The store wraps a pool opened by the caller (usually shared with the event
//! store). It never closes that pool; `close` is a no-op and teardown belongs to
//! whoever opened it. Beyond that handle the store keeps no in-process state: every
//! read is a fresh round trip and every multi-table change is one transaction.
//!
//! Operations are grouped by list:
//! - `identities`: allowed and banned pubkeys
//! - `events`: pending / allowed / banned event triage
//! - `kinds`: allowed and disallowed kinds (mutually exclusive)
//! - `addresses`: blocked IPs
//! - `admins`: per-pubkey management method grants
//! - `metadata`: relay information key/value pairs

mod addresses;
mod admins;
mod events;
mod identities;
mod kinds;
mod metadata;
mod stats;
pub(crate) mod txn;

pub use kinds::KindVerdict;
pub use stats::ListCounts;

use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::{AclError, AclResult};
use crate::schema;

/// Handle over the ACL relations. Cheap to clone; clones share the caller's pool.
#[derive(Clone, Debug)]
pub struct AclStore {
    pool: PgPool,
}

impl AclStore {
    /// Wrap an already-open pool and make sure every relation exists.
    /// Any failure to create a table is returned and no store is produced.
    pub async fn new(pool: PgPool) -> AclResult<Self> {
        schema::install(&pool).await?;
        info!(target: "relay_acl::store", "acl store ready ({} tables)", schema::all_tables().len());
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool { &self.pool }

    /// Round-trip a trivial statement to confirm the backing engine is reachable.
    pub async fn health(&self) -> AclResult<()> {
        if self.pool.is_closed() {
            return Err(AclError::storage("database ping failed")(sqlx::Error::PoolClosed));
        }
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(AclError::storage("database ping failed"))?;
        Ok(())
    }

    /// The pool belongs to the caller, so there is nothing to release here.
    pub fn close(&self) {
        debug!(target: "relay_acl::store", "acl store closed (pool left open for its owner)");
    }
}

/// Widest identifier the `VARCHAR(64)` key columns accept.
pub const MAX_KEY_LEN: usize = 64;

/// Empty keys and keys wider than the key columns are caller errors, not storage faults.
pub(crate) fn require(value: &str, what: &str) -> AclResult<()> {
    if value.is_empty() {
        return Err(AclError::invalid(format!("{} cannot be empty", what)));
    }
    let len = value.chars().count();
    if len > MAX_KEY_LEN {
        return Err(AclError::invalid(format!("{} is {} characters, at most {} allowed", what, len, MAX_KEY_LEN)));
    }
    Ok(())
}
