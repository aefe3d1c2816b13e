//! Shared setup for the Postgres-backed tests.
//!
//! Tests run only when `RELAY_ACL_TEST_DATABASE_URL` points at a scratch database;
//! otherwise each test prints a note and returns early. Every test works on freshly
//! generated ids so tests can share one database and run in parallel.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Mutex;

use relay_acl::model::{EventReason, IdentityReason};
use relay_acl::AclStore;

pub const DB_ENV: &str = "RELAY_ACL_TEST_DATABASE_URL";

// parallel CREATE TABLE IF NOT EXISTS can still collide on the catalog
static INSTALL: Mutex<()> = Mutex::const_new(());
static SEQ: AtomicU32 = AtomicU32::new(0);

/// Connect and install the relations, or `None` when no test database is configured.
pub async fn store() -> Result<Option<AclStore>> {
    let Ok(url) = std::env::var(DB_ENV) else {
        eprintln!("{} not set; skipping database test", DB_ENV);
        return Ok(None);
    };
    let pool = PgPoolOptions::new().max_connections(8).connect(&url).await?;
    let _guard = INSTALL.lock().await;
    Ok(Some(AclStore::new(pool).await?))
}

fn nonce() -> (u128, u32) {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);
    (nanos, SEQ.fetch_add(1, Ordering::SeqCst))
}

/// Fresh identifier, short enough for the VARCHAR(64) key columns.
pub fn unique(prefix: &str) -> String {
    let (nanos, seq) = nonce();
    format!("{}-{:x}-{}", prefix, nanos, seq)
}

/// Fresh kind number well away from the kinds real clients use.
pub fn unique_kind() -> i32 {
    let (nanos, seq) = nonce();
    1_000_000 + ((nanos / 1_000) % 1_000_000_000) as i32 + seq as i32
}

/// Fresh address from the 10.0.0.0/8 block.
pub fn unique_ip() -> IpAddr {
    let (nanos, seq) = nonce();
    let n = ((nanos / 1_000) as u32).wrapping_add(seq.wrapping_mul(7919)) & 0x00ff_ffff;
    IpAddr::V4(Ipv4Addr::new(10, (n >> 16) as u8, (n >> 8) as u8, n as u8))
}

pub fn find_event<'a>(list: &'a [EventReason], id: &str) -> Option<&'a EventReason> {
    list.iter().find(|e| e.id == id)
}

pub fn count_identity(list: &[IdentityReason], pubkey: &str) -> usize {
    list.iter().filter(|e| e.pubkey == pubkey).count()
}
