//! Atomic "move between exclusive lists".
//!
//! A move upserts a key into one relation and purges it from the others of the same
//! family, all inside one transaction. Moves on the same family and key take a
//! transaction-scoped advisory lock first, so concurrent conflicting adjudications
//! apply one after the other and the last committed one wins outright.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use crate::error::{AclError, AclResult};
use crate::schema::TableKind;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Key<'a> {
    Text(&'a str),
    Kind(i32),
}

impl Key<'_> {
    fn lock_name(&self, family: &str) -> String {
        match self {
            Key::Text(s) => format!("{}:{}", family, s),
            Key::Kind(k) => format!("{}:{}", family, k),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnConflict {
    /// Keep the existing row as-is.
    Ignore,
    /// Replace the stored reason with the new one.
    RefreshReason,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Move<'a> {
    pub target: TableKind,
    pub key: Key<'a>,
    pub reason: Option<&'a str>,
    pub on_conflict: OnConflict,
    pub purge: &'a [TableKind],
}

pub(crate) fn upsert_sql(target: TableKind, with_reason: bool, on_conflict: OnConflict) -> String {
    let table = target.table_name();
    let key = target.key_column();
    let (cols, vals) = if with_reason { (format!("{}, reason", key), "$1, $2") } else { (key.to_string(), "$1") };
    let action = match (on_conflict, with_reason) {
        (OnConflict::RefreshReason, true) => "DO UPDATE SET reason = EXCLUDED.reason",
        _ => "DO NOTHING",
    };
    format!("INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}", table, cols, vals, key, action)
}

pub(crate) fn delete_sql(table: TableKind) -> String {
    format!("DELETE FROM {} WHERE {} = $1", table.table_name(), table.key_column())
}

/// Take the transaction-scoped lock every write to `family`/`key` goes through.
/// Released at commit or rollback.
pub(crate) async fn lock(conn: &mut PgConnection, family: &str, key: Key<'_>) -> Result<String, sqlx::Error> {
    let name = key.lock_name(family);
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(&name)
        .execute(&mut *conn)
        .await?;
    Ok(name)
}

async fn apply(conn: &mut PgConnection, mv: &Move<'_>) -> Result<(), sqlx::Error> {
    let lock = lock(&mut *conn, mv.target.family(), mv.key).await?;

    let upsert = upsert_sql(mv.target, mv.reason.is_some(), mv.on_conflict);
    let q = sqlx::query(&upsert);
    let q = match mv.key { Key::Text(s) => q.bind(s), Key::Kind(k) => q.bind(k) };
    let q = match mv.reason { Some(r) => q.bind(r), None => q };
    q.execute(&mut *conn).await?;

    for source in mv.purge {
        let del = delete_sql(*source);
        let q = sqlx::query(&del);
        let q = match mv.key { Key::Text(s) => q.bind(s), Key::Kind(k) => q.bind(k) };
        let res = q.execute(&mut *conn).await?;
        if res.rows_affected() > 0 {
            debug!(target: "relay_acl::store", "move {}: purged from {}", lock, source.table_name());
        }
    }
    Ok(())
}

/// Run a move as a single transaction.
pub(crate) async fn move_exclusive(pool: &PgPool, mv: Move<'_>, context: &str) -> AclResult<()> {
    let mut tx = pool.begin().await.map_err(AclError::storage(format!("{}: begin", context)))?;
    let outcome = apply(&mut *tx, &mv).await;
    finish(tx, outcome, context).await
}

/// Commit on success; on failure roll back before handing the cause back wrapped.
pub(crate) async fn finish<T>(
    tx: Transaction<'_, Postgres>,
    outcome: Result<T, sqlx::Error>,
    context: &str,
) -> AclResult<T> {
    match outcome {
        Ok(v) => {
            tx.commit().await.map_err(|e| AclError::aborted(format!("{}: commit", context), e))?;
            Ok(v)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                warn!(target: "relay_acl::store", "{}: rollback failed: {}", context, rb);
            }
            Err(AclError::aborted(context, e))
        }
    }
}
