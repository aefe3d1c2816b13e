//! Event triage: pending -> allowed | banned, and directly between allowed and banned.

use sqlx::PgConnection;
use tracing::debug;

use super::txn::{self, Key, Move, OnConflict};
use super::{require, AclStore};
use crate::error::{AclError, AclResult};
use crate::model::EventReason;
use crate::schema::TableKind;

/// Insert into the pending list unless the event is pending or decided already.
/// Runs under the same per-event lock as the allow/ban moves.
async fn flag_in(conn: &mut PgConnection, id: &str, reason: &str) -> Result<bool, sqlx::Error> {
    txn::lock(&mut *conn, TableKind::EventsNeedingModeration.family(), Key::Text(id)).await?;
    let res = sqlx::query(
        "INSERT INTO events_needing_moderation (id, reason) \
         SELECT $1, $2 \
         WHERE NOT EXISTS (SELECT 1 FROM allowed_events WHERE id = $1) \
           AND NOT EXISTS (SELECT 1 FROM banned_events WHERE id = $1) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(id)
    .bind(reason)
    .execute(&mut *conn)
    .await?;
    Ok(res.rows_affected() > 0)
}

impl AclStore {
    /// Queue an event for moderation. The first reason wins, and an event that was
    /// already allowed or banned stays decided: the call succeeds without queuing it.
    pub async fn flag_for_moderation(&self, id: &str, reason: &str) -> AclResult<()> {
        require(id, "event id")?;
        let context = format!("flag event {}", id);
        let mut tx = self.pool.begin().await.map_err(AclError::storage(format!("{}: begin", context)))?;
        let outcome = flag_in(&mut *tx, id, reason).await;
        let queued = txn::finish(tx, outcome, &context).await?;
        if queued {
            debug!(target: "relay_acl::store", "event {} queued for moderation", id);
        } else {
            debug!(target: "relay_acl::store", "event {} already pending or decided; not queued", id);
        }
        Ok(())
    }

    pub async fn allow_event(&self, id: &str, reason: &str) -> AclResult<()> {
        require(id, "event id")?;
        let mv = Move {
            target: TableKind::AllowedEvents,
            key: Key::Text(id),
            reason: Some(reason),
            on_conflict: OnConflict::RefreshReason,
            purge: &[TableKind::EventsNeedingModeration, TableKind::BannedEvents],
        };
        txn::move_exclusive(&self.pool, mv, &format!("allow event {}", id)).await?;
        debug!(target: "relay_acl::store", "event {} allowed", id);
        Ok(())
    }

    pub async fn ban_event(&self, id: &str, reason: &str) -> AclResult<()> {
        require(id, "event id")?;
        let mv = Move {
            target: TableKind::BannedEvents,
            key: Key::Text(id),
            reason: Some(reason),
            on_conflict: OnConflict::RefreshReason,
            purge: &[TableKind::EventsNeedingModeration, TableKind::AllowedEvents],
        };
        txn::move_exclusive(&self.pool, mv, &format!("ban event {}", id)).await?;
        debug!(target: "relay_acl::store", "event {} banned", id);
        Ok(())
    }

    pub async fn is_banned_event(&self, id: &str) -> AclResult<bool> {
        if id.is_empty() { return Ok(false); }
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM banned_events WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to check if event {} is banned", id)))
    }

    pub async fn list_pending_moderation(&self) -> AclResult<Vec<EventReason>> {
        self.list_events(TableKind::EventsNeedingModeration).await
    }

    pub async fn list_allowed_events(&self) -> AclResult<Vec<EventReason>> {
        self.list_events(TableKind::AllowedEvents).await
    }

    pub async fn list_banned_events(&self) -> AclResult<Vec<EventReason>> {
        self.list_events(TableKind::BannedEvents).await
    }

    async fn list_events(&self, table: TableKind) -> AclResult<Vec<EventReason>> {
        let sql = format!(
            "SELECT id, COALESCE(reason, '') AS reason FROM {} ORDER BY created_at",
            table.table_name()
        );
        sqlx::query_as::<_, EventReason>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to query {}", table.table_name())))
    }
}
