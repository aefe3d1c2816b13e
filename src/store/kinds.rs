use tracing::debug;

use super::txn::{self, Key, Move, OnConflict};
use super::AclStore;
use crate::error::{AclError, AclResult};
use crate::schema::TableKind;

/// How the kind lists treat a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindVerdict {
    Allowed,
    Disallowed,
    /// An allow list exists and the kind is not on it.
    NotAllowlisted,
    /// Neither list mentions the kind and there is no allow list.
    Unlisted,
}

impl AclStore {
    pub async fn allow_kind(&self, kind: i32) -> AclResult<()> {
        let mv = Move {
            target: TableKind::AllowedKinds,
            key: Key::Kind(kind),
            reason: None,
            on_conflict: OnConflict::Ignore,
            purge: &[TableKind::DisallowedKinds],
        };
        txn::move_exclusive(&self.pool, mv, &format!("allow kind {}", kind)).await?;
        debug!(target: "relay_acl::store", "kind {} allowed", kind);
        Ok(())
    }

    pub async fn disallow_kind(&self, kind: i32) -> AclResult<()> {
        let mv = Move {
            target: TableKind::DisallowedKinds,
            key: Key::Kind(kind),
            reason: None,
            on_conflict: OnConflict::Ignore,
            purge: &[TableKind::AllowedKinds],
        };
        txn::move_exclusive(&self.pool, mv, &format!("disallow kind {}", kind)).await?;
        debug!(target: "relay_acl::store", "kind {} disallowed", kind);
        Ok(())
    }

    /// Ordered by kind, not by insertion time.
    pub async fn list_allowed_kinds(&self) -> AclResult<Vec<i32>> {
        sqlx::query_scalar::<_, i32>("SELECT kind FROM allowed_kinds ORDER BY kind")
            .fetch_all(&self.pool)
            .await
            .map_err(AclError::storage("failed to query allowed kinds"))
    }

    pub async fn list_disallowed_kinds(&self) -> AclResult<Vec<i32>> {
        sqlx::query_scalar::<_, i32>("SELECT kind FROM disallowed_kinds ORDER BY kind")
            .fetch_all(&self.pool)
            .await
            .map_err(AclError::storage("failed to query disallowed kinds"))
    }

    pub async fn kind_verdict(&self, kind: i32) -> AclResult<KindVerdict> {
        let (disallowed, allowed, any_allowed) = sqlx::query_as::<_, (bool, bool, bool)>(
            "SELECT EXISTS(SELECT 1 FROM disallowed_kinds WHERE kind = $1), \
                    EXISTS(SELECT 1 FROM allowed_kinds WHERE kind = $1), \
                    EXISTS(SELECT 1 FROM allowed_kinds)",
        )
        .bind(kind)
        .fetch_one(&self.pool)
        .await
        .map_err(AclError::storage(format!("failed to check kind {}", kind)))?;
        Ok(match (disallowed, allowed, any_allowed) {
            (true, _, _) => KindVerdict::Disallowed,
            (false, true, _) => KindVerdict::Allowed,
            (false, false, true) => KindVerdict::NotAllowlisted,
            (false, false, false) => KindVerdict::Unlisted,
        })
    }
}
