use tracing::debug;

use super::txn::{self, Key, Move, OnConflict};
use super::{require, AclStore};
use crate::error::{AclError, AclResult};
use crate::model::IdentityReason;
use crate::schema::TableKind;

impl AclStore {
    /// Add a pubkey to the allowed list. A repeat call keeps the first reason.
    pub async fn add_allowed_identity(&self, pubkey: &str, reason: &str) -> AclResult<()> {
        require(pubkey, "pubkey")?;
        sqlx::query("INSERT INTO allowed_pubkeys (pubkey, reason) VALUES ($1, $2) ON CONFLICT (pubkey) DO NOTHING")
            .bind(pubkey)
            .bind(reason)
            .execute(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to add allowed pubkey {}", pubkey)))?;
        debug!(target: "relay_acl::store", "allowed pubkey {}", pubkey);
        Ok(())
    }

    /// Remove a pubkey from the allowed list. Removing an absent pubkey is `NotFound`.
    pub async fn remove_allowed_identity(&self, pubkey: &str) -> AclResult<()> {
        require(pubkey, "pubkey")?;
        let res = sqlx::query("DELETE FROM allowed_pubkeys WHERE pubkey = $1")
            .bind(pubkey)
            .execute(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to remove allowed pubkey {}", pubkey)))?;
        if res.rows_affected() == 0 {
            return Err(AclError::not_found(format!("pubkey {} not found in allowed list", pubkey)));
        }
        debug!(target: "relay_acl::store", "removed allowed pubkey {}", pubkey);
        Ok(())
    }

    /// An empty pubkey is never allowed and is not an error.
    pub async fn is_allowed_identity(&self, pubkey: &str) -> AclResult<bool> {
        if pubkey.is_empty() { return Ok(false); }
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM allowed_pubkeys WHERE pubkey = $1)")
            .bind(pubkey)
            .fetch_one(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to check if pubkey {} is allowed", pubkey)))
    }

    /// Ban a pubkey, refreshing the reason when it is already banned.
    /// Only touches the banned list; see `ban_identity_exclusive` for the atomic variant.
    pub async fn ban_identity(&self, pubkey: &str, reason: &str) -> AclResult<()> {
        require(pubkey, "pubkey")?;
        sqlx::query("INSERT INTO banned_pubkeys (pubkey, reason) VALUES ($1, $2) ON CONFLICT (pubkey) DO UPDATE SET reason = EXCLUDED.reason")
            .bind(pubkey)
            .bind(reason)
            .execute(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to ban pubkey {}", pubkey)))?;
        debug!(target: "relay_acl::store", "banned pubkey {}", pubkey);
        Ok(())
    }

    /// Ban a pubkey and drop it from the allowed list in one transaction.
    pub async fn ban_identity_exclusive(&self, pubkey: &str, reason: &str) -> AclResult<()> {
        require(pubkey, "pubkey")?;
        let mv = Move {
            target: TableKind::BannedPubkeys,
            key: Key::Text(pubkey),
            reason: Some(reason),
            on_conflict: OnConflict::RefreshReason,
            purge: &[TableKind::AllowedPubkeys],
        };
        txn::move_exclusive(&self.pool, mv, &format!("ban pubkey {}", pubkey)).await?;
        debug!(target: "relay_acl::store", "banned pubkey {} (allow entry cleared)", pubkey);
        Ok(())
    }

    /// Lift a ban. Unbanning a pubkey that is not banned succeeds.
    pub async fn unban_identity(&self, pubkey: &str) -> AclResult<()> {
        require(pubkey, "pubkey")?;
        sqlx::query("DELETE FROM banned_pubkeys WHERE pubkey = $1")
            .bind(pubkey)
            .execute(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to unban pubkey {}", pubkey)))?;
        debug!(target: "relay_acl::store", "unbanned pubkey {}", pubkey);
        Ok(())
    }

    pub async fn is_banned_identity(&self, pubkey: &str) -> AclResult<bool> {
        if pubkey.is_empty() { return Ok(false); }
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM banned_pubkeys WHERE pubkey = $1)")
            .bind(pubkey)
            .fetch_one(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to check if pubkey {} is banned", pubkey)))
    }

    pub async fn list_allowed_identities(&self) -> AclResult<Vec<IdentityReason>> {
        sqlx::query_as::<_, IdentityReason>(
            "SELECT pubkey, COALESCE(reason, '') AS reason FROM allowed_pubkeys ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AclError::storage("failed to query allowed pubkeys"))
    }

    pub async fn list_banned_identities(&self) -> AclResult<Vec<IdentityReason>> {
        sqlx::query_as::<_, IdentityReason>(
            "SELECT pubkey, COALESCE(reason, '') AS reason FROM banned_pubkeys ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AclError::storage("failed to query banned pubkeys"))
    }
}
