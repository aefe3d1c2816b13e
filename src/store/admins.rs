use chrono::NaiveDateTime;
use sqlx::PgConnection;
use tracing::debug;

use super::txn;
use super::{require, AclStore};
use crate::error::{AclError, AclResult};
use crate::methods::MethodSet;
use crate::model::AdminGrant;

/// What a partial revoke did to the grant row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RevokeOutcome {
    NoGrant,
    Reduced,
    Deleted,
}

async fn revoke_in(conn: &mut PgConnection, pubkey: &str, methods: &[String]) -> Result<RevokeOutcome, sqlx::Error> {
    let current: Option<Vec<String>> = sqlx::query_scalar("SELECT COALESCE(methods, '{}') FROM admins WHERE pubkey = $1 FOR UPDATE")
        .bind(pubkey)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(current) = current else { return Ok(RevokeOutcome::NoGrant); };

    let mut set = MethodSet::from(current);
    set.remove_all(methods);
    if set.is_empty() {
        sqlx::query("DELETE FROM admins WHERE pubkey = $1")
            .bind(pubkey)
            .execute(&mut *conn)
            .await?;
        return Ok(RevokeOutcome::Deleted);
    }
    sqlx::query("UPDATE admins SET methods = $1 WHERE pubkey = $2")
        .bind(set.to_vec())
        .bind(pubkey)
        .execute(&mut *conn)
        .await?;
    Ok(RevokeOutcome::Reduced)
}

impl AclStore {
    /// Replace the pubkey's whole method set. Granting an empty set removes the grant.
    pub async fn grant_admin(&self, pubkey: &str, methods: &MethodSet) -> AclResult<()> {
        require(pubkey, "pubkey")?;
        if methods.is_empty() {
            return self.delete_admin(pubkey).await;
        }
        sqlx::query("INSERT INTO admins (pubkey, methods) VALUES ($1, $2) ON CONFLICT (pubkey) DO UPDATE SET methods = EXCLUDED.methods")
            .bind(pubkey)
            .bind(methods.to_vec())
            .execute(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to grant admin to {}", pubkey)))?;
        debug!(target: "relay_acl::store", "granted admin {} methods={:?}", pubkey, methods.to_vec());
        Ok(())
    }

    /// Remove the named methods from the grant; an empty list removes the grant entirely.
    /// Revoking from a pubkey with no grant is a no-op.
    pub async fn revoke_admin(&self, pubkey: &str, methods: &[String]) -> AclResult<()> {
        require(pubkey, "pubkey")?;
        if methods.is_empty() {
            return self.delete_admin(pubkey).await;
        }
        let context = format!("revoke admin {}", pubkey);
        let mut tx = self.pool.begin().await.map_err(AclError::storage(format!("{}: begin", context)))?;
        let outcome = revoke_in(&mut *tx, pubkey, methods).await;
        let outcome = txn::finish(tx, outcome, &context).await?;
        debug!(target: "relay_acl::store", "revoked {:?} from admin {}: {:?}", methods, pubkey, outcome);
        Ok(())
    }

    async fn delete_admin(&self, pubkey: &str) -> AclResult<()> {
        sqlx::query("DELETE FROM admins WHERE pubkey = $1")
            .bind(pubkey)
            .execute(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to revoke admin {}", pubkey)))?;
        debug!(target: "relay_acl::store", "admin grant removed for {}", pubkey);
        Ok(())
    }

    pub async fn is_admin(&self, pubkey: &str) -> AclResult<bool> {
        if pubkey.is_empty() { return Ok(false); }
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM admins WHERE pubkey = $1)")
            .bind(pubkey)
            .fetch_one(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to check if {} is admin", pubkey)))
    }

    /// `None` when the pubkey holds no grant.
    pub async fn get_admin_methods(&self, pubkey: &str) -> AclResult<Option<MethodSet>> {
        if pubkey.is_empty() { return Ok(None); }
        let methods: Option<Vec<String>> = sqlx::query_scalar("SELECT COALESCE(methods, '{}') FROM admins WHERE pubkey = $1")
            .bind(pubkey)
            .fetch_optional(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to load admin methods for {}", pubkey)))?;
        Ok(methods.map(MethodSet::from))
    }

    pub async fn list_admins(&self) -> AclResult<Vec<AdminGrant>> {
        let rows = sqlx::query_as::<_, (String, Vec<String>, NaiveDateTime)>(
            "SELECT pubkey, COALESCE(methods, '{}'), COALESCE(created_at, LOCALTIMESTAMP) FROM admins ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AclError::storage("failed to query admins"))?;
        Ok(rows
            .into_iter()
            .map(|(pubkey, methods, created_at)| AdminGrant { pubkey, methods: MethodSet::from(methods), created_at })
            .collect())
    }
}
