use std::net::IpAddr;

use tracing::debug;

use super::AclStore;
use crate::error::{AclError, AclResult};
use crate::model::AddressReason;

impl AclStore {
    /// Block an address, refreshing the reason when it is already blocked.
    pub async fn block_address(&self, ip: IpAddr, reason: &str) -> AclResult<()> {
        sqlx::query("INSERT INTO blocked_ips (ip, reason) VALUES ($1::inet, $2) ON CONFLICT (ip) DO UPDATE SET reason = EXCLUDED.reason")
            .bind(ip.to_string())
            .bind(reason)
            .execute(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to block ip {}", ip)))?;
        debug!(target: "relay_acl::store", "blocked ip {}", ip);
        Ok(())
    }

    /// Unblocking an address that was never blocked succeeds.
    pub async fn unblock_address(&self, ip: IpAddr) -> AclResult<()> {
        let res = sqlx::query("DELETE FROM blocked_ips WHERE ip = $1::inet")
            .bind(ip.to_string())
            .execute(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to unblock ip {}", ip)))?;
        debug!(target: "relay_acl::store", "unblocked ip {} (rows={})", ip, res.rows_affected());
        Ok(())
    }

    pub async fn is_blocked_address(&self, ip: IpAddr) -> AclResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM blocked_ips WHERE ip = $1::inet)")
            .bind(ip.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to check if ip {} is blocked", ip)))
    }

    pub async fn list_blocked_addresses(&self) -> AclResult<Vec<AddressReason>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT host(ip), COALESCE(reason, '') FROM blocked_ips ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AclError::storage("failed to query blocked ips"))?;
        let mut out = Vec::with_capacity(rows.len());
        for (raw, reason) in rows {
            let ip = raw.parse::<IpAddr>().map_err(|e| {
                AclError::storage(format!("blocked_ips holds unparseable address '{}'", raw))(sqlx::Error::Decode(Box::new(e)))
            })?;
            out.push(AddressReason { ip, reason });
        }
        Ok(out)
    }
}
