use tracing::debug;

use super::{require, AclStore};
use crate::error::{AclError, AclResult};
use crate::model::{RelayInfo, RelayInfoKey};

impl AclStore {
    /// Last write wins.
    pub async fn set_metadata(&self, key: &str, value: &str) -> AclResult<()> {
        require(key, "relay info key")?;
        sqlx::query(
            "INSERT INTO relay_info (key, value, updated_at) VALUES ($1, $2, CURRENT_TIMESTAMP) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(AclError::storage(format!("failed to set relay info {}", key)))?;
        debug!(target: "relay_acl::store", "relay info {} updated", key);
        Ok(())
    }

    /// An unset key reads as an empty string; only storage faults are errors.
    pub async fn get_metadata(&self, key: &str) -> AclResult<String> {
        let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM relay_info WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(AclError::storage(format!("failed to get relay info {}", key)))?;
        Ok(value.flatten().unwrap_or_default())
    }

    /// Overlay stored relay info on top of the configured defaults.
    pub async fn load_relay_info(&self, defaults: RelayInfo) -> AclResult<RelayInfo> {
        let mut info = defaults;
        for key in RelayInfoKey::all() {
            let stored = self.get_metadata(key.as_str()).await?;
            if !stored.is_empty() { info.set(*key, stored); }
        }
        Ok(info)
    }
}
