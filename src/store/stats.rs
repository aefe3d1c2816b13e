use serde::Serialize;

use super::AclStore;
use crate::error::{AclError, AclResult};

/// Row counts of the moderation lists, read in one statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ListCounts {
    pub allowed_pubkeys: i64,
    pub banned_pubkeys: i64,
    pub events_needing_moderation: i64,
    pub allowed_events: i64,
    pub banned_events: i64,
    pub allowed_kinds: i64,
    pub disallowed_kinds: i64,
    pub blocked_ips: i64,
    pub admins: i64,
}

const COUNT_SQL: &str = "SELECT \
    (SELECT COUNT(*) FROM allowed_pubkeys) AS allowed_pubkeys, \
    (SELECT COUNT(*) FROM banned_pubkeys) AS banned_pubkeys, \
    (SELECT COUNT(*) FROM events_needing_moderation) AS events_needing_moderation, \
    (SELECT COUNT(*) FROM allowed_events) AS allowed_events, \
    (SELECT COUNT(*) FROM banned_events) AS banned_events, \
    (SELECT COUNT(*) FROM allowed_kinds) AS allowed_kinds, \
    (SELECT COUNT(*) FROM disallowed_kinds) AS disallowed_kinds, \
    (SELECT COUNT(*) FROM blocked_ips) AS blocked_ips, \
    (SELECT COUNT(*) FROM admins) AS admins";

impl AclStore {
    pub async fn count_lists(&self) -> AclResult<ListCounts> {
        sqlx::query_as::<_, ListCounts>(COUNT_SQL)
            .fetch_one(&self.pool)
            .await
            .map_err(AclError::storage("failed to count acl lists"))
    }
}
