use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::PublicUser;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct BlockService {
    db: Db,
}

#[derive(Debug, Clone)]
pub struct BlockedUserEdge {
    pub user: PublicUser,
    pub blocked_at: OffsetDateTime,
}

impl BlockService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Insert a block edge. Returns `true` when a new edge was created and
    /// `false` when the pair was already blocked; both are success. The
    /// unique constraint on (blocker_id, blocked_id) resolves concurrent
    /// identical calls, so the conflict itself is the success signal.
    pub async fn block(&self, blocker_id: Uuid, blocked_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO blocks (blocker_id, blocked_id) \
             SELECT $1, $2 \
             WHERE $1 <> $2 \
             ON CONFLICT DO NOTHING",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Idempotent removal; a missing edge is not an error.
    pub async fn unblock(&self, blocker_id: Uuid, blocked_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM blocks WHERE blocker_id = $1 AND blocked_id = $2",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_blocked_either_way(&self, a: Uuid, b: Uuid) -> Result<bool> {
        let blocked: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                 SELECT 1 FROM blocks \
                 WHERE (blocker_id = $1 AND blocked_id = $2) \
                    OR (blocker_id = $2 AND blocked_id = $1) \
             )",
        )
        .bind(a)
        .bind(b)
        .fetch_one(self.db.pool())
        .await?;

        Ok(blocked)
    }

    /// The blocker's list, newest first, with display fields resolved at
    /// read time.
    pub async fn list_blocked(
        &self,
        blocker_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<BlockedUserEdge>> {
        let rows = match cursor {
            Some((created_at, blocked_id)) => {
                sqlx::query(
                    "SELECT u.id, u.handle, u.display_name, u.university, \
                            u.created_at, b.created_at AS blocked_at \
                     FROM blocks b \
                     JOIN users u ON u.id = b.blocked_id \
                     WHERE b.blocker_id = $1 \
                       AND (b.created_at < $2 OR (b.created_at = $2 AND b.blocked_id < $3)) \
                     ORDER BY b.created_at DESC, b.blocked_id DESC \
                     LIMIT $4",
                )
                .bind(blocker_id)
                .bind(created_at)
                .bind(blocked_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT u.id, u.handle, u.display_name, u.university, \
                            u.created_at, b.created_at AS blocked_at \
                     FROM blocks b \
                     JOIN users u ON u.id = b.blocked_id \
                     WHERE b.blocker_id = $1 \
                     ORDER BY b.created_at DESC, b.blocked_id DESC \
                     LIMIT $2",
                )
                .bind(blocker_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(BlockedUserEdge {
                user: PublicUser {
                    id: row.get("id"),
                    handle: row.get("handle"),
                    display_name: row.get("display_name"),
                    university: row.get("university"),
                    created_at: row.get("created_at"),
                },
                blocked_at: row.get("blocked_at"),
            });
        }

        Ok(items)
    }
}
