use anyhow::{anyhow, Result};
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::moderation::{Ban, BanType, ModerationResult};
use crate::infra::db::Db;

/// Persists and queries ban rows driven by moderation escalation signals.
/// The escalation policy itself (who gets banned, for how long) lives in the
/// upstream classifier; this service only enforces what it is told.
#[derive(Clone)]
pub struct BanService {
    db: Db,
}

impl BanService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Materialize the ban a moderation result asked for, inside the
    /// caller's transaction. A bounded duration becomes a shadow ban
    /// expiring `duration` days from now; no duration means permanent.
    /// No-op when the result carries no ban signal.
    pub async fn apply_escalation(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
        result: &ModerationResult,
    ) -> Result<Option<Ban>> {
        if !result.requests_ban() {
            return Ok(None);
        }

        let (ban_type, expires_at) = match result.ban_duration_days {
            Some(days) => (
                BanType::ShadowBan,
                Some(OffsetDateTime::now_utc() + Duration::days(days)),
            ),
            None => (BanType::PermanentBan, None),
        };

        let row = sqlx::query(
            "INSERT INTO bans (user_id, ban_type, expires_at, is_active) \
             VALUES ($1, $2, $3, TRUE) \
             RETURNING id, user_id, ban_type, expires_at, is_active, created_at",
        )
        .bind(user_id)
        .bind(ban_type.as_db())
        .bind(expires_at)
        .fetch_one(&mut **tx)
        .await?;

        let ban = parse_ban_row(&row)?;

        tracing::warn!(
            user_id = %user_id,
            ban_type = ban.ban_type.as_db(),
            expires_at = ?ban.expires_at,
            "ban applied from moderation escalation"
        );

        Ok(Some(ban))
    }

    /// The most recent currently-effective ban, or `None`. Effectiveness is
    /// `is_active AND (expires_at IS NULL OR expires_at > now())`, evaluated
    /// here at read time; `is_active` alone is never trusted.
    pub async fn current_ban(&self, user_id: Uuid) -> Result<Option<Ban>> {
        let row = sqlx::query(
            "SELECT id, user_id, ban_type, expires_at, is_active, created_at \
             FROM bans \
             WHERE user_id = $1 \
               AND is_active = TRUE \
               AND (expires_at IS NULL OR expires_at > NOW()) \
             ORDER BY created_at DESC \
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(parse_ban_row).transpose()
    }
}

fn parse_ban_row(row: &sqlx::postgres::PgRow) -> Result<Ban> {
    let ban_type: String = row.get("ban_type");
    Ok(Ban {
        id: row.get("id"),
        user_id: row.get("user_id"),
        ban_type: BanType::from_db(&ban_type)
            .ok_or_else(|| anyhow!("unknown ban type: {}", ban_type))?,
        expires_at: row.get("expires_at"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    })
}
