use anyhow::Result;
use sqlx::Row;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::bans::BanService;
use crate::domain::content::ContentKind;
use crate::domain::moderation::{
    BanStatus, ModerationAction, ModerationRecord, ModerationResult,
};
use crate::infra::classifier::ContentClassifier;
use crate::infra::db::Db;

/// Hard ceiling on one classification round trip; the HTTP client carries
/// its own timeout, this bounds any implementation.
const CLASSIFY_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct ModerationService {
    db: Db,
    classifier: Arc<dyn ContentClassifier>,
}

impl ModerationService {
    pub fn new(db: Db, classifier: Arc<dyn ContentClassifier>) -> Self {
        Self { db, classifier }
    }

    /// Classify one piece of content. Never fails: any transport, timeout,
    /// or service error degrades to the safe default (manual review), so the
    /// submission path never sees a classifier outage and content never
    /// ends up auto-approved or auto-removed on error.
    pub async fn moderate(
        &self,
        body: &str,
        kind: ContentKind,
        content_id: Uuid,
        user_id: Uuid,
    ) -> ModerationResult {
        let submitted = self.classifier.submit(body, kind, content_id, user_id);

        match tokio::time::timeout(CLASSIFY_DEADLINE, submitted).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                tracing::warn!(
                    error = ?err,
                    content_type = kind.as_db(),
                    content_id = %content_id,
                    user_id = %user_id,
                    "classifier failed, falling back to manual review"
                );
                ModerationResult::safe_default()
            }
            Err(_) => {
                tracing::warn!(
                    content_type = kind.as_db(),
                    content_id = %content_id,
                    user_id = %user_id,
                    "classifier timed out, falling back to manual review"
                );
                ModerationResult::safe_default()
            }
        }
    }

    /// Append the decision to the audit trail inside the caller's
    /// transaction, so the record commits with the content it covers.
    pub async fn record_decision(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        kind: ContentKind,
        content_id: Uuid,
        user_id: Uuid,
        result: &ModerationResult,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO moderation_records (content_type, content_id, user_id, action, violations) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(kind.as_db())
        .bind(content_id)
        .bind(user_id)
        .bind(result.action.as_db())
        .bind(&result.violations)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Derived projection over ban rows, recomputed on every call. A row
    /// counts only while `is_active` and unexpired; nothing ever sweeps
    /// stale rows.
    pub async fn check_user_ban_status(&self, user_id: Uuid) -> Result<BanStatus> {
        let ban = BanService::new(self.db.clone()).current_ban(user_id).await?;

        let status = match ban {
            Some(ban) => BanStatus {
                is_banned: true,
                ban_type: Some(ban.ban_type),
                expires_at: ban.expires_at,
            },
            None => BanStatus::not_banned(),
        };

        Ok(status)
    }

    pub async fn list_audit(
        &self,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<ModerationRecord>> {
        let rows = match cursor {
            Some((created_at, record_id)) => {
                sqlx::query(
                    "SELECT id, content_type, content_id, user_id, action, violations, created_at \
                     FROM moderation_records \
                     WHERE (created_at < $1 OR (created_at = $1 AND id < $2)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $3",
                )
                .bind(created_at)
                .bind(record_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, content_type, content_id, user_id, action, violations, created_at \
                     FROM moderation_records \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $1",
                )
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let action: String = row.get("action");
            let action = ModerationAction::from_db(&action)
                .ok_or_else(|| anyhow::anyhow!("unknown moderation action: {}", action))?;
            records.push(ModerationRecord {
                id: row.get("id"),
                content_type: row.get("content_type"),
                content_id: row.get("content_id"),
                user_id: row.get("user_id"),
                action,
                violations: row.get("violations"),
                created_at: row.get("created_at"),
            });
        }

        Ok(records)
    }
}
