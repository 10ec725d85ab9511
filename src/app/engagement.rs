use anyhow::Result;
use sqlx::Row;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::bans::BanService;
use crate::app::moderation::ModerationService;
use crate::app::visibility::VisibilityService;
use crate::domain::content::{Comment, ContentKind, Reaction};
use crate::domain::moderation::ModerationAction;
use crate::domain::visibility::{is_visible, EngagementKind, ProfileVisibility, ViewFacts};
use crate::infra::classifier::ContentClassifier;
use crate::infra::db::Db;

/// Engagement failures the HTTP layer must tell apart. A post the viewer
/// may not see reads as missing, never as forbidden.
#[derive(Debug)]
pub enum EngageError {
    PostNotFound,
    NotAllowed,
    Store(anyhow::Error),
}

impl From<sqlx::Error> for EngageError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.into())
    }
}

impl From<anyhow::Error> for EngageError {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(err)
    }
}

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
    classifier: Arc<dyn ContentClassifier>,
}

impl EngagementService {
    pub fn new(db: Db, classifier: Arc<dyn ContentClassifier>) -> Self {
        Self { db, classifier }
    }

    /// React to a visible post. Idempotent: reacting twice returns `None`
    /// the second time without error.
    pub async fn react(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<Option<Reaction>, EngageError> {
        let owner_id = self.visible_post_owner(user_id, post_id).await?;
        self.ensure_can_engage(user_id, owner_id, EngagementKind::React)
            .await?;

        let row = sqlx::query(
            "INSERT INTO reactions (user_id, post_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING \
             RETURNING id, user_id, post_id, created_at",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        let reaction = row.map(|row| Reaction {
            id: row.get("id"),
            user_id: row.get("user_id"),
            post_id: row.get("post_id"),
            created_at: row.get("created_at"),
        });

        Ok(reaction)
    }

    pub async fn unreact(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reactions WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Comment on a visible post. Comments are content: they get the same
    /// single synchronous moderation pass as posts, committed atomically
    /// with the row.
    pub async fn comment(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        body: String,
    ) -> Result<Comment, EngageError> {
        let owner_id = self.visible_post_owner(user_id, post_id).await?;
        self.ensure_can_engage(user_id, owner_id, EngagementKind::Comment)
            .await?;

        let moderation = ModerationService::new(self.db.clone(), self.classifier.clone());
        let bans = BanService::new(self.db.clone());

        let mut tx = self.db.pool().begin().await.map_err(anyhow::Error::from)?;

        let row = sqlx::query(
            "INSERT INTO comments (post_id, owner_id, body) VALUES ($1, $2, $3) \
             RETURNING id, post_id, owner_id, body, flagged, created_at",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(&body)
        .fetch_one(&mut *tx)
        .await?;

        let mut comment = Comment {
            id: row.get("id"),
            post_id: row.get("post_id"),
            owner_id: row.get("owner_id"),
            body: row.get("body"),
            flagged: row.get("flagged"),
            created_at: row.get("created_at"),
        };

        let result = moderation
            .moderate(&comment.body, ContentKind::Comment, comment.id, user_id)
            .await;

        let flagged = result.flagged || result.action == ModerationAction::Removed;
        if flagged {
            sqlx::query("UPDATE comments SET flagged = TRUE WHERE id = $1")
                .bind(comment.id)
                .execute(&mut *tx)
                .await?;
            comment.flagged = true;
        }

        moderation
            .record_decision(&mut tx, ContentKind::Comment, comment.id, user_id, &result)
            .await
            .map_err(EngageError::Store)?;
        bans.apply_escalation(&mut tx, user_id, &result)
            .await
            .map_err(EngageError::Store)?;

        tx.commit().await?;

        Ok(comment)
    }

    /// Comments on a post, newest first, each one filtered through the
    /// visibility evaluator against its own author.
    pub async fn list_comments(
        &self,
        viewer_id: Uuid,
        post_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<(Vec<Comment>, bool), EngageError> {
        self.visible_post_owner(viewer_id, post_id).await?;

        let viewer_university: String =
            sqlx::query_scalar("SELECT university FROM users WHERE id = $1")
                .bind(viewer_id)
                .fetch_one(self.db.pool())
                .await?;

        let mut visible: Vec<Comment> = Vec::new();
        let mut cursor = cursor;
        let batch_size = limit + 1;

        loop {
            let batch = self
                .fetch_comment_batch(viewer_id, post_id, cursor, batch_size)
                .await?;
            let exhausted = (batch.len() as i64) < batch_size;

            if let Some((last, _)) = batch.last() {
                cursor = Some((last.created_at, last.id));
            }

            for (comment, mut facts) in batch {
                facts.viewer_university = viewer_university.clone();
                if is_visible(&facts) {
                    visible.push(comment);
                }
                if visible.len() as i64 > limit {
                    break;
                }
            }

            if visible.len() as i64 > limit || exhausted {
                break;
            }
        }

        let has_more = visible.len() as i64 > limit;
        visible.truncate(limit as usize);

        Ok((visible, has_more))
    }

    async fn fetch_comment_batch(
        &self,
        viewer_id: Uuid,
        post_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<(Comment, ViewFacts)>, EngageError> {
        let rows = match cursor {
            Some((created_at, comment_id)) => {
                sqlx::query(
                    "SELECT c.id, c.post_id, c.owner_id, c.body, c.flagged, c.created_at, \
                            cu.university AS owner_university, \
                            COALESCE(ps.profile_visibility, 'university') AS profile_visibility, \
                            EXISTS ( \
                                SELECT 1 FROM blocks \
                                WHERE (blocker_id = $1 AND blocked_id = c.owner_id) \
                                   OR (blocker_id = c.owner_id AND blocked_id = $1) \
                            ) AS blocked_either_way \
                     FROM comments c \
                     JOIN users cu ON cu.id = c.owner_id \
                     LEFT JOIN privacy_settings ps ON ps.user_id = c.owner_id \
                     WHERE c.post_id = $2 \
                       AND (c.created_at < $3 OR (c.created_at = $3 AND c.id < $4)) \
                     ORDER BY c.created_at DESC, c.id DESC \
                     LIMIT $5",
                )
                .bind(viewer_id)
                .bind(post_id)
                .bind(created_at)
                .bind(comment_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT c.id, c.post_id, c.owner_id, c.body, c.flagged, c.created_at, \
                            cu.university AS owner_university, \
                            COALESCE(ps.profile_visibility, 'university') AS profile_visibility, \
                            EXISTS ( \
                                SELECT 1 FROM blocks \
                                WHERE (blocker_id = $1 AND blocked_id = c.owner_id) \
                                   OR (blocker_id = c.owner_id AND blocked_id = $1) \
                            ) AS blocked_either_way \
                     FROM comments c \
                     JOIN users cu ON cu.id = c.owner_id \
                     LEFT JOIN privacy_settings ps ON ps.user_id = c.owner_id \
                     WHERE c.post_id = $2 \
                     ORDER BY c.created_at DESC, c.id DESC \
                     LIMIT $3",
                )
                .bind(viewer_id)
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let comment = Comment {
                id: row.get("id"),
                post_id: row.get("post_id"),
                owner_id: row.get("owner_id"),
                body: row.get("body"),
                flagged: row.get("flagged"),
                created_at: row.get("created_at"),
            };
            let profile_visibility: String = row.get("profile_visibility");
            let profile_visibility = ProfileVisibility::from_db(&profile_visibility)
                .ok_or_else(|| {
                    anyhow::anyhow!("unknown profile visibility: {}", profile_visibility)
                })?;
            let facts = ViewFacts {
                viewer_id,
                owner_id: comment.owner_id,
                flagged: comment.flagged,
                blocked_either_way: row.get("blocked_either_way"),
                owner_profile_visibility: profile_visibility,
                viewer_university: String::new(),
                owner_university: row.get("owner_university"),
            };
            items.push((comment, facts));
        }

        Ok(items)
    }

    /// The post's owner when the post exists and is visible to `viewer`.
    /// Invisible posts fail exactly like missing ones.
    async fn visible_post_owner(
        &self,
        viewer_id: Uuid,
        post_id: Uuid,
    ) -> Result<Uuid, EngageError> {
        let row = sqlx::query("SELECT owner_id, flagged FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        let Some(row) = row else {
            return Err(EngageError::PostNotFound);
        };
        let owner_id: Uuid = row.get("owner_id");
        let flagged: bool = row.get("flagged");

        let visibility = VisibilityService::new(self.db.clone());
        if !visibility.can_view(viewer_id, owner_id, flagged).await {
            return Err(EngageError::PostNotFound);
        }

        Ok(owner_id)
    }

    async fn ensure_can_engage(
        &self,
        viewer_id: Uuid,
        owner_id: Uuid,
        kind: EngagementKind,
    ) -> Result<(), EngageError> {
        let visibility = VisibilityService::new(self.db.clone());
        let allowed = visibility
            .can_engage(viewer_id, owner_id, kind)
            .await
            .map_err(EngageError::Store)?;

        if allowed {
            Ok(())
        } else {
            Err(EngageError::NotAllowed)
        }
    }
}
