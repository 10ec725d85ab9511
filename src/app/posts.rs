use anyhow::Result;
use sqlx::Row;
use std::sync::Arc;
use uuid::Uuid;

use crate::app::bans::BanService;
use crate::app::moderation::ModerationService;
use crate::app::visibility::VisibilityService;
use crate::domain::content::{ContentKind, Post};
use crate::domain::moderation::ModerationAction;
use crate::infra::classifier::ContentClassifier;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct PostService {
    db: Db,
    classifier: Arc<dyn ContentClassifier>,
}

impl PostService {
    pub fn new(db: Db, classifier: Arc<dyn ContentClassifier>) -> Self {
        Self { db, classifier }
    }

    /// Create a post. The insert, the synchronous moderation decision, the
    /// flagged-state application, the audit record, and any ban escalation
    /// commit together; concurrent readers never observe the row before its
    /// moderation outcome is final.
    pub async fn create_post(&self, owner_id: Uuid, body: String) -> Result<Post> {
        let moderation = ModerationService::new(self.db.clone(), self.classifier.clone());
        let bans = BanService::new(self.db.clone());

        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(
            "WITH inserted_post AS ( \
                INSERT INTO posts (owner_id, body) \
                VALUES ($1, $2) \
                RETURNING id, owner_id, body, flagged, created_at \
             ) \
             SELECT p.*, u.handle AS owner_handle, u.display_name AS owner_display_name \
             FROM inserted_post p \
             JOIN users u ON u.id = p.owner_id",
        )
        .bind(owner_id)
        .bind(&body)
        .fetch_one(&mut *tx)
        .await?;

        let mut post = Post {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            owner_handle: Some(row.get("owner_handle")),
            owner_display_name: Some(row.get("owner_display_name")),
            body: row.get("body"),
            flagged: row.get("flagged"),
            created_at: row.get("created_at"),
        };

        let result = moderation
            .moderate(&post.body, ContentKind::Post, post.id, owner_id)
            .await;

        let flagged = result.flagged || result.action == ModerationAction::Removed;
        if flagged {
            sqlx::query("UPDATE posts SET flagged = TRUE WHERE id = $1")
                .bind(post.id)
                .execute(&mut *tx)
                .await?;
            post.flagged = true;
        }

        moderation
            .record_decision(&mut tx, ContentKind::Post, post.id, owner_id, &result)
            .await?;
        bans.apply_escalation(&mut tx, owner_id, &result).await?;

        tx.commit().await?;

        Ok(post)
    }

    /// Visibility-evaluated read: an invisible post and a missing post are
    /// indistinguishable to the viewer.
    pub async fn get_post(&self, post_id: Uuid, viewer_id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(
            "SELECT p.id, p.owner_id, u.handle AS owner_handle, \
                    u.display_name AS owner_display_name, \
                    p.body, p.flagged, p.created_at \
             FROM posts p \
             JOIN users u ON u.id = p.owner_id \
             WHERE p.id = $1",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let post = Post {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            owner_handle: Some(row.get("owner_handle")),
            owner_display_name: Some(row.get("owner_display_name")),
            body: row.get("body"),
            flagged: row.get("flagged"),
            created_at: row.get("created_at"),
        };

        let visibility = VisibilityService::new(self.db.clone());
        if !visibility.can_view(viewer_id, post.owner_id, post.flagged).await {
            return Ok(None);
        }

        Ok(Some(post))
    }

    pub async fn delete_post(&self, post_id: Uuid, owner_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND owner_id = $2")
            .bind(post_id)
            .bind(owner_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
