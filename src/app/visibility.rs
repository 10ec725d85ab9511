use anyhow::{anyhow, Result};
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::content::Post;
use crate::domain::visibility::{
    can_engage, is_visible, EngagementKind, EngagementPolicy, ProfileVisibility, ViewFacts,
};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct VisibilityService {
    db: Db,
}

/// One page of a visibility-filtered listing. `has_more` and `total_count`
/// count rows that survived the visibility evaluator, never raw rows.
#[derive(Debug, Clone)]
pub struct VisiblePage {
    pub items: Vec<Post>,
    pub has_more: bool,
    pub total_count: i64,
}

impl VisibilityService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Gather everything the pure predicate needs about one (viewer, owner)
    /// pair in a single round trip. Errors if either user is missing.
    pub async fn view_facts(
        &self,
        viewer_id: Uuid,
        owner_id: Uuid,
        flagged: bool,
    ) -> Result<ViewFacts> {
        let row = sqlx::query(
            "SELECT vu.university AS viewer_university, \
                    ou.university AS owner_university, \
                    COALESCE(ps.profile_visibility, 'university') AS profile_visibility, \
                    EXISTS ( \
                        SELECT 1 FROM blocks \
                        WHERE (blocker_id = $1 AND blocked_id = $2) \
                           OR (blocker_id = $2 AND blocked_id = $1) \
                    ) AS blocked_either_way \
             FROM users vu \
             JOIN users ou ON ou.id = $2 \
             LEFT JOIN privacy_settings ps ON ps.user_id = ou.id \
             WHERE vu.id = $1",
        )
        .bind(viewer_id)
        .bind(owner_id)
        .fetch_one(self.db.pool())
        .await?;

        let profile_visibility: String = row.get("profile_visibility");
        let profile_visibility = ProfileVisibility::from_db(&profile_visibility)
            .ok_or_else(|| anyhow!("unknown profile visibility: {}", profile_visibility))?;

        Ok(ViewFacts {
            viewer_id,
            owner_id,
            flagged,
            blocked_either_way: row.get("blocked_either_way"),
            owner_profile_visibility: profile_visibility,
            viewer_university: row.get("viewer_university"),
            owner_university: row.get("owner_university"),
        })
    }

    /// Fail-closed visibility check: any failure while gathering facts hides
    /// the content rather than leaking it.
    pub async fn can_view(&self, viewer_id: Uuid, owner_id: Uuid, flagged: bool) -> bool {
        match self.view_facts(viewer_id, owner_id, flagged).await {
            Ok(facts) => is_visible(&facts),
            Err(err) => {
                tracing::error!(
                    error = ?err,
                    viewer_id = %viewer_id,
                    owner_id = %owner_id,
                    "visibility facts unavailable, hiding content"
                );
                false
            }
        }
    }

    /// Whether `viewer` may react to or comment on `owner`'s content.
    pub async fn can_engage(
        &self,
        viewer_id: Uuid,
        owner_id: Uuid,
        kind: EngagementKind,
    ) -> Result<bool> {
        let row = sqlx::query(
            "SELECT vu.university AS viewer_university, \
                    ou.university AS owner_university, \
                    COALESCE(ps.who_can_react, 'everyone') AS who_can_react, \
                    COALESCE(ps.who_can_comment, 'everyone') AS who_can_comment, \
                    EXISTS ( \
                        SELECT 1 FROM blocks \
                        WHERE (blocker_id = $1 AND blocked_id = $2) \
                           OR (blocker_id = $2 AND blocked_id = $1) \
                    ) AS blocked_either_way \
             FROM users vu \
             JOIN users ou ON ou.id = $2 \
             LEFT JOIN privacy_settings ps ON ps.user_id = ou.id \
             WHERE vu.id = $1",
        )
        .bind(viewer_id)
        .bind(owner_id)
        .fetch_one(self.db.pool())
        .await?;

        let policy: String = match kind {
            EngagementKind::React => row.get("who_can_react"),
            EngagementKind::Comment => row.get("who_can_comment"),
        };
        let policy = EngagementPolicy::from_db(&policy)
            .ok_or_else(|| anyhow!("unknown engagement policy: {}", policy))?;

        let viewer_university: String = row.get("viewer_university");
        let owner_university: String = row.get("owner_university");

        Ok(can_engage(
            row.get("blocked_either_way"),
            policy,
            &viewer_university,
            &owner_university,
        ))
    }

    /// Paginated listing of one owner's posts as seen by `viewer`. Each
    /// candidate row passes through the visibility evaluator before it is
    /// counted; batches keep fetching until the page is full or the rows run
    /// out, so flagged rows never leave holes in a page.
    pub async fn list_visible_posts(
        &self,
        owner_id: Uuid,
        viewer_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<VisiblePage> {
        let facts = self.view_facts(viewer_id, owner_id, false).await?;

        let mut visible: Vec<Post> = Vec::new();
        let mut cursor = cursor;
        let batch_size = limit + 1;

        loop {
            let batch = self.fetch_post_batch(owner_id, cursor, batch_size).await?;
            let exhausted = (batch.len() as i64) < batch_size;

            if let Some(last) = batch.last() {
                cursor = Some((last.created_at, last.id));
            }

            for post in batch {
                let facts = ViewFacts {
                    flagged: post.flagged,
                    ..facts.clone()
                };
                if is_visible(&facts) {
                    visible.push(post);
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

        let total_count = self.count_visible_posts(&facts).await?;

        Ok(VisiblePage {
            items: visible,
            has_more,
            total_count,
        })
    }

    async fn fetch_post_batch(
        &self,
        owner_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let rows = match cursor {
            Some((created_at, post_id)) => {
                sqlx::query(
                    "SELECT p.id, p.owner_id, u.handle AS owner_handle, \
                            u.display_name AS owner_display_name, \
                            p.body, p.flagged, p.created_at \
                     FROM posts p \
                     JOIN users u ON u.id = p.owner_id \
                     WHERE p.owner_id = $1 \
                       AND (p.created_at < $2 OR (p.created_at = $2 AND p.id < $3)) \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $4",
                )
                .bind(owner_id)
                .bind(created_at)
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT p.id, p.owner_id, u.handle AS owner_handle, \
                            u.display_name AS owner_display_name, \
                            p.body, p.flagged, p.created_at \
                     FROM posts p \
                     JOIN users u ON u.id = p.owner_id \
                     WHERE p.owner_id = $1 \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $2",
                )
                .bind(owner_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            posts.push(Post {
                id: row.get("id"),
                owner_id: row.get("owner_id"),
                owner_handle: Some(row.get("owner_handle")),
                owner_display_name: Some(row.get("owner_display_name")),
                body: row.get("body"),
                flagged: row.get("flagged"),
                created_at: row.get("created_at"),
            });
        }

        Ok(posts)
    }

    /// Post-filter total for the pair: the evaluator decides which flagged
    /// states count, the store only counts matching rows.
    async fn count_visible_posts(&self, facts: &ViewFacts) -> Result<i64> {
        let counts_unflagged = is_visible(&ViewFacts {
            flagged: false,
            ..facts.clone()
        });
        let counts_flagged = is_visible(&ViewFacts {
            flagged: true,
            ..facts.clone()
        });

        if !counts_unflagged && !counts_flagged {
            return Ok(0);
        }

        let total: i64 = if counts_flagged {
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE owner_id = $1")
                .bind(facts.owner_id)
                .fetch_one(self.db.pool())
                .await?
        } else {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM posts WHERE owner_id = $1 AND flagged = FALSE",
            )
            .bind(facts.owner_id)
            .fetch_one(self.db.pool())
            .await?
        };

        Ok(total)
    }
}
