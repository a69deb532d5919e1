use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::pagination::{Page, PageRequest};
use crate::app::posts::{post_from_row, POST_COLUMNS};
use crate::app::users::{user_from_row, USER_COLUMNS};
use crate::domain::post::Post;
use crate::domain::social_graph::Follow;
use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

#[derive(Debug, Clone)]
pub struct SocialUserEdge {
    pub user: User,
    pub followed_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct RelationshipStatus {
    pub is_following: bool,
    pub is_followed_by: bool,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Adds `follower_id -> followed_id`. Returns the new edge, or `None`
    /// when it already existed.
    pub async fn follow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<Option<Follow>> {
        let row = sqlx::query(
            "INSERT INTO follows (follower_id, followed_id) \
             VALUES ($1, $2) \
             ON CONFLICT DO NOTHING \
             RETURNING follower_id, followed_id, created_at",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_optional(self.db.pool())
        .await?;

        let follow = row.map(|row| Follow {
            follower_id: row.get("follower_id"),
            followed_id: row.get("followed_id"),
            created_at: row.get("created_at"),
        });
        if let Some(follow) = &follow {
            tracing::debug!(follower_id = %follow.follower_id, followed_id = %follow.followed_id, "follow added");
        }

        Ok(follow)
    }

    /// Removes the edge if present. The self-edge is never removed.
    pub async fn unfollow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        if follower_id == followed_id {
            return Ok(false);
        }

        let result = sqlx::query(
            "DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2",
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_following(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(exists)
    }

    pub async fn is_followed_by(&self, user_id: Uuid, follower_id: Uuid) -> Result<bool> {
        self.is_following(follower_id, user_id).await
    }

    pub async fn relationship_status(
        &self,
        viewer_id: Uuid,
        other_id: Uuid,
    ) -> Result<RelationshipStatus> {
        let row = sqlx::query(
            "SELECT \
                EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2) AS is_following, \
                EXISTS (SELECT 1 FROM follows WHERE follower_id = $2 AND followed_id = $1) AS is_followed_by",
        )
        .bind(viewer_id)
        .bind(other_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(RelationshipStatus {
            is_following: row.get("is_following"),
            is_followed_by: row.get("is_followed_by"),
        })
    }

    /// Accounts following `user_id`, oldest edge first, self excluded.
    pub async fn list_followers(
        &self,
        user_id: Uuid,
        request: PageRequest,
    ) -> Result<Page<SocialUserEdge>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM follows WHERE followed_id = $1 AND follower_id <> $1",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        let rows = sqlx::query(&format!(
            "SELECT {}, f.created_at AS followed_at \
             FROM follows f \
             JOIN users u ON u.id = f.follower_id \
             WHERE f.followed_id = $1 AND f.follower_id <> $1 \
             ORDER BY f.created_at ASC, f.follower_id ASC \
             LIMIT $2 OFFSET $3",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(self.db.pool())
        .await?;

        let items = rows
            .iter()
            .map(|row| SocialUserEdge {
                user: user_from_row(row),
                followed_at: row.get("followed_at"),
            })
            .collect();

        Ok(Page::new(items, request, total))
    }

    /// Accounts `user_id` follows, oldest edge first, self excluded.
    pub async fn list_following(
        &self,
        user_id: Uuid,
        request: PageRequest,
    ) -> Result<Page<SocialUserEdge>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM follows WHERE follower_id = $1 AND followed_id <> $1",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        let rows = sqlx::query(&format!(
            "SELECT {}, f.created_at AS followed_at \
             FROM follows f \
             JOIN users u ON u.id = f.followed_id \
             WHERE f.follower_id = $1 AND f.followed_id <> $1 \
             ORDER BY f.created_at ASC, f.followed_id ASC \
             LIMIT $2 OFFSET $3",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(self.db.pool())
        .await?;

        let items = rows
            .iter()
            .map(|row| SocialUserEdge {
                user: user_from_row(row),
                followed_at: row.get("followed_at"),
            })
            .collect();

        Ok(Page::new(items, request, total))
    }

    /// Timeline: posts by everyone `user_id` follows, its own included via
    /// the self-edge, oldest first.
    pub async fn followed_posts(&self, user_id: Uuid, request: PageRequest) -> Result<Page<Post>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM posts p \
             JOIN follows f ON f.followed_id = p.author_id \
             WHERE f.follower_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts p \
             JOIN follows f ON f.followed_id = p.author_id \
             WHERE f.follower_id = $1 \
             ORDER BY p.created_at ASC, p.id ASC \
             LIMIT $2 OFFSET $3",
            POST_COLUMNS
        ))
        .bind(user_id)
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(self.db.pool())
        .await?;

        Ok(Page::new(rows.iter().map(post_from_row).collect(), request, total))
    }
}
