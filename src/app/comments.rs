use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::pagination::{Page, PageRequest};
use crate::domain::markup::RenderedBody;
use crate::domain::post::Comment;
use crate::infra::db::Db;

const COMMENT_COLUMNS: &str =
    "c.id, c.post_id, c.author_id, c.body, c.body_html, c.disabled, c.created_at";

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        body: row.get("body"),
        body_html: row.get("body_html"),
        disabled: row.get("disabled"),
        created_at: row.get("created_at"),
    }
}

#[derive(Clone)]
pub struct CommentService {
    db: Db,
}

impl CommentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Attaches a comment to `post_id`; `None` when the post does not exist.
    pub async fn create_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        body: RenderedBody,
    ) -> Result<Option<Comment>> {
        let row = sqlx::query(&format!(
            "INSERT INTO comments AS c (post_id, author_id, body, body_html) \
             SELECT p.id, $2, $3, $4 FROM posts p WHERE p.id = $1 \
             RETURNING {}",
            COMMENT_COLUMNS
        ))
        .bind(post_id)
        .bind(author_id)
        .bind(body.body())
        .bind(body.body_html())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    pub async fn get_comment(&self, comment_id: Uuid) -> Result<Option<Comment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM comments c WHERE c.id = $1",
            COMMENT_COLUMNS
        ))
        .bind(comment_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    /// Comments under one post, oldest first.
    pub async fn list_for_post(&self, post_id: Uuid, request: PageRequest) -> Result<Page<Comment>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM comments c \
             WHERE c.post_id = $1 \
             ORDER BY c.created_at ASC, c.id ASC \
             LIMIT $2 OFFSET $3",
            COMMENT_COLUMNS
        ))
        .bind(post_id)
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(self.db.pool())
        .await?;

        Ok(Page::new(rows.iter().map(comment_from_row).collect(), request, total))
    }

    pub async fn list_comments(&self, request: PageRequest) -> Result<Page<Comment>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
            .fetch_one(self.db.pool())
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM comments c \
             ORDER BY c.created_at ASC, c.id ASC \
             LIMIT $1 OFFSET $2",
            COMMENT_COLUMNS
        ))
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(self.db.pool())
        .await?;

        Ok(Page::new(rows.iter().map(comment_from_row).collect(), request, total))
    }

    pub async fn set_disabled(&self, comment_id: Uuid, disabled: bool) -> Result<Option<Comment>> {
        let row = sqlx::query(&format!(
            "UPDATE comments AS c SET disabled = $2 WHERE c.id = $1 RETURNING {}",
            COMMENT_COLUMNS
        ))
        .bind(comment_id)
        .bind(disabled)
        .fetch_optional(self.db.pool())
        .await?;

        let comment = row.as_ref().map(comment_from_row);
        if comment.is_some() {
            tracing::info!(comment_id = %comment_id, disabled, "comment moderated");
        }

        Ok(comment)
    }
}
