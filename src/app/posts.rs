use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::pagination::{Page, PageRequest};
use crate::domain::markup::RenderedBody;
use crate::domain::post::Post;
use crate::infra::db::Db;

pub(crate) const POST_COLUMNS: &str = "p.id, p.author_id, p.body, p.body_html, p.created_at, \
     (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count";

pub(crate) fn post_from_row(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        body: row.get("body"),
        body_html: row.get("body_html"),
        created_at: row.get("created_at"),
        comment_count: row.get("comment_count"),
    }
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(&self, author_id: Uuid, body: RenderedBody) -> Result<Post> {
        let row = sqlx::query(&format!(
            "INSERT INTO posts AS p (author_id, body, body_html) \
             VALUES ($1, $2, $3) \
             RETURNING {}",
            POST_COLUMNS
        ))
        .bind(author_id)
        .bind(body.body())
        .bind(body.body_html())
        .fetch_one(self.db.pool())
        .await?;

        let post = post_from_row(&row);
        tracing::debug!(post_id = %post.id, author_id = %author_id, "post created");
        Ok(post)
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM posts p WHERE p.id = $1",
            POST_COLUMNS
        ))
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    /// Replaces the body; `body_html` is re-derived with it.
    pub async fn update_body(&self, post_id: Uuid, body: RenderedBody) -> Result<Option<Post>> {
        let row = sqlx::query(&format!(
            "UPDATE posts AS p SET body = $2, body_html = $3 \
             WHERE p.id = $1 \
             RETURNING {}",
            POST_COLUMNS
        ))
        .bind(post_id)
        .bind(body.body())
        .bind(body.body_html())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    pub async fn list_posts(&self, request: PageRequest) -> Result<Page<Post>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(self.db.pool())
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts p \
             ORDER BY p.created_at ASC, p.id ASC \
             LIMIT $1 OFFSET $2",
            POST_COLUMNS
        ))
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(self.db.pool())
        .await?;

        Ok(Page::new(rows.iter().map(post_from_row).collect(), request, total))
    }

    pub async fn list_by_author(&self, author_id: Uuid, request: PageRequest) -> Result<Page<Post>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(self.db.pool())
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts p \
             WHERE p.author_id = $1 \
             ORDER BY p.created_at ASC, p.id ASC \
             LIMIT $2 OFFSET $3",
            POST_COLUMNS
        ))
        .bind(author_id)
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(self.db.pool())
        .await?;

        Ok(Page::new(rows.iter().map(post_from_row).collect(), request, total))
    }
}
