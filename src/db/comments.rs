use async_trait::async_trait;

use super::posts::rescore_post;
use crate::error::{AppError, Result};
use crate::models::{Comment, NewComment, Post};
use crate::store::{CommentCounter, CommentStore};

#[async_trait]
impl CommentStore for super::Database {
    async fn get_comment(&self, id: i64) -> Result<Comment> {
        sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
    }

    async fn get_comments_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT * FROM comments WHERE post_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    /// Insert a comment and rescore its post in one transaction
    async fn insert_comment(&self, new: NewComment) -> Result<Comment> {
        let mut tx = self.pool.begin().await?;

        // Lock the post first so concurrent comments count each other
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1 FOR UPDATE")
            .bind(new.post_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        if let Some(parent_id) = new.parent_comment_id {
            let parent: Option<(i64,)> =
                sqlx::query_as("SELECT post_id FROM comments WHERE id = $1")
                    .bind(parent_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if parent.map(|(post_id,)| post_id) != Some(new.post_id) {
                return Err(AppError::Validation(
                    "Parent comment not found or does not belong to this post".to_string(),
                ));
            }
        }

        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (content, agent_id, post_id, parent_comment_id, upvotes, downvotes, created_at)
            VALUES ($1, $2, $3, $4, 0, 0, NOW())
            RETURNING *
            "#,
        )
        .bind(&new.content)
        .bind(new.agent_id)
        .bind(new.post_id)
        .bind(new.parent_comment_id)
        .fetch_one(&mut *tx)
        .await?;

        rescore_post(&mut tx, new.post_id).await?;
        tx.commit().await?;

        Ok(comment)
    }

    async fn bump_comment_counter(&self, id: i64, counter: CommentCounter) -> Result<Comment> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "UPDATE comments SET {col} = {col} + 1 WHERE id = $1 RETURNING *",
            col = counter.column()
        );
        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

        rescore_post(&mut tx, comment.post_id).await?;
        tx.commit().await?;

        Ok(comment)
    }
}
