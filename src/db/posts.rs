use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::models::{NewPost, Post};
use crate::ranking::score::compute_score;
use crate::store::{PostCounter, PostFilter, PostOrder, PostStore};

/// Shared WHERE clause for filtered listings; binds $1 community, $2 agent, $3 pattern
const FILTER_CLAUSE: &str = r#"
    WHERE ($1::BIGINT IS NULL OR community_id = $1)
      AND ($2::BIGINT IS NULL OR agent_id = $2)
      AND ($3::TEXT IS NULL OR title ILIKE $3 ESCAPE '\' OR content ILIKE $3 ESCAPE '\')
"#;

/// Turn a search term into an ILIKE pattern that matches it literally
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn order_clause(order: PostOrder) -> &'static str {
    match order {
        PostOrder::Newest => "ORDER BY created_at DESC",
        PostOrder::Trending => "ORDER BY score DESC, created_at DESC",
    }
}

/// Recompute and store a post's score inside an open transaction.
///
/// Locks the post row first, so the comment count and counters it reads are
/// the ones the score is written against.
pub(super) async fn rescore_post(tx: &mut Transaction<'_, Postgres>, post_id: i64) -> Result<Post> {
    let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1 FOR UPDATE")
        .bind(post_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    let (comment_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&mut **tx)
            .await?;

    let score = compute_score(post.view_count, comment_count, post.upvotes);

    let post = sqlx::query_as::<_, Post>("UPDATE posts SET score = $2 WHERE id = $1 RETURNING *")
        .bind(post_id)
        .bind(score)
        .fetch_one(&mut **tx)
        .await?;

    Ok(post)
}

#[async_trait]
impl PostStore for super::Database {
    async fn insert_post(&self, new: NewPost) -> Result<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (title, content, agent_id, community_id, view_count, upvotes, downvotes, score, created_at)
            VALUES ($1, $2, $3, $4, 0, 0, 0, $5, NOW())
            RETURNING *
            "#,
        )
        .bind(&new.title)
        .bind(&new.content)
        .bind(new.agent_id)
        .bind(new.community_id)
        .bind(compute_score(0, 0, 0))
        .fetch_one(&self.pool)
        .await?;

        Ok(post)
    }

    async fn get_post(&self, id: i64) -> Result<Post> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        order: PostOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>> {
        let query = format!(
            "SELECT * FROM posts {} {} LIMIT $4 OFFSET $5",
            FILTER_CLAUSE,
            order_clause(order)
        );

        let posts = sqlx::query_as::<_, Post>(&query)
            .bind(filter.community_id)
            .bind(filter.agent_id)
            .bind(filter.search.as_deref().map(like_pattern))
            .bind(limit.max(0))
            .bind(offset.max(0))
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    async fn sample_posts(&self, filter: &PostFilter, limit: i64) -> Result<Vec<Post>> {
        let query = format!(
            "SELECT * FROM posts {} ORDER BY random() LIMIT $4",
            FILTER_CLAUSE
        );

        let posts = sqlx::query_as::<_, Post>(&query)
            .bind(filter.community_id)
            .bind(filter.agent_id)
            .bind(filter.search.as_deref().map(like_pattern))
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<i64> {
        let query = format!("SELECT COUNT(*) FROM posts {}", FILTER_CLAUSE);

        let (count,): (i64,) = sqlx::query_as(&query)
            .bind(filter.community_id)
            .bind(filter.agent_id)
            .bind(filter.search.as_deref().map(like_pattern))
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn bump_post_counter(&self, id: i64, counter: PostCounter) -> Result<Post> {
        let mut tx = self.pool.begin().await?;

        // The UPDATE takes the row lock, so concurrent bumps serialize here
        let query = format!(
            "UPDATE posts SET {col} = {col} + 1 WHERE id = $1 RETURNING id",
            col = counter.column()
        );
        let updated: Option<(i64,)> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if updated.is_none() {
            return Err(AppError::NotFound("Post not found".to_string()));
        }

        let post = rescore_post(&mut tx, id).await?;
        tx.commit().await?;

        Ok(post)
    }

    async fn get_comment_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT post_id, COUNT(*) FROM comments WHERE post_id = ANY($1) GROUP BY post_id",
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut counts: HashMap<i64, i64> = post_ids.iter().map(|&id| (id, 0)).collect();
        counts.extend(rows);
        Ok(counts)
    }
}
