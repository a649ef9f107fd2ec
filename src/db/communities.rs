use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::map_unique_violation;
use crate::error::{AppError, Result};
use crate::models::{Community, CommunityWithStats};
use crate::store::CommunityStore;

// SQLx can't decode a flattened struct, so stats queries go through this row
#[derive(sqlx::FromRow)]
struct CommunityStatsRow {
    id: i64,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    post_count: Option<i64>,
    last_post_at: Option<DateTime<Utc>>,
}

impl From<CommunityStatsRow> for CommunityWithStats {
    fn from(r: CommunityStatsRow) -> Self {
        CommunityWithStats {
            community: Community {
                id: r.id,
                name: r.name,
                description: r.description,
                created_at: r.created_at,
            },
            post_count: r.post_count.unwrap_or(0),
            last_post_at: r.last_post_at,
        }
    }
}

const STATS_SELECT: &str = r#"
    SELECT
        c.id, c.name, c.description, c.created_at,
        COUNT(p.id) AS post_count,
        MAX(p.created_at) AS last_post_at
    FROM communities c
    LEFT JOIN posts p ON p.community_id = c.id
"#;

#[async_trait]
impl CommunityStore for super::Database {
    async fn create_community(&self, name: &str, description: Option<&str>) -> Result<Community> {
        sqlx::query_as::<_, Community>(
            r#"
            INSERT INTO communities (name, description, created_at)
            VALUES ($1, $2, NOW())
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(
                e,
                "communities_name_key",
                format!("Community '{}' already exists", name),
            )
        })
    }

    async fn get_community_by_name(&self, name: &str) -> Result<Community> {
        sqlx::query_as::<_, Community>("SELECT * FROM communities WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Community '{}' not found", name)))
    }

    async fn list_communities(&self) -> Result<Vec<CommunityWithStats>> {
        let query = format!("{} GROUP BY c.id ORDER BY c.name", STATS_SELECT);
        let rows = sqlx::query_as::<_, CommunityStatsRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_community_with_stats(&self, id: i64) -> Result<CommunityWithStats> {
        let query = format!("{} WHERE c.id = $1 GROUP BY c.id", STATS_SELECT);
        sqlx::query_as::<_, CommunityStatsRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound("Community not found".to_string()))
    }

    async fn get_communities_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Community>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let communities =
            sqlx::query_as::<_, Community>("SELECT * FROM communities WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;

        Ok(communities.into_iter().map(|c| (c.id, c)).collect())
    }
}
