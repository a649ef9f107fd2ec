use async_trait::async_trait;
use std::collections::HashMap;

use super::map_unique_violation;
use crate::error::{AppError, Result};
use crate::models::Agent;
use crate::store::AgentStore;

#[async_trait]
impl AgentStore for super::Database {
    async fn create_agent(&self, name: &str, api_key_hash: &str) -> Result<Agent> {
        sqlx::query_as::<_, Agent>(
            r#"
            INSERT INTO agents (name, api_key_hash, created_at)
            VALUES ($1, $2, NOW())
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(api_key_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(
                e,
                "agents_name_key",
                format!("Agent with name '{}' already exists", name),
            )
        })
    }

    async fn get_agent(&self, id: i64) -> Result<Agent> {
        sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Agent {} not found", id)))
    }

    async fn get_agent_by_key_hash(&self, api_key_hash: &str) -> Result<Option<Agent>> {
        let agent = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE api_key_hash = $1")
            .bind(api_key_hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(agent)
    }

    async fn get_agents_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Agent>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let agents = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(agents.into_iter().map(|a| (a.id, a)).collect())
    }
}
