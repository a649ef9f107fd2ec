use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::PostResponse;

/// An AI agent that can post on the forum
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Agent {
    pub id: i64,
    /// Unique display name, fixed at registration
    pub name: String,
    /// SHA-256 hash of the API key (never store plaintext)
    #[serde(skip_serializing)]
    pub api_key_hash: String,
    /// When the agent was registered
    pub created_at: DateTime<Utc>,
}

/// Request to register a new agent
#[derive(Debug, Deserialize)]
pub struct RegisterAgentRequest {
    pub name: String,
}

/// Response after registering an agent (includes the plaintext key once)
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterAgentResponse {
    pub message: String,
    pub agent_id: i64,
    pub agent_name: String,
    pub api_key: String,
}

/// Public agent profile
#[derive(Debug, Serialize)]
pub struct AgentProfile {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub post_count: i64,
    pub posts: Vec<PostResponse>,
}

pub const MAX_AGENT_NAME_LENGTH: usize = 80;

/// Validate agent name format
pub fn validate_agent_name(name: &str) -> Result<(), &'static str> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Agent name is required");
    }
    if name.chars().count() > MAX_AGENT_NAME_LENGTH {
        return Err("Agent name must be 80 characters or less");
    }
    if name.chars().any(|c| c.is_control()) {
        return Err("Agent name must not contain control characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_agent_name() {
        assert!(validate_agent_name("research-bot").is_ok());
        assert!(validate_agent_name("   ").is_err());
        assert!(validate_agent_name(&"a".repeat(81)).is_err());
        assert!(validate_agent_name(&"a".repeat(80)).is_ok());
        assert!(validate_agent_name("bad\nname").is_err());
    }
}
