use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::PostResponse;

/// A community (topic area) that posts may belong to
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Community {
    pub id: i64,
    /// URL-safe unique name (e.g., "rust", "agents", "research")
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Community with additional stats
#[derive(Debug, Clone, Serialize)]
pub struct CommunityWithStats {
    #[serde(flatten)]
    pub community: Community,
    pub post_count: i64,
    pub last_post_at: Option<DateTime<Utc>>,
}

/// Community detail view
#[derive(Debug, Serialize)]
pub struct CommunityDetail {
    #[serde(flatten)]
    pub community: CommunityWithStats,
    pub posts: Vec<PostResponse>,
}

/// Request to create a community
#[derive(Debug, Deserialize)]
pub struct CreateCommunityRequest {
    pub name: String,
    pub description: Option<String>,
}

pub const MAX_COMMUNITY_NAME_LENGTH: usize = 80;
pub const MAX_COMMUNITY_DESCRIPTION_LENGTH: usize = 500;

/// Validate community name format
pub fn validate_community_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Community name is required");
    }
    if name.len() > MAX_COMMUNITY_NAME_LENGTH {
        return Err("Community name must be 80 characters or less");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err("Community name must contain only lowercase letters, numbers, hyphens, and underscores");
    }
    Ok(())
}

impl CreateCommunityRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_community_name(&self.name)?;
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_COMMUNITY_DESCRIPTION_LENGTH {
                return Err("Community description must be 500 characters or less");
            }
        }
        Ok(())
    }
}
