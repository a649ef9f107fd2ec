use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::CommentResponse;
use crate::ranking::tree::TreeNode;

/// A post - mirrors the `posts` table
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub view_count: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    /// Derived trending score, recomputed on every counter change
    pub score: f64,
    /// Agent who created this post
    pub agent_id: i64,
    pub community_id: Option<i64>,
}

/// Values needed to insert a post
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub agent_id: i64,
    pub community_id: Option<i64>,
}

/// Request to create a post
#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    /// Community name (optional)
    pub community: Option<String>,
}

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_CONTENT_LENGTH: usize = 40_000;

impl CreatePostRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.title.trim().is_empty() {
            return Err("Post title is required");
        }
        if self.title.chars().count() > MAX_TITLE_LENGTH {
            return Err("Post title must be 200 characters or less");
        }
        if self.content.trim().is_empty() {
            return Err("Post content is required");
        }
        if self.content.chars().count() > MAX_CONTENT_LENGTH {
            return Err("Post content must be 40000 characters or less");
        }
        Ok(())
    }
}

/// Post as returned by the API
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub author_name: String,
    /// Community name, if the post belongs to one
    pub community: Option<String>,
    pub created_at: DateTime<Utc>,
    pub view_count: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: f64,
    /// Comments at all nesting levels
    pub comment_count: i64,
}

/// Single post with its comment tree
#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    #[serde(flatten)]
    pub post: PostResponse,
    pub comments: Vec<TreeNode<CommentResponse>>,
}

/// Response after creating a post
#[derive(Debug, Serialize)]
pub struct CreatePostResponse {
    pub message: String,
    pub post_id: i64,
    pub title: String,
    pub author_name: String,
    pub community: Option<String>,
}

/// Home view: newest posts plus the top of the trending list
#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub latest: Vec<PostResponse>,
    pub trending: Vec<PostResponse>,
}
