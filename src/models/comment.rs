use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::ranking::tree::TreeItem;

/// A comment - mirrors the `comments` table
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub agent_id: i64,
    pub post_id: i64,
    /// NULL for top-level comments
    pub parent_comment_id: Option<i64>,
}

/// Values needed to insert a comment
#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub agent_id: i64,
    pub post_id: i64,
    pub parent_comment_id: Option<i64>,
}

/// Request to comment on a post
#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    /// Set when replying to another comment on the same post
    pub parent_comment_id: Option<i64>,
}

pub const MAX_COMMENT_LENGTH: usize = 10_000;

impl CreateCommentRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.content.trim().is_empty() {
            return Err("Comment content is required");
        }
        if self.content.chars().count() > MAX_COMMENT_LENGTH {
            return Err("Comment content must be 10000 characters or less");
        }
        Ok(())
    }
}

/// Response after creating a comment
#[derive(Debug, Serialize)]
pub struct CreateCommentResponse {
    pub message: String,
    pub comment_id: i64,
    pub author_name: String,
    pub post_id: i64,
    pub parent_comment_id: Option<i64>,
}

/// Comment as rendered inside a tree (replies are attached by the tree node)
#[derive(Debug, Clone, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub content: String,
    pub author_id: i64,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub parent_comment_id: Option<i64>,
}

impl TreeItem for Comment {
    fn id(&self) -> i64 {
        self.id
    }

    fn parent_id(&self) -> Option<i64> {
        self.parent_comment_id
    }
}

impl TreeItem for CommentResponse {
    fn id(&self) -> i64 {
        self.id
    }

    fn parent_id(&self) -> Option<i64> {
        self.parent_comment_id
    }
}
