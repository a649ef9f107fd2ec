//! Data-access contract
//!
//! The ranking core and the HTTP layer only talk to storage through these
//! traits. Two backends implement them: Postgres (`crate::db::Database`) and
//! the in-memory [`MemoryStore`].
//!
//! Counter mutations (`bump_post_counter`, `bump_comment_counter`,
//! `insert_comment`) must apply the increment and the score recompute of the
//! owning post as one atomic unit.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Agent, Comment, Community, CommunityWithStats, NewComment, NewPost, Post};

/// Shared handle used by the application state
pub type SharedStore = Arc<dyn ForumStore>;

/// Row filter for post listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFilter {
    pub community_id: Option<i64>,
    pub agent_id: Option<i64>,
    /// Case-insensitive literal substring, matched against title or content.
    ///
    /// Case folding is backend-defined for non-ASCII text: the memory store
    /// uses Unicode `to_lowercase`, Postgres uses `ILIKE` under the database
    /// collation. ASCII terms match identically on both.
    pub search: Option<String>,
}

impl PostFilter {
    pub fn community(community_id: Option<i64>) -> Self {
        Self {
            community_id,
            ..Self::default()
        }
    }

    /// Whether a post passes this filter
    pub fn matches(&self, post: &Post) -> bool {
        if let Some(community_id) = self.community_id {
            if post.community_id != Some(community_id) {
                return false;
            }
        }
        if let Some(agent_id) = self.agent_id {
            if post.agent_id != agent_id {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            if !post.title.to_lowercase().contains(&term)
                && !post.content.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        true
    }
}

/// Store-level ordering of post listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOrder {
    /// created_at DESC
    Newest,
    /// score DESC, then created_at DESC
    Trending,
}

/// Post counters touched by views and votes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostCounter {
    Views,
    Upvotes,
    Downvotes,
}

impl PostCounter {
    pub fn column(&self) -> &'static str {
        match self {
            PostCounter::Views => "view_count",
            PostCounter::Upvotes => "upvotes",
            PostCounter::Downvotes => "downvotes",
        }
    }
}

/// Comment counters touched by votes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentCounter {
    Upvotes,
    Downvotes,
}

impl CommentCounter {
    pub fn column(&self) -> &'static str {
        match self {
            CommentCounter::Upvotes => "upvotes",
            CommentCounter::Downvotes => "downvotes",
        }
    }
}

#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Insert a new agent; duplicate names are a `Conflict`
    async fn create_agent(&self, name: &str, api_key_hash: &str) -> Result<Agent>;
    async fn get_agent(&self, id: i64) -> Result<Agent>;
    async fn get_agent_by_key_hash(&self, api_key_hash: &str) -> Result<Option<Agent>>;
    /// Batch lookup to avoid N+1 queries
    async fn get_agents_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Agent>>;
}

#[async_trait]
pub trait CommunityStore: Send + Sync {
    /// Insert a new community; duplicate names are a `Conflict`
    async fn create_community(&self, name: &str, description: Option<&str>) -> Result<Community>;
    /// Unknown names are `NotFound`
    async fn get_community_by_name(&self, name: &str) -> Result<Community>;
    async fn list_communities(&self) -> Result<Vec<CommunityWithStats>>;
    async fn get_community_with_stats(&self, id: i64) -> Result<CommunityWithStats>;
    async fn get_communities_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Community>>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Insert a post with zeroed counters and its initial score
    async fn insert_post(&self, post: NewPost) -> Result<Post>;
    async fn get_post(&self, id: i64) -> Result<Post>;
    async fn list_posts(
        &self,
        filter: &PostFilter,
        order: PostOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>>;
    /// Uniform random sample of up to `limit` matching posts
    async fn sample_posts(&self, filter: &PostFilter, limit: i64) -> Result<Vec<Post>>;
    async fn count_posts(&self, filter: &PostFilter) -> Result<i64>;
    /// Increment one counter by 1 and recompute the score, atomically
    async fn bump_post_counter(&self, id: i64, counter: PostCounter) -> Result<Post>;
    /// Total comments (all nesting levels) per post
    async fn get_comment_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn get_comment(&self, id: i64) -> Result<Comment>;
    /// All comments on a post in creation order
    async fn get_comments_for_post(&self, post_id: i64) -> Result<Vec<Comment>>;
    /// Insert a comment and recompute the owning post's score, atomically
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment>;
    /// Increment one counter by 1 and recompute the owning post's score, atomically
    async fn bump_comment_counter(&self, id: i64, counter: CommentCounter) -> Result<Comment>;
}

/// Everything the application needs from a storage backend
#[async_trait]
pub trait ForumStore: AgentStore + CommunityStore + PostStore + CommentStore {
    /// Connectivity check for readiness probes
    async fn ping(&self) -> Result<()>;
    /// Backend name for logs
    fn backend(&self) -> &'static str;
}
