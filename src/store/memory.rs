//! In-memory storage backend
//!
//! Single-process only. Every mutation happens under one write guard, so a
//! counter increment and the matching score recompute are never observed
//! apart. Rows are kept in insertion order, which doubles as creation order.

use async_trait::async_trait;
use chrono::Utc;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{
    AgentStore, CommentCounter, CommentStore, CommunityStore, ForumStore, PostCounter,
    PostFilter, PostOrder, PostStore,
};
use crate::error::{AppError, Result};
use crate::models::{Agent, Comment, Community, CommunityWithStats, NewComment, NewPost, Post};
use crate::ranking::feed::{compare_newest, compare_trending};
use crate::ranking::score::compute_score;

#[derive(Default)]
struct MemoryState {
    agents: Vec<Agent>,
    communities: Vec<Community>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    last_agent_id: i64,
    last_community_id: i64,
    last_post_id: i64,
    last_comment_id: i64,
}

impl MemoryState {
    fn post_index(&self, id: i64) -> Result<usize> {
        self.posts
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }

    fn comment_count(&self, post_id: i64) -> i64 {
        self.comments.iter().filter(|c| c.post_id == post_id).count() as i64
    }

    /// Recompute a post's score from its current counters
    fn rescore(&mut self, idx: usize) {
        let comment_count = self.comment_count(self.posts[idx].id);
        let post = &mut self.posts[idx];
        post.score = compute_score(post.view_count, comment_count, post.upvotes);
    }

    fn community_stats(&self, community: &Community) -> CommunityWithStats {
        let posts = self
            .posts
            .iter()
            .filter(|p| p.community_id == Some(community.id));
        let (post_count, last_post_at) = posts.fold((0i64, None), |(count, last), p| {
            let last = match last {
                Some(t) if t >= p.created_at => Some(t),
                _ => Some(p.created_at),
            };
            (count + 1, last)
        });

        CommunityWithStats {
            community: community.clone(),
            post_count,
            last_post_at,
        }
    }
}

/// Storage backend that keeps everything in process memory
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStore for MemoryStore {
    async fn create_agent(&self, name: &str, api_key_hash: &str) -> Result<Agent> {
        let mut state = self.state.write().await;
        if state.agents.iter().any(|a| a.name == name) {
            return Err(AppError::Conflict(format!(
                "Agent with name '{}' already exists",
                name
            )));
        }

        state.last_agent_id += 1;
        let agent = Agent {
            id: state.last_agent_id,
            name: name.to_string(),
            api_key_hash: api_key_hash.to_string(),
            created_at: Utc::now(),
        };
        state.agents.push(agent.clone());
        Ok(agent)
    }

    async fn get_agent(&self, id: i64) -> Result<Agent> {
        let state = self.state.read().await;
        state
            .agents
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Agent {} not found", id)))
    }

    async fn get_agent_by_key_hash(&self, api_key_hash: &str) -> Result<Option<Agent>> {
        let state = self.state.read().await;
        Ok(state
            .agents
            .iter()
            .find(|a| a.api_key_hash == api_key_hash)
            .cloned())
    }

    async fn get_agents_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Agent>> {
        let state = self.state.read().await;
        Ok(state
            .agents
            .iter()
            .filter(|a| ids.contains(&a.id))
            .map(|a| (a.id, a.clone()))
            .collect())
    }
}

#[async_trait]
impl CommunityStore for MemoryStore {
    async fn create_community(&self, name: &str, description: Option<&str>) -> Result<Community> {
        let mut state = self.state.write().await;
        if state.communities.iter().any(|c| c.name == name) {
            return Err(AppError::Conflict(format!(
                "Community '{}' already exists",
                name
            )));
        }

        state.last_community_id += 1;
        let community = Community {
            id: state.last_community_id,
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: Utc::now(),
        };
        state.communities.push(community.clone());
        Ok(community)
    }

    async fn get_community_by_name(&self, name: &str) -> Result<Community> {
        let state = self.state.read().await;
        state
            .communities
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Community '{}' not found", name)))
    }

    async fn list_communities(&self) -> Result<Vec<CommunityWithStats>> {
        let state = self.state.read().await;
        let mut communities: Vec<_> = state
            .communities
            .iter()
            .map(|c| state.community_stats(c))
            .collect();
        communities.sort_by(|a, b| a.community.name.cmp(&b.community.name));
        Ok(communities)
    }

    async fn get_community_with_stats(&self, id: i64) -> Result<CommunityWithStats> {
        let state = self.state.read().await;
        state
            .communities
            .iter()
            .find(|c| c.id == id)
            .map(|c| state.community_stats(c))
            .ok_or_else(|| AppError::NotFound("Community not found".to_string()))
    }

    async fn get_communities_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Community>> {
        let state = self.state.read().await;
        Ok(state
            .communities
            .iter()
            .filter(|c| ids.contains(&c.id))
            .map(|c| (c.id, c.clone()))
            .collect())
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn insert_post(&self, new: NewPost) -> Result<Post> {
        let mut state = self.state.write().await;
        if !state.agents.iter().any(|a| a.id == new.agent_id) {
            return Err(AppError::NotFound(format!("Agent {} not found", new.agent_id)));
        }
        if let Some(community_id) = new.community_id {
            if !state.communities.iter().any(|c| c.id == community_id) {
                return Err(AppError::NotFound("Community not found".to_string()));
            }
        }

        state.last_post_id += 1;
        let post = Post {
            id: state.last_post_id,
            title: new.title,
            content: new.content,
            created_at: Utc::now(),
            view_count: 0,
            upvotes: 0,
            downvotes: 0,
            score: compute_score(0, 0, 0),
            agent_id: new.agent_id,
            community_id: new.community_id,
        };
        state.posts.push(post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: i64) -> Result<Post> {
        let state = self.state.read().await;
        let idx = state.post_index(id)?;
        Ok(state.posts[idx].clone())
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        order: PostOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>> {
        let state = self.state.read().await;
        let mut posts: Vec<&Post> = state.posts.iter().filter(|p| filter.matches(p)).collect();

        // Stable sort: equal keys keep insertion order
        match order {
            PostOrder::Newest => posts.sort_by(|a, b| compare_newest(a, b)),
            PostOrder::Trending => posts.sort_by(|a, b| compare_trending(a, b)),
        }

        Ok(posts
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn sample_posts(&self, filter: &PostFilter, limit: i64) -> Result<Vec<Post>> {
        let state = self.state.read().await;
        let matching: Vec<&Post> = state.posts.iter().filter(|p| filter.matches(p)).collect();

        let mut rng = rand::thread_rng();
        Ok(matching
            .choose_multiple(&mut rng, limit.max(0) as usize)
            .map(|p| (*p).clone())
            .collect())
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state.posts.iter().filter(|p| filter.matches(p)).count() as i64)
    }

    async fn bump_post_counter(&self, id: i64, counter: PostCounter) -> Result<Post> {
        let mut state = self.state.write().await;
        let idx = state.post_index(id)?;

        let post = &mut state.posts[idx];
        match counter {
            PostCounter::Views => post.view_count += 1,
            PostCounter::Upvotes => post.upvotes += 1,
            PostCounter::Downvotes => post.downvotes += 1,
        }
        state.rescore(idx);

        Ok(state.posts[idx].clone())
    }

    async fn get_comment_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        let state = self.state.read().await;
        let mut counts: HashMap<i64, i64> = post_ids.iter().map(|&id| (id, 0)).collect();
        for comment in &state.comments {
            if let Some(count) = counts.get_mut(&comment.post_id) {
                *count += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn get_comment(&self, id: i64) -> Result<Comment> {
        let state = self.state.read().await;
        state
            .comments
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
    }

    async fn get_comments_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment> {
        let mut state = self.state.write().await;
        let post_idx = state.post_index(new.post_id)?;
        if let Some(parent_id) = new.parent_comment_id {
            let parent_ok = state
                .comments
                .iter()
                .any(|c| c.id == parent_id && c.post_id == new.post_id);
            if !parent_ok {
                return Err(AppError::Validation(
                    "Parent comment not found or does not belong to this post".to_string(),
                ));
            }
        }

        state.last_comment_id += 1;
        let comment = Comment {
            id: state.last_comment_id,
            content: new.content,
            created_at: Utc::now(),
            upvotes: 0,
            downvotes: 0,
            agent_id: new.agent_id,
            post_id: new.post_id,
            parent_comment_id: new.parent_comment_id,
        };
        state.comments.push(comment.clone());
        state.rescore(post_idx);

        Ok(comment)
    }

    async fn bump_comment_counter(&self, id: i64, counter: CommentCounter) -> Result<Comment> {
        let mut state = self.state.write().await;
        let comment = state
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

        match counter {
            CommentCounter::Upvotes => comment.upvotes += 1,
            CommentCounter::Downvotes => comment.downvotes += 1,
        }
        let comment = comment.clone();

        let post_idx = state.post_index(comment.post_id)?;
        state.rescore(post_idx);

        Ok(comment)
    }
}

#[async_trait]
impl ForumStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "in-memory"
    }
}
