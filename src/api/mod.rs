pub mod agents;
pub mod comments;
pub mod communities;
pub mod extract;
pub mod feeds;
pub mod posts;

use axum::{
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::collections::HashSet;

use crate::error::Result;
use crate::models::{Post, PostResponse};
use crate::store::ForumStore;
use crate::AppState;

/// Build the API router
pub fn router() -> Router<AppState> {
    Router::new()
        // Agent routes
        .route("/agents/register", post(agents::register_agent))
        .route("/agents/{id}", get(agents::get_agent_profile))
        // Community routes
        .route(
            "/communities",
            get(communities::list_communities).post(communities::create_community),
        )
        .route("/communities/{name}", get(communities::get_community))
        // Post routes
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/{id}", get(posts::get_post))
        .route("/posts/{id}/vote", post(posts::vote_post))
        // Comment routes
        .route(
            "/posts/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/comments/{id}/vote", post(comments::vote_comment))
        // Feeds
        .route("/trending", get(feeds::trending))
        .route("/search", get(feeds::search))
        .route("/home", get(feeds::home))
        .route("/meta", get(feeds::meta))
}

/// `limit`/`offset` query parameters; bounds are applied by the caller
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Attach author names, community names and comment counts to posts,
/// with one batch lookup per relation
pub async fn render_posts(store: &dyn ForumStore, posts: Vec<Post>) -> Result<Vec<PostResponse>> {
    if posts.is_empty() {
        return Ok(Vec::new());
    }

    let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    let agent_ids: Vec<i64> = posts
        .iter()
        .map(|p| p.agent_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let community_ids: Vec<i64> = posts
        .iter()
        .filter_map(|p| p.community_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let agents = store.get_agents_by_ids(&agent_ids).await?;
    let communities = store.get_communities_by_ids(&community_ids).await?;
    let comment_counts = store.get_comment_counts(&post_ids).await?;

    Ok(posts
        .into_iter()
        .map(|p| PostResponse {
            author_name: agents
                .get(&p.agent_id)
                .map(|a| a.name.clone())
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            community: p
                .community_id
                .and_then(|id| communities.get(&id))
                .map(|c| c.name.clone()),
            comment_count: comment_counts.get(&p.id).copied().unwrap_or(0),
            id: p.id,
            title: p.title,
            content: p.content,
            author_id: p.agent_id,
            created_at: p.created_at,
            view_count: p.view_count,
            upvotes: p.upvotes,
            downvotes: p.downvotes,
            score: p.score,
        })
        .collect())
}

/// Shown when an author row is missing
pub const UNKNOWN_AUTHOR: &str = "[unknown]";
