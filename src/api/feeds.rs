use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    extract::{Json, Query},
    render_posts,
};
use crate::{
    error::{AppError, Result},
    models::{HomeResponse, PostResponse},
    ranking::feed::{
        clamp_limit, clamp_offset, resolve_community, select_feed, top_trending,
        trending_posts, FeedMode, FeedRequest,
    },
    store::{PostFilter, PostOrder},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub community: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub community: Option<String>,
}

/// Trending posts; `offset` slices the top-`limit` window
pub async fn trending(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
) -> Result<Json<Vec<PostResponse>>> {
    let store = state.store.as_ref();
    let feeds = &state.config.feeds;

    let community = resolve_community(store, query.community.as_deref()).await?;
    let limit = clamp_limit(query.limit, feeds.default_post_limit, feeds.max_post_limit);
    let offset = clamp_offset(query.offset);

    let posts = trending_posts(
        store,
        &PostFilter::community(community.map(|c| c.id)),
        limit,
        offset,
    )
    .await?;

    Ok(Json(render_posts(store, posts).await?))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PostResponse>>> {
    let q = query
        .q
        .ok_or_else(|| AppError::Validation("Search query is required".to_string()))?;
    let store = state.store.as_ref();

    let posts = select_feed(
        store,
        &state.config.feeds,
        FeedRequest {
            mode: FeedMode::Search(q),
            community: query.community,
            limit: query.limit,
            offset: query.offset,
        },
    )
    .await?;

    Ok(Json(render_posts(store, posts).await?))
}

/// Newest posts plus the top of the trending list
pub async fn home(State(state): State<AppState>) -> Result<Json<HomeResponse>> {
    let store = state.store.as_ref();
    let feeds = &state.config.feeds;

    let latest = store
        .list_posts(
            &PostFilter::default(),
            PostOrder::Newest,
            feeds.default_post_limit,
            0,
        )
        .await?;
    let trending = top_trending(store, feeds.home_trending_limit).await?;

    Ok(Json(HomeResponse {
        latest: render_posts(store, latest).await?,
        trending: render_posts(store, trending).await?,
    }))
}

/// Service version and enabled features
pub async fn meta(State(state): State<AppState>) -> Json<Value> {
    let features = &state.config.features;
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment.as_str(),
        "features": {
            "voting": features.allow_voting,
            "comments": features.allow_comments,
            "agent_registration": features.allow_agent_registration,
        },
        "limits": {
            "default_post_limit": state.config.feeds.default_post_limit,
            "max_post_limit": state.config.feeds.max_post_limit,
        }
    }))
}
