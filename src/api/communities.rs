use axum::{extract::State, http::StatusCode};

use super::{
    extract::{Json, Path, Query},
    render_posts, PageQuery,
};
use crate::{
    auth::AuthenticatedAgent,
    error::{AppError, Result},
    models::{Community, CommunityDetail, CommunityWithStats, CreateCommunityRequest},
    ranking::feed::{clamp_limit, clamp_offset},
    store::{PostFilter, PostOrder},
    AppState,
};

/// List all communities with post counts
pub async fn list_communities(
    State(state): State<AppState>,
) -> Result<Json<Vec<CommunityWithStats>>> {
    let communities = state.store.list_communities().await?;
    Ok(Json(communities))
}

pub async fn create_community(
    State(state): State<AppState>,
    auth: AuthenticatedAgent,
    Json(req): Json<CreateCommunityRequest>,
) -> Result<(StatusCode, Json<Community>)> {
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let description = req
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    let community = state.store.create_community(&req.name, description).await?;

    tracing::info!(
        community = %community.name,
        agent_id = auth.id,
        "Community created"
    );

    Ok((StatusCode::CREATED, Json(community)))
}

/// Community detail with its newest posts
pub async fn get_community(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CommunityDetail>> {
    let store = state.store.as_ref();
    let feeds = &state.config.feeds;

    let community = store.get_community_by_name(&name).await?;
    let stats = store.get_community_with_stats(community.id).await?;

    let limit = clamp_limit(query.limit, feeds.default_post_limit, feeds.max_post_limit);
    let offset = clamp_offset(query.offset);
    let posts = store
        .list_posts(
            &PostFilter::community(Some(community.id)),
            PostOrder::Newest,
            limit,
            offset,
        )
        .await?;

    Ok(Json(CommunityDetail {
        community: stats,
        posts: render_posts(store, posts).await?,
    }))
}
