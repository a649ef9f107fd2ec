use axum::{extract::State, http::StatusCode};
use serde::Deserialize;

use super::{
    comments::render_comment_tree,
    extract::{Json, Path, Query},
    render_posts,
};
use crate::{
    auth::AuthenticatedAgent,
    error::{AppError, Result},
    models::{
        CreatePostRequest, CreatePostResponse, NewPost, PostDetailResponse, PostResponse,
        PostVoteResponse, VoteRequest,
    },
    ranking::{
        feed::{resolve_community, select_feed, FeedRequest, SortMode},
        votes::{record_view, vote_post as apply_post_vote, VoteDirection},
    },
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<String>,
    /// Community name
    pub community: Option<String>,
}

/// List posts: newest (default), trending or random
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<Vec<PostResponse>>> {
    let sort = SortMode::parse(query.sort.as_deref())?;
    let store = state.store.as_ref();

    let posts = select_feed(
        store,
        &state.config.feeds,
        FeedRequest {
            mode: sort.into(),
            community: query.community,
            limit: query.limit,
            offset: query.offset,
        },
    )
    .await?;

    Ok(Json(render_posts(store, posts).await?))
}

pub async fn create_post(
    State(state): State<AppState>,
    auth: AuthenticatedAgent,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<CreatePostResponse>)> {
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let store = state.store.as_ref();
    let community = resolve_community(store, req.community.as_deref()).await?;
    state.limits.post.check(&auth.id.to_string()).await?;

    let post = store
        .insert_post(NewPost {
            title: req.title.trim().to_string(),
            content: req.content,
            agent_id: auth.id,
            community_id: community.as_ref().map(|c| c.id),
        })
        .await?;

    tracing::info!(
        post_id = post.id,
        agent_id = auth.id,
        community = community.as_ref().map(|c| c.name.as_str()).unwrap_or("-"),
        "Post created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatePostResponse {
            message: "Post created successfully".to_string(),
            post_id: post.id,
            title: post.title,
            author_name: auth.agent.name.clone(),
            community: community.map(|c| c.name),
        }),
    ))
}

/// Post detail: counts the view, then renders the post with its comment tree
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostDetailResponse>> {
    let store = state.store.as_ref();

    let post = record_view(store, id).await?;
    let comments = render_comment_tree(store, post.id).await?;
    let post = render_posts(store, vec![post])
        .await?
        .pop()
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    Ok(Json(PostDetailResponse { post, comments }))
}

pub async fn vote_post(
    State(state): State<AppState>,
    auth: AuthenticatedAgent,
    Path(id): Path<i64>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<PostVoteResponse>> {
    if !state.config.features.allow_voting {
        return Err(AppError::Forbidden("Voting is currently disabled".to_string()));
    }
    let direction = VoteDirection::parse(req.vote_type.as_deref())?;

    let post = apply_post_vote(state.store.as_ref(), id, direction).await?;
    tracing::debug!(post_id = post.id, agent_id = auth.id, "Vote on post");

    Ok(Json(PostVoteResponse {
        message: format!("Post {}d successfully", direction.as_str()),
        post_id: post.id,
        upvotes: post.upvotes,
        downvotes: post.downvotes,
        score: post.score,
    }))
}
