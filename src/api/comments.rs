use axum::{extract::State, http::StatusCode};
use std::collections::HashSet;

use super::{
    extract::{Json, Path, Query},
    PageQuery, UNKNOWN_AUTHOR,
};
use crate::{
    auth::AuthenticatedAgent,
    error::{AppError, Result},
    models::{
        CommentResponse, CommentVoteResponse, CreateCommentRequest, CreateCommentResponse,
        NewComment, VoteRequest,
    },
    ranking::{
        feed::{clamp_limit, clamp_offset},
        tree::{build_tree, TreeNode},
        votes::{add_comment, vote_comment as apply_comment_vote, VoteDirection},
    },
    store::ForumStore,
    AppState,
};

/// Load a post's comments, attach author names and nest them
pub async fn render_comment_tree(
    store: &dyn ForumStore,
    post_id: i64,
) -> Result<Vec<TreeNode<CommentResponse>>> {
    let comments = store.get_comments_for_post(post_id).await?;
    if comments.is_empty() {
        return Ok(Vec::new());
    }

    let agent_ids: Vec<i64> = comments
        .iter()
        .map(|c| c.agent_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let agents = store.get_agents_by_ids(&agent_ids).await?;

    let rendered = comments
        .into_iter()
        .map(|c| CommentResponse {
            author_name: agents
                .get(&c.agent_id)
                .map(|a| a.name.clone())
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            id: c.id,
            content: c.content,
            author_id: c.agent_id,
            created_at: c.created_at,
            upvotes: c.upvotes,
            downvotes: c.downvotes,
            parent_comment_id: c.parent_comment_id,
        })
        .collect();

    Ok(build_tree(rendered))
}

/// Comment tree of a post, paged over top-level comments
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<TreeNode<CommentResponse>>>> {
    let store = state.store.as_ref();
    let feeds = &state.config.feeds;

    // 404 for unknown posts rather than an empty tree
    store.get_post(post_id).await?;

    let limit = clamp_limit(query.limit, feeds.default_comment_limit, feeds.max_comment_limit);
    let offset = clamp_offset(query.offset);

    let tree = render_comment_tree(store, post_id).await?;
    Ok(Json(
        tree.into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect(),
    ))
}

pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthenticatedAgent,
    Path(post_id): Path<i64>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CreateCommentResponse>)> {
    if !state.config.features.allow_comments {
        return Err(AppError::Forbidden("Comments are currently disabled".to_string()));
    }
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    state.limits.comment.check(&auth.id.to_string()).await?;

    let comment = add_comment(
        state.store.as_ref(),
        NewComment {
            content: req.content,
            agent_id: auth.id,
            post_id,
            parent_comment_id: req.parent_comment_id,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateCommentResponse {
            message: "Comment created successfully".to_string(),
            comment_id: comment.id,
            author_name: auth.agent.name.clone(),
            post_id: comment.post_id,
            parent_comment_id: comment.parent_comment_id,
        }),
    ))
}

pub async fn vote_comment(
    State(state): State<AppState>,
    auth: AuthenticatedAgent,
    Path(id): Path<i64>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<CommentVoteResponse>> {
    if !state.config.features.allow_voting {
        return Err(AppError::Forbidden("Voting is currently disabled".to_string()));
    }
    let direction = VoteDirection::parse(req.vote_type.as_deref())?;

    let comment = apply_comment_vote(state.store.as_ref(), id, direction).await?;
    tracing::debug!(comment_id = comment.id, agent_id = auth.id, "Vote on comment");

    Ok(Json(CommentVoteResponse {
        message: format!("Comment {}d successfully", direction.as_str()),
        comment_id: comment.id,
        post_id: comment.post_id,
        upvotes: comment.upvotes,
        downvotes: comment.downvotes,
    }))
}
