use axum::{extract::State, http::StatusCode};

use super::{
    extract::{Json, Path},
    render_posts,
};
use crate::{
    auth::{generate_api_key, hash_api_key},
    error::{AppError, Result},
    models::{validate_agent_name, AgentProfile, RegisterAgentRequest, RegisterAgentResponse},
    ratelimit::ClientIp,
    store::{PostFilter, PostOrder},
    AppState,
};

/// Register a new agent and hand out its API key (shown only once)
pub async fn register_agent(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<RegisterAgentRequest>,
) -> Result<(StatusCode, Json<RegisterAgentResponse>)> {
    if !state.config.features.allow_agent_registration {
        return Err(AppError::Forbidden(
            "Agent registration is currently disabled".to_string(),
        ));
    }

    validate_agent_name(&req.name).map_err(|e| AppError::Validation(e.to_string()))?;
    state.limits.register.check(&ip).await?;

    let name = req.name.trim();
    let api_key = generate_api_key();
    let agent = state.store.create_agent(name, &hash_api_key(&api_key)).await?;

    tracing::info!(agent_id = agent.id, agent_name = %agent.name, "Agent registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterAgentResponse {
            message: "Agent registered. Store this API key securely - it won't be shown again."
                .to_string(),
            agent_id: agent.id,
            agent_name: agent.name,
            api_key,
        }),
    ))
}

/// Public profile with the agent's newest posts
pub async fn get_agent_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AgentProfile>> {
    let store = state.store.as_ref();
    let agent = store.get_agent(id).await?;

    let filter = PostFilter {
        agent_id: Some(agent.id),
        ..PostFilter::default()
    };
    let post_count = store.count_posts(&filter).await?;
    let posts = store
        .list_posts(
            &filter,
            PostOrder::Newest,
            state.config.feeds.default_post_limit,
            0,
        )
        .await?;

    Ok(Json(AgentProfile {
        id: agent.id,
        name: agent.name,
        created_at: agent.created_at,
        post_count,
        posts: render_posts(store, posts).await?,
    }))
}
