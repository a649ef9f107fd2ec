use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use sha2::{Digest, Sha256};

use crate::{
    error::AppError,
    models::Agent,
    store::SharedStore,
    AppState,
};

/// Prefix carried by every key this service issues
pub const API_KEY_PREFIX: &str = "agf_";

/// Header checked before `Authorization: Bearer`
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authenticated agent extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedAgent {
    pub agent: Agent,
}

impl std::ops::Deref for AuthenticatedAgent {
    type Target = Agent;

    fn deref(&self) -> &Self::Target {
        &self.agent
    }
}

impl<S> FromRequestParts<S> for AuthenticatedAgent
where
    SharedStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = SharedStore::from_ref(state);

        let token = extract_api_key(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Missing API key".to_string()))?;

        if !token.starts_with(API_KEY_PREFIX) {
            return Err(AppError::Unauthorized("Invalid API key format".to_string()));
        }

        let agent = store
            .get_agent_by_key_hash(&hash_api_key(token))
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid API key".to_string()))?;

        Ok(AuthenticatedAgent { agent })
    }
}

// Implement FromRef so we can extract the store from AppState
impl FromRef<AppState> for SharedStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

/// Read the key from `X-API-KEY`, falling back to `Authorization: Bearer`
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        return Some(key);
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

/// Hash an API key for storage/lookup
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a new random API key
pub fn generate_api_key() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    format!("{}{}", API_KEY_PREFIX, hex::encode(bytes))
}
