use serde::{Deserialize, Serialize};

/// Vote request body; `type` is validated by the handler so that a bad value
/// surfaces as a validation error rather than a decoding failure
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    #[serde(rename = "type")]
    pub vote_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostVoteResponse {
    pub message: String,
    pub post_id: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct CommentVoteResponse {
    pub message: String,
    pub comment_id: i64,
    pub post_id: i64,
    pub upvotes: i64,
    pub downvotes: i64,
}
