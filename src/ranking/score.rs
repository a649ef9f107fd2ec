//! Trending score
//!
//! `score = views * 0.1 + comments * 0.4 + upvotes * 0.6`
//!
//! Downvotes never contribute. The score is always recomputed from the
//! current counters, never patched incrementally.

pub const VIEW_WEIGHT: f64 = 0.1;
pub const COMMENT_WEIGHT: f64 = 0.4;
pub const UPVOTE_WEIGHT: f64 = 0.6;

/// Compute a post's trending score from its counters.
///
/// `comment_count` counts comments at every nesting level. Negative inputs
/// (which only malformed rows could produce) are clamped to zero.
pub fn compute_score(view_count: i64, comment_count: i64, upvotes: i64) -> f64 {
    let views = view_count.max(0) as f64;
    let comments = comment_count.max(0) as f64;
    let upvotes = upvotes.max(0) as f64;

    views * VIEW_WEIGHT + comments * COMMENT_WEIGHT + upvotes * UPVOTE_WEIGHT
}
