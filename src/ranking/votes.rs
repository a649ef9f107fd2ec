//! Vote, view and comment mutators
//!
//! Each call increments exactly one counter by one. The owning post's score
//! is recomputed by the store in the same atomic unit. There is no per-agent
//! de-duplication: an agent may vote on the same target any number of times.

use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::models::{Comment, NewComment, Post};
use crate::store::{CommentCounter, ForumStore, PostCounter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    Upvote,
    Downvote,
}

fn invalid_vote_type() -> AppError {
    AppError::Validation("Invalid vote type. Use 'upvote' or 'downvote'".to_string())
}

impl FromStr for VoteDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "upvote" => Ok(VoteDirection::Upvote),
            "downvote" => Ok(VoteDirection::Downvote),
            _ => Err(invalid_vote_type()),
        }
    }
}

impl VoteDirection {

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteDirection::Upvote => "upvote",
            VoteDirection::Downvote => "downvote",
        }
    }

    /// Parse the `type` field of a vote body
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        raw.ok_or_else(invalid_vote_type)?.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    Post(i64),
    Comment(i64),
}

/// Counters after a vote
#[derive(Debug, Clone)]
pub enum VoteOutcome {
    Post(Post),
    Comment(Comment),
}

pub async fn apply_vote(
    store: &dyn ForumStore,
    target: VoteTarget,
    direction: VoteDirection,
) -> Result<VoteOutcome> {
    match target {
        VoteTarget::Post(id) => vote_post(store, id, direction).await.map(VoteOutcome::Post),
        VoteTarget::Comment(id) => vote_comment(store, id, direction)
            .await
            .map(VoteOutcome::Comment),
    }
}

pub async fn vote_post(store: &dyn ForumStore, post_id: i64, direction: VoteDirection) -> Result<Post> {
    let counter = match direction {
        VoteDirection::Upvote => PostCounter::Upvotes,
        VoteDirection::Downvote => PostCounter::Downvotes,
    };
    let post = store.bump_post_counter(post_id, counter).await?;
    tracing::debug!(post_id, vote = direction.as_str(), score = post.score, "Post vote recorded");
    Ok(post)
}

pub async fn vote_comment(
    store: &dyn ForumStore,
    comment_id: i64,
    direction: VoteDirection,
) -> Result<Comment> {
    let counter = match direction {
        VoteDirection::Upvote => CommentCounter::Upvotes,
        VoteDirection::Downvote => CommentCounter::Downvotes,
    };
    let comment = store.bump_comment_counter(comment_id, counter).await?;
    tracing::debug!(comment_id, vote = direction.as_str(), "Comment vote recorded");
    Ok(comment)
}

/// Count one view of a post and return it with the refreshed score
pub async fn record_view(store: &dyn ForumStore, post_id: i64) -> Result<Post> {
    let post = store.bump_post_counter(post_id, PostCounter::Views).await?;
    tracing::debug!(post_id, views = post.view_count, "Post view recorded");
    Ok(post)
}

/// Create a comment on a post, validating the optional parent first.
///
/// The parent must exist and belong to the same post; otherwise nothing is
/// written and a validation error is returned.
pub async fn add_comment(store: &dyn ForumStore, new: NewComment) -> Result<Comment> {
    // Fails with NotFound before any parent check
    store.get_post(new.post_id).await?;

    if let Some(parent_id) = new.parent_comment_id {
        let parent_ok = match store.get_comment(parent_id).await {
            Ok(parent) => parent.post_id == new.post_id,
            Err(AppError::NotFound(_)) => false,
            Err(e) => return Err(e),
        };
        if !parent_ok {
            return Err(AppError::Validation(
                "Parent comment not found or does not belong to this post".to_string(),
            ));
        }
    }

    let comment = store.insert_comment(new).await?;
    tracing::info!(
        comment_id = comment.id,
        post_id = comment.post_id,
        parent_comment_id = ?comment.parent_comment_id,
        "Comment created"
    );
    Ok(comment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPost;
    use crate::ranking::score::compute_score;
    use crate::store::{AgentStore, CommentStore, MemoryStore, PostStore};

    async fn setup() -> (MemoryStore, Post, Post) {
        let store = MemoryStore::new();
        let agent = store.create_agent("voter", "hash").await.unwrap();
        let mut posts = Vec::new();
        for title in ["first", "second"] {
            posts.push(
                store
                    .insert_post(NewPost {
                        title: title.to_string(),
                        content: "body".to_string(),
                        agent_id: agent.id,
                        community_id: None,
                    })
                    .await
                    .unwrap(),
            );
        }
        let second = posts.pop().unwrap();
        let first = posts.pop().unwrap();
        (store, first, second)
    }

    fn comment_on(post_id: i64, parent: Option<i64>) -> NewComment {
        NewComment {
            content: "reply".to_string(),
            agent_id: 1,
            post_id,
            parent_comment_id: parent,
        }
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(VoteDirection::parse(Some("upvote")).unwrap(), VoteDirection::Upvote);
        assert_eq!(VoteDirection::parse(Some("downvote")).unwrap(), VoteDirection::Downvote);
        assert!(matches!(VoteDirection::parse(Some("UPVOTE")), Err(AppError::Validation(_))));
        assert!(matches!(VoteDirection::parse(Some("like")), Err(AppError::Validation(_))));
        assert!(matches!(VoteDirection::parse(None), Err(AppError::Validation(_))));
        assert_eq!("downvote".parse::<VoteDirection>().unwrap(), VoteDirection::Downvote);
    }

    #[tokio::test]
    async fn test_two_views_match_fresh_recompute() {
        let (store, post, _) = setup().await;
        record_view(&store, post.id).await.unwrap();
        let viewed = record_view(&store, post.id).await.unwrap();

        assert_eq!(viewed.view_count, 2);
        assert_eq!(viewed.score, compute_score(post.view_count + 2, 0, post.upvotes));
    }

    #[tokio::test]
    async fn test_upvote_rescores_and_downvote_does_not() {
        let (store, post, _) = setup().await;

        let up = vote_post(&store, post.id, VoteDirection::Upvote).await.unwrap();
        assert_eq!(up.upvotes, 1);
        assert!((up.score - 0.6).abs() < 1e-9);

        let down = vote_post(&store, post.id, VoteDirection::Downvote).await.unwrap();
        assert_eq!(down.downvotes, 1);
        assert_eq!(down.score, up.score);
    }

    #[tokio::test]
    async fn test_repeat_votes_all_count() {
        let (store, post, _) = setup().await;
        for _ in 0..3 {
            vote_post(&store, post.id, VoteDirection::Upvote).await.unwrap();
        }
        assert_eq!(store.get_post(post.id).await.unwrap().upvotes, 3);
    }

    #[tokio::test]
    async fn test_vote_on_missing_post_changes_nothing() {
        let (store, post, _) = setup().await;
        let err = apply_vote(&store, VoteTarget::Post(999), VoteDirection::Upvote)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let unchanged = store.get_post(post.id).await.unwrap();
        assert_eq!(unchanged.upvotes, 0);
        assert_eq!(unchanged.score, 0.0);
    }

    #[tokio::test]
    async fn test_comment_vote_rescores_owning_post() {
        let (store, post, _) = setup().await;
        let comment = add_comment(&store, comment_on(post.id, None)).await.unwrap();

        let outcome = apply_vote(&store, VoteTarget::Comment(comment.id), VoteDirection::Upvote)
            .await
            .unwrap();
        match outcome {
            VoteOutcome::Comment(c) => assert_eq!(c.upvotes, 1),
            VoteOutcome::Post(_) => panic!("expected a comment outcome"),
        }

        // Comment upvotes do not feed the post score, the comment itself does
        let post = store.get_post(post.id).await.unwrap();
        assert!((post.score - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_reply_to_comment_on_same_post() {
        let (store, post, _) = setup().await;
        let parent = add_comment(&store, comment_on(post.id, None)).await.unwrap();
        let reply = add_comment(&store, comment_on(post.id, Some(parent.id)))
            .await
            .unwrap();
        assert_eq!(reply.parent_comment_id, Some(parent.id));

        let post = store.get_post(post.id).await.unwrap();
        assert!((post.score - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_parent_on_other_post_rejected() {
        let (store, first, second) = setup().await;
        let parent = add_comment(&store, comment_on(first.id, None)).await.unwrap();

        let err = add_comment(&store, comment_on(second.id, Some(parent.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.get_comments_for_post(second.id).await.unwrap().is_empty());
        assert_eq!(store.get_post(second.id).await.unwrap().score, 0.0);
    }

    #[tokio::test]
    async fn test_missing_parent_rejected() {
        let (store, post, _) = setup().await;
        let err = add_comment(&store, comment_on(post.id, Some(42)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_comment_on_missing_post_not_found() {
        let (store, _, _) = setup().await;
        let err = add_comment(&store, comment_on(404, None)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
