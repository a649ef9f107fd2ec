//! Feed selection
//!
//! Four modes over the post collection, each optionally restricted to one
//! community:
//!
//! - newest: `created_at` descending, paged at the store
//! - trending: `score` descending, newer first on ties, paged at the store
//! - random: a fresh uniform sample of `limit` posts on every call, offset ignored
//! - search: literal substring in title or content, newest first
//!
//! Search and the standalone trending accessor fetch `limit` rows and then
//! apply `offset` as a slice of that window, so an offset at or beyond the
//! limit yields an empty page even when more rows exist.

use std::{cmp::Ordering, str::FromStr};

use crate::config::FeedConfig;
use crate::error::{AppError, Result};
use crate::models::{Community, Post};
use crate::store::{ForumStore, PostFilter, PostOrder};

/// `sort` parameter of the post listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    #[default]
    Newest,
    Trending,
    Random,
}

impl FromStr for SortMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "newest" => Ok(SortMode::Newest),
            "trending" => Ok(SortMode::Trending),
            "random" => Ok(SortMode::Random),
            _ => Err(AppError::Validation(format!(
                "Invalid sort '{}', expected one of newest, trending, random",
                s
            ))),
        }
    }
}

impl SortMode {

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Newest => "newest",
            SortMode::Trending => "trending",
            SortMode::Random => "random",
        }
    }

    /// Parse an optional query value; absent means newest
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw {
            None => Ok(SortMode::default()),
            Some(s) => s.parse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMode {
    Newest,
    Trending,
    Random,
    Search(String),
}

impl From<SortMode> for FeedMode {
    fn from(sort: SortMode) -> Self {
        match sort {
            SortMode::Newest => FeedMode::Newest,
            SortMode::Trending => FeedMode::Trending,
            SortMode::Random => FeedMode::Random,
        }
    }
}

/// One feed query as received from the caller, before clamping
#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub mode: FeedMode,
    /// Community name filter
    pub community: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FeedRequest {
    pub fn new(mode: FeedMode) -> Self {
        Self {
            mode,
            community: None,
            limit: None,
            offset: None,
        }
    }
}

/// Resolve a requested limit against the configured default and cap
pub fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    requested.unwrap_or(default).clamp(0, max)
}

/// Negative offsets are treated as 0; there is no upper bound
pub fn clamp_offset(requested: Option<i64>) -> i64 {
    requested.unwrap_or(0).max(0)
}

/// `created_at` descending
pub fn compare_newest(a: &Post, b: &Post) -> Ordering {
    b.created_at.cmp(&a.created_at)
}

/// `score` descending, ties broken by `created_at` descending
pub fn compare_trending(a: &Post, b: &Post) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Look up a community filter by name. Unknown names are `NotFound`.
pub async fn resolve_community(
    store: &dyn ForumStore,
    name: Option<&str>,
) -> Result<Option<Community>> {
    match name {
        Some(name) => Ok(Some(store.get_community_by_name(name).await?)),
        None => Ok(None),
    }
}

/// Select a page of posts for the given mode
pub async fn select_feed(
    store: &dyn ForumStore,
    feeds: &FeedConfig,
    request: FeedRequest,
) -> Result<Vec<Post>> {
    let limit = clamp_limit(request.limit, feeds.default_post_limit, feeds.max_post_limit);
    let offset = clamp_offset(request.offset);

    let community = resolve_community(store, request.community.as_deref()).await?;
    let filter = PostFilter::community(community.map(|c| c.id));

    tracing::debug!(mode = ?request.mode, limit, offset, "Selecting feed");

    match request.mode {
        FeedMode::Newest => {
            store
                .list_posts(&filter, PostOrder::Newest, limit, offset)
                .await
        }
        FeedMode::Trending => {
            store
                .list_posts(&filter, PostOrder::Trending, limit, offset)
                .await
        }
        FeedMode::Random => store.sample_posts(&filter, limit).await,
        FeedMode::Search(query) => {
            let filter = PostFilter {
                search: Some(normalize_query(&query)?),
                ..filter
            };
            let window = store
                .list_posts(&filter, PostOrder::Newest, limit, 0)
                .await?;
            Ok(slice_window(window, offset))
        }
    }
}

/// Standalone trending accessor: top `limit` posts, then `offset` sliced
/// out of that window
pub async fn trending_posts(
    store: &dyn ForumStore,
    filter: &PostFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Post>> {
    let window = store
        .list_posts(filter, PostOrder::Trending, limit.max(0), 0)
        .await?;
    Ok(slice_window(window, offset))
}

/// Top `limit` trending posts across all communities, for the home view
pub async fn top_trending(store: &dyn ForumStore, limit: i64) -> Result<Vec<Post>> {
    store
        .list_posts(&PostFilter::default(), PostOrder::Trending, limit.max(0), 0)
        .await
}

fn normalize_query(query: &str) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("Search query is required".to_string()));
    }
    Ok(query.to_string())
}

fn slice_window(window: Vec<Post>, offset: i64) -> Vec<Post> {
    window.into_iter().skip(offset.max(0) as usize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPost;
    use crate::store::{AgentStore, CommunityStore, MemoryStore, PostCounter, PostStore};
    use chrono::{Duration, TimeZone, Utc};

    fn feeds() -> FeedConfig {
        FeedConfig {
            default_post_limit: 10,
            max_post_limit: 50,
            default_comment_limit: 10,
            max_comment_limit: 50,
            home_trending_limit: 5,
        }
    }

    fn post(id: i64, score: f64, minutes: i64) -> Post {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Post {
            id,
            title: format!("post {}", id),
            content: String::new(),
            created_at: base + Duration::minutes(minutes),
            view_count: 0,
            upvotes: 0,
            downvotes: 0,
            score,
            agent_id: 1,
            community_id: None,
        }
    }

    async fn store_with_posts(titles: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        let agent = store.create_agent("feeder", "hash").await.unwrap();
        for title in titles {
            store
                .insert_post(NewPost {
                    title: title.to_string(),
                    content: "body".to_string(),
                    agent_id: agent.id,
                    community_id: None,
                })
                .await
                .unwrap();
        }
        store
    }

    #[test]
    fn test_trending_tie_break_prefers_newer() {
        let p1 = post(1, 5.0, 1);
        let p2 = post(2, 5.0, 2);
        let p3 = post(3, 3.0, 3);

        let mut posts = vec![p3, p1, p2];
        posts.sort_by(compare_trending);
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_newest_order() {
        let mut posts = vec![post(1, 0.0, 1), post(2, 0.0, 3), post(3, 0.0, 2)];
        posts.sort_by(compare_newest);
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_sort_mode_parse() {
        assert_eq!(SortMode::parse(None).unwrap(), SortMode::Newest);
        assert_eq!(SortMode::parse(Some("trending")).unwrap(), SortMode::Trending);
        assert_eq!(SortMode::parse(Some("random")).unwrap(), SortMode::Random);
        assert!(matches!(
            SortMode::parse(Some("top")),
            Err(AppError::Validation(_))
        ));
        assert!(SortMode::parse(Some("Newest")).is_err());
        assert_eq!("newest".parse::<SortMode>().unwrap(), SortMode::Newest);
    }

    #[test]
    fn test_limit_clamping() {
        assert_eq!(clamp_limit(None, 10, 50), 10);
        assert_eq!(clamp_limit(Some(500), 10, 50), 50);
        assert_eq!(clamp_limit(Some(-3), 10, 50), 0);
        assert_eq!(clamp_offset(Some(-7)), 0);
        assert_eq!(clamp_offset(Some(1_000)), 1_000);
    }

    #[tokio::test]
    async fn test_trending_feed_orders_by_score() {
        let store = store_with_posts(&["a", "b", "c"]).await;
        // b gets two upvotes, c gets one
        store.bump_post_counter(2, PostCounter::Upvotes).await.unwrap();
        store.bump_post_counter(2, PostCounter::Upvotes).await.unwrap();
        store.bump_post_counter(3, PostCounter::Upvotes).await.unwrap();

        let posts = select_feed(&store, &feeds(), FeedRequest::new(FeedMode::Trending))
            .await
            .unwrap();
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn test_limit_capped_by_config() {
        let titles: Vec<String> = (0..60).map(|i| format!("p{}", i)).collect();
        let refs: Vec<&str> = titles.iter().map(String::as_str).collect();
        let store = store_with_posts(&refs).await;

        let request = FeedRequest {
            limit: Some(1_000),
            ..FeedRequest::new(FeedMode::Newest)
        };
        let posts = select_feed(&store, &feeds(), request).await.unwrap();
        assert_eq!(posts.len(), 50);
    }

    #[tokio::test]
    async fn test_search_offset_slices_limited_window() {
        let store = store_with_posts(&["rust one", "rust two", "rust three", "go"]).await;

        let request = FeedRequest {
            limit: Some(2),
            offset: Some(1),
            ..FeedRequest::new(FeedMode::Search("RUST".to_string()))
        };
        let posts = select_feed(&store, &feeds(), request).await.unwrap();
        assert_eq!(posts.len(), 1);

        // Offset at the limit: empty, although a third match exists
        let request = FeedRequest {
            limit: Some(2),
            offset: Some(2),
            ..FeedRequest::new(FeedMode::Search("rust".to_string()))
        };
        let posts = select_feed(&store, &feeds(), request).await.unwrap();
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_blank_search_rejected() {
        let store = store_with_posts(&["a"]).await;
        let err = select_feed(
            &store,
            &feeds(),
            FeedRequest::new(FeedMode::Search("   ".to_string())),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_community_is_not_found() {
        let store = store_with_posts(&["a"]).await;
        let request = FeedRequest {
            community: Some("nowhere".to_string()),
            ..FeedRequest::new(FeedMode::Newest)
        };
        let err = select_feed(&store, &feeds(), request).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_community_filter_applies_to_random() {
        let store = store_with_posts(&["outside"]).await;
        let community = store.create_community("rust", None).await.unwrap();
        for i in 0..3 {
            store
                .insert_post(NewPost {
                    title: format!("inside {}", i),
                    content: "body".to_string(),
                    agent_id: 1,
                    community_id: Some(community.id),
                })
                .await
                .unwrap();
        }

        let request = FeedRequest {
            community: Some("rust".to_string()),
            offset: Some(100),
            ..FeedRequest::new(FeedMode::Random)
        };
        let posts = select_feed(&store, &feeds(), request).await.unwrap();
        assert_eq!(posts.len(), 3);
        assert!(posts.iter().all(|p| p.community_id == Some(community.id)));
    }

    #[tokio::test]
    async fn test_trending_accessor_slices_after_limit() {
        let store = store_with_posts(&["a", "b", "c", "d"]).await;
        let filter = PostFilter::default();

        let posts = trending_posts(&store, &filter, 3, 1).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert!(trending_posts(&store, &filter, 3, 3).await.unwrap().is_empty());
        assert_eq!(top_trending(&store, 2).await.unwrap().len(), 2);
    }
}
