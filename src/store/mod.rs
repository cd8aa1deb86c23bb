//! Remote store client: typed CRUD over the `posts` and `comments` tables.
//!
//! Two backends implement [`RemoteStore`]: an embedded SQLite database and a
//! PostgREST-compatible hosted service. Views only ever see the trait.

#[cfg(test)]
pub mod mock;
pub mod models;
pub mod rest;
pub mod sqlite;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use models::{Comment, CommentId, NewComment, NewPost, Post, PostId, PostPatch};
pub use rest::RestStore;
pub use sqlite::SqliteStore;

use crate::config::{StoreBackend, StoreConfig};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Bad timestamp: {0}")]
    Timestamp(String),

    #[error("Invalid store URL: {0}")]
    Url(#[from] url::ParseError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Column a post listing is ordered by, always descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Newest first (`created_at`).
    #[default]
    Recency,
    /// Most upvoted first (`upvotes`).
    Popularity,
}

impl SortKey {
    pub fn column(self) -> &'static str {
        match self {
            SortKey::Recency => "created_at",
            SortKey::Popularity => "upvotes",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Recency => "recency",
            SortKey::Popularity => "popularity",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recency" | "created_at" => Ok(SortKey::Recency),
            "popularity" | "upvotes" => Ok(SortKey::Popularity),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

/// Filter and ordering for a post listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQuery {
    pub sort: SortKey,
    /// Case-insensitive title substring; empty means no filter.
    pub search: String,
}

impl PostQuery {
    pub fn new(sort: SortKey, search: impl Into<String>) -> Self {
        Self {
            sort,
            search: search.into(),
        }
    }
}

/// The interface for reading and writing posts and their comments.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All posts matching `query`, each with its comments embedded.
    async fn select_posts(&self, query: &PostQuery) -> StoreResult<Vec<Post>>;

    /// Exactly one post by id. `None` when the row does not exist.
    async fn select_post(&self, id: PostId) -> StoreResult<Option<Post>>;

    async fn insert_post(&self, post: &NewPost) -> StoreResult<Post>;

    async fn update_post(&self, id: PostId, patch: &PostPatch) -> StoreResult<()>;

    async fn delete_post(&self, id: PostId) -> StoreResult<()>;

    async fn insert_comment(&self, comment: &NewComment) -> StoreResult<Comment>;
}

pub type SharedStore = Arc<dyn RemoteStore>;

/// Build the configured backend.
pub fn open(config: &StoreConfig) -> anyhow::Result<SharedStore> {
    match config.backend {
        StoreBackend::Sqlite => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("store.path is not set"))?;
            tracing::info!("Using SQLite store at {}", path.display());
            Ok(Arc::new(SqliteStore::open(path)?))
        }
        StoreBackend::Rest => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("store.url is required for the rest backend"))?;
            let api_key = config
                .api_key
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("store.api_key is required for the rest backend"))?;
            tracing::info!("Using hosted store at {}", url);
            Ok(Arc::new(RestStore::new(url, api_key)?))
        }
    }
}
