use std::collections::HashMap;

use tokio::task::JoinHandle;

use crate::store::{
    Comment, CommentId, NewComment, Post, PostId, PostPatch, PostQuery, SharedStore, SortKey,
};

/// The post list and its optimistic upvote / comment paths.
///
/// The snapshot is replaced wholesale by [`PostListView::load`] and patched in
/// place by [`PostListView::upvote`] and [`PostListView::add_comment`]. Those
/// patches are never rolled back or reconciled with the store: a failed write
/// leaves the snapshot ahead of the store until the next load.
pub struct PostListView {
    store: SharedStore,
    query: PostQuery,
    posts: Vec<Post>,
    comment_inputs: HashMap<PostId, String>,
    fetch_failed: bool,
}

impl PostListView {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            query: PostQuery::default(),
            posts: Vec::new(),
            comment_inputs: HashMap::new(),
            fetch_failed: false,
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn post(&self, id: PostId) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    pub fn sort(&self) -> SortKey {
        self.query.sort
    }

    pub fn search(&self) -> &str {
        &self.query.search
    }

    /// The last load failed; the snapshot is whatever the load before it left.
    pub fn fetch_failed(&self) -> bool {
        self.fetch_failed
    }

    /// Fetch posts for the current sort key and search term.
    pub async fn load(&mut self) {
        match self.store.select_posts(&self.query).await {
            Ok(posts) => {
                tracing::debug!(count = posts.len(), sort = %self.query.sort, "Loaded posts");
                self.posts = posts;
                self.fetch_failed = false;
            }
            Err(e) => {
                tracing::error!("Failed to load posts: {}", e);
                self.fetch_failed = true;
            }
        }
    }

    /// Change sort key and/or search term. Reloads exactly once when either
    /// changed; returns whether a load was issued.
    pub async fn set_filters(&mut self, sort: SortKey, search: &str) -> bool {
        if self.query.sort == sort && self.query.search == search {
            return false;
        }
        self.query = PostQuery::new(sort, search);
        self.load().await;
        true
    }

    pub async fn set_sort(&mut self, sort: SortKey) -> bool {
        let search = self.query.search.clone();
        self.set_filters(sort, &search).await
    }

    pub async fn set_search(&mut self, search: &str) -> bool {
        self.set_filters(self.query.sort, search).await
    }

    /// Bump the displayed count now, then write the new count in the
    /// background. `None` when the post is not in the snapshot.
    pub fn upvote(&mut self, id: PostId) -> Option<JoinHandle<()>> {
        let post = self.posts.iter_mut().find(|p| p.id == id)?;
        post.upvotes = post.upvotes.saturating_add(1);
        let upvotes = post.upvotes;

        let store = self.store.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = store.update_post(id, &PostPatch::upvotes(upvotes)).await {
                tracing::error!("Failed to save upvote for post {}: {}", id, e);
            }
        }))
    }

    pub fn comment_input(&self, id: PostId) -> &str {
        self.comment_inputs.get(&id).map(String::as_str).unwrap_or("")
    }

    pub fn set_comment_input(&mut self, id: PostId, text: &str) {
        self.comment_inputs.insert(id, text.to_string());
    }

    /// Append the comment locally, clear the post's input, then insert it in
    /// the background. Empty text does nothing.
    pub fn add_comment(&mut self, id: PostId, text: &str) -> Option<JoinHandle<()>> {
        if text.is_empty() {
            return None;
        }
        let post = self.posts.iter_mut().find(|p| p.id == id)?;

        // Placeholder id; never swapped for the one the store assigns.
        let temp_id = CommentId(chrono::Utc::now().timestamp_millis());
        post.comments.push(Comment {
            id: temp_id,
            post_id: id,
            comment: text.to_string(),
        });
        self.comment_inputs.insert(id, String::new());

        let store = self.store.clone();
        let comment = NewComment {
            post_id: id,
            comment: text.to_string(),
        };
        Some(tokio::spawn(async move {
            if let Err(e) = store.insert_comment(&comment).await {
                tracing::error!("Failed to save comment on post {}: {}", id, e);
            }
        }))
    }

    /// [`PostListView::add_comment`] using the post's current input buffer.
    pub fn submit_comment(&mut self, id: PostId) -> Option<JoinHandle<()>> {
        let text = self.comment_input(id).to_string();
        self.add_comment(id, &text)
    }
}
