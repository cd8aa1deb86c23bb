//! In-memory store for view tests: failures can be injected and writes can be
//! held back until the test releases them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Semaphore;

use super::{
    Comment, CommentId, NewComment, NewPost, Post, PostId, PostPatch, PostQuery, RemoteStore,
    SortKey, StoreError, StoreResult,
};

pub struct MockStore {
    posts: Mutex<Vec<Post>>,
    next_id: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    gated: AtomicBool,
    gate: Semaphore,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Seed a post directly, bypassing the write counters.
    pub fn seed(&self, title: &str, upvotes: u32) -> PostId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        let id = PostId(n);
        self.posts.lock().unwrap().push(Post {
            id,
            title: title.to_string(),
            content: None,
            image_url: None,
            upvotes,
            // Strictly increasing so recency ordering is deterministic.
            created_at: Utc::now() + Duration::seconds(n),
            comments: Vec::new(),
        });
        id
    }

    pub fn post(&self, id: PostId) -> Option<Post> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold every write until [`MockStore::release`] is called.
    pub fn hold_writes(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self, writes: usize) {
        self.gate.add_permits(writes);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn read(&self) -> StoreResult<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(rejected("read refused"));
        }
        Ok(())
    }

    async fn write(&self) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.gated.load(Ordering::SeqCst) {
            self.gate
                .acquire()
                .await
                .map_err(|_| rejected("gate closed"))?
                .forget();
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(rejected("write refused"));
        }
        Ok(())
    }
}

fn rejected(message: &str) -> StoreError {
    StoreError::Rejected {
        status: 500,
        message: message.to_string(),
    }
}

#[async_trait]
impl RemoteStore for MockStore {
    async fn select_posts(&self, query: &PostQuery) -> StoreResult<Vec<Post>> {
        self.read()?;
        let mut posts: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.title_matches(&query.search))
            .cloned()
            .collect();
        match query.sort {
            SortKey::Recency => posts.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortKey::Popularity => posts.sort_by(|a, b| b.upvotes.cmp(&a.upvotes)),
        }
        Ok(posts)
    }

    async fn select_post(&self, id: PostId) -> StoreResult<Option<Post>> {
        self.read()?;
        Ok(self.post(id))
    }

    async fn insert_post(&self, post: &NewPost) -> StoreResult<Post> {
        self.write().await?;
        let id = self.seed(&post.title, post.upvotes);
        let mut posts = self.posts.lock().unwrap();
        let row = posts.iter_mut().find(|p| p.id == id).unwrap();
        row.content = post.content.clone();
        row.image_url = post.image_url.clone();
        Ok(row.clone())
    }

    async fn update_post(&self, id: PostId, patch: &PostPatch) -> StoreResult<()> {
        self.write().await?;
        let mut posts = self.posts.lock().unwrap();
        if let Some(row) = posts.iter_mut().find(|p| p.id == id) {
            if let Some(title) = &patch.title {
                row.title = title.clone();
            }
            if let Some(content) = &patch.content {
                row.content = content.clone();
            }
            if let Some(image_url) = &patch.image_url {
                row.image_url = image_url.clone();
            }
            if let Some(upvotes) = patch.upvotes {
                row.upvotes = upvotes;
            }
        }
        Ok(())
    }

    async fn delete_post(&self, id: PostId) -> StoreResult<()> {
        self.write().await?;
        self.posts.lock().unwrap().retain(|p| p.id != id);
        Ok(())
    }

    async fn insert_comment(&self, comment: &NewComment) -> StoreResult<Comment> {
        self.write().await?;
        let mut posts = self.posts.lock().unwrap();
        let row = posts
            .iter_mut()
            .find(|p| p.id == comment.post_id)
            .ok_or_else(|| rejected("foreign key violation"))?;
        let stored = Comment {
            id: CommentId(row.comments.len() as i64 + 1),
            post_id: comment.post_id,
            comment: comment.comment.clone(),
        };
        row.comments.push(stored.clone());
        Ok(stored)
    }
}
