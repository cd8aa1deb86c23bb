//! Per-browser view sessions.
//!
//! A browser keeps one [`ViewSession`] (found by cookie) holding the snapshot
//! of each view it has open. Optimistic edits land in that snapshot, so the
//! page it renders next shows them whether or not the store has caught up.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::router::Route;
use crate::store::{PostId, SharedStore, SortKey};
use crate::views::{CreatePostView, InFlight, PostDetailView, PostListView};

pub struct ViewSession {
    store: SharedStore,
    pub list: PostListView,
    pub create: CreatePostView,
    pub detail: Option<PostDetailView>,
    mounted: Option<Route>,
    creating: InFlight,
}

impl ViewSession {
    pub fn new(store: SharedStore) -> Self {
        let creating = InFlight::default();
        Self {
            list: PostListView::new(store.clone()),
            create: CreatePostView::new(store.clone(), creating.clone()),
            detail: None,
            mounted: None,
            creating,
            store,
        }
    }

    /// The create form's in-flight flag, shared across remounts.
    pub fn creating(&self) -> InFlight {
        self.creating.clone()
    }

    /// The view the browser is currently on.
    pub fn mounted(&self) -> Option<Route> {
        self.mounted
    }

    /// Switch to `route`. Arriving from a different route mounts the view
    /// afresh: the list and detail views load, the form starts empty.
    /// Returns whether the view was mounted.
    pub async fn navigate(&mut self, route: Route) -> bool {
        if self.mounted == Some(route) {
            return false;
        }

        match route {
            Route::List => self.list.load().await,
            Route::Create => {
                self.create = CreatePostView::new(self.store.clone(), self.creating.clone())
            }
            Route::Post(id) => {
                let mut detail = PostDetailView::new(self.store.clone(), id);
                detail.load().await;
                self.detail = Some(detail);
            }
        }
        self.mounted = Some(route);
        true
    }

    /// Show the list with the given filters, loading at most once.
    pub async fn show_list(&mut self, sort: SortKey, search: &str) {
        if self.mounted == Some(Route::List) {
            self.list.set_filters(sort, search).await;
            return;
        }

        // Mounting loads with the new filters, so setting them must not.
        if !self.list.set_filters(sort, search).await {
            self.navigate(Route::List).await;
        } else {
            self.mounted = Some(Route::List);
        }
    }

    /// The detail view for `id`, mounting it when another view is showing.
    pub async fn detail(&mut self, id: PostId) -> &mut PostDetailView {
        let current = self.detail.as_ref().map(|d| d.id());
        if current != Some(id) {
            self.mounted = None;
        }
        self.navigate(Route::Post(id)).await;
        self.detail
            .get_or_insert_with(|| PostDetailView::new(self.store.clone(), id))
    }

    /// Mark the current view as left, so the next visit mounts it again.
    pub fn leave(&mut self) {
        self.mounted = None;
    }
}

/// A session plus the flag a create submit claims before taking its lock.
#[derive(Clone)]
pub struct SessionSlot {
    pub view: Arc<Mutex<ViewSession>>,
    pub creating: InFlight,
}

impl SessionSlot {
    fn new(store: SharedStore) -> Self {
        let view = ViewSession::new(store);
        Self {
            creating: view.creating(),
            view: Arc::new(Mutex::new(view)),
        }
    }
}

struct Entry {
    slot: SessionSlot,
    last_seen: Instant,
}

/// All live view sessions, evicted after sitting idle. Holds at most
/// `capacity` sessions; starting one past that drops the least recently seen.
pub struct ViewSessions {
    store: SharedStore,
    idle: Duration,
    capacity: usize,
    entries: HashMap<String, Entry>,
}

impl ViewSessions {
    pub fn new(store: SharedStore, idle: Duration, capacity: usize) -> Self {
        Self {
            store,
            idle,
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    /// The live session under `key`, if any. Marks it as seen.
    pub fn find(&mut self, key: &str) -> Option<SessionSlot> {
        self.clear_stale();
        let entry = self.entries.get_mut(key)?;
        entry.last_seen = Instant::now();
        Some(entry.slot.clone())
    }

    /// Start and keep a new session under a fresh key.
    pub fn start(&mut self) -> (String, SessionSlot) {
        self.clear_stale();
        while self.entries.len() >= self.capacity {
            self.evict_oldest();
        }

        let key = uuid::Uuid::now_v7().to_string();
        let slot = SessionSlot::new(self.store.clone());
        self.entries.insert(
            key.clone(),
            Entry {
                slot: slot.clone(),
                last_seen: Instant::now(),
            },
        );
        tracing::debug!("Started view session {}", key);
        (key, slot)
    }

    /// A session that is never stored, for requests that get no cookie.
    pub fn detached(&self) -> SessionSlot {
        SessionSlot::new(self.store.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_seen)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            tracing::debug!("Evicted view session {} to stay under capacity", key);
        }
    }

    fn clear_stale(&mut self) {
        let now = Instant::now();
        let idle = self.idle;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.last_seen) < idle);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} idle view sessions", evicted);
        }
    }
}
