use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::router::Route;
use crate::store::{NewPost, SharedStore};

/// Shown when a second submit arrives while the first is still outstanding.
pub const ALREADY_SUBMITTING: &str = "This post is already being created.";

/// Set while a create request is outstanding. Clones share the flag, so a
/// request handler can refuse a second submit without waiting on the form.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicBool>);

/// Clears the [`InFlight`] flag when dropped.
#[derive(Debug)]
pub struct InFlightGuard(Arc<AtomicBool>);

impl InFlight {
    /// Claim the flag; `None` when a submit already holds it.
    pub fn try_begin(&self) -> Option<InFlightGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(self.0.clone()))
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The new-post form.
pub struct CreatePostView {
    store: SharedStore,
    pub title: String,
    pub content: String,
    pub image_url: String,
    in_flight: InFlight,
    notice: Option<String>,
}

impl CreatePostView {
    pub fn new(store: SharedStore, in_flight: InFlight) -> Self {
        Self {
            store,
            title: String::new(),
            content: String::new(),
            image_url: String::new(),
            in_flight,
            notice: None,
        }
    }

    pub fn set_fields(&mut self, title: &str, content: &str, image_url: &str) {
        self.title = title.to_string();
        self.content = content.to_string();
        self.image_url = image_url.to_string();
    }

    /// True while the insert is outstanding; the submit control is disabled.
    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_set()
    }

    /// Message the page must show before the user can carry on.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Insert the post. Returns where to navigate on success; on failure the
    /// form keeps its values and carries a notice. A submit made while
    /// another is outstanding does nothing.
    pub async fn submit(&mut self) -> Option<Route> {
        let guard = self.in_flight.try_begin()?;
        self.submit_claimed(guard).await
    }

    /// [`CreatePostView::submit`] for a caller that already claimed the flag.
    pub async fn submit_claimed(&mut self, _guard: InFlightGuard) -> Option<Route> {
        if self.title.trim().is_empty() {
            self.notice = Some("A title is required.".to_string());
            return None;
        }

        self.notice = None;
        let post = NewPost::new(&self.title, &self.content, &self.image_url);
        match self.store.insert_post(&post).await {
            Ok(created) => {
                tracing::info!("Created post {} \"{}\"", created.id, created.title);
                Some(Route::List)
            }
            Err(e) => {
                tracing::error!("Failed to create post: {}", e);
                self.notice = Some(format!("Failed to create post: {e}"));
                None
            }
        }
    }
}
