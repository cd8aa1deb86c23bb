use crate::router::Route;
use crate::store::{Post, PostId, PostPatch, SharedStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Viewing,
    Editing,
}

#[derive(Debug, Clone)]
pub enum DetailState {
    /// Constructed, not fetched yet.
    Loading,
    Loaded(Post),
    /// Terminal for this navigation.
    NotFound,
}

/// Edit-form fields, seeded from the loaded post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub content: String,
    pub image_url: String,
}

impl Draft {
    fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            content: post.content.clone().unwrap_or_default(),
            image_url: post.image_url.clone().unwrap_or_default(),
        }
    }
}

/// One post: read, edit in place, delete.
pub struct PostDetailView {
    store: SharedStore,
    id: PostId,
    state: DetailState,
    mode: Mode,
    draft: Draft,
    notice: Option<String>,
}

impl PostDetailView {
    pub fn new(store: SharedStore, id: PostId) -> Self {
        Self {
            store,
            id,
            state: DetailState::Loading,
            mode: Mode::Viewing,
            draft: Draft::default(),
            notice: None,
        }
    }

    pub fn id(&self) -> PostId {
        self.id
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    pub fn post(&self) -> Option<&Post> {
        match &self.state {
            DetailState::Loaded(post) => Some(post),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.state, DetailState::NotFound)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Why the last save did not go through.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub async fn load(&mut self) {
        match self.store.select_post(self.id).await {
            Ok(Some(post)) => {
                self.draft = Draft::from_post(&post);
                self.state = DetailState::Loaded(post);
            }
            Ok(None) => {
                tracing::warn!("Post {} not found", self.id);
                self.state = DetailState::NotFound;
            }
            Err(e) => {
                tracing::error!("Failed to load post {}: {}", self.id, e);
                self.state = DetailState::NotFound;
            }
        }
    }

    /// No-op unless a post is loaded.
    pub fn enter_edit(&mut self) {
        if let DetailState::Loaded(post) = &self.state {
            self.draft = Draft::from_post(post);
            self.mode = Mode::Editing;
            self.notice = None;
        }
    }

    /// Drop unsaved edits; nothing is fetched.
    pub fn cancel_edit(&mut self) {
        if let DetailState::Loaded(post) = &self.state {
            self.draft = Draft::from_post(post);
        }
        self.mode = Mode::Viewing;
        self.notice = None;
    }

    pub fn set_draft(&mut self, title: &str, content: &str, image_url: &str) {
        self.draft = Draft {
            title: title.to_string(),
            content: content.to_string(),
            image_url: image_url.to_string(),
        };
    }

    /// Write the draft, then reload from the store. Stays in editing with
    /// the draft intact when the title is blank or the write fails.
    pub async fn save(&mut self) -> bool {
        if self.draft.title.trim().is_empty() {
            self.notice = Some("A title is required.".to_string());
            return false;
        }

        let patch = PostPatch::fields(&self.draft.title, &self.draft.content, &self.draft.image_url);
        if let Err(e) = self.store.update_post(self.id, &patch).await {
            tracing::error!("Failed to update post {}: {}", self.id, e);
            self.notice = Some(format!("Failed to save post: {e}"));
            return false;
        }

        self.notice = None;
        self.mode = Mode::Viewing;
        self.load().await;
        true
    }

    /// Returns where to navigate once the post is gone.
    pub async fn delete(&mut self) -> Option<Route> {
        match self.store.delete_post(self.id).await {
            Ok(()) => {
                tracing::info!("Deleted post {}", self.id);
                Some(Route::List)
            }
            Err(e) => {
                tracing::error!("Failed to delete post {}: {}", self.id, e);
                None
            }
        }
    }
}
