use askama::Template;
use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::post;
use axum::{Form, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::ActiveSession;
use crate::session::ViewSession;
use crate::state::AppState;
use crate::store::{Post, PostId, SortKey};

// --- View structs ---

pub struct PostCard {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub has_image: bool,
    pub image_url: String,
    pub created_at: String,
    pub upvotes: u32,
    pub comments: Vec<String>,
    pub comment_input: String,
}

impl PostCard {
    fn new(post: &Post, comment_input: &str) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            content: post.content.clone().unwrap_or_default(),
            has_image: post.image_url.is_some(),
            image_url: post.image_url.clone().unwrap_or_default(),
            created_at: format_relative_time(&post.created_at),
            upvotes: post.upvotes,
            comments: post.comments.iter().map(|c| c.comment.clone()).collect(),
            comment_input: comment_input.to_string(),
        }
    }
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/list.html")]
pub struct ListTemplate {
    pub posts: Vec<PostCard>,
    pub search: String,
    pub by_popularity: bool,
    pub fetch_failed: bool,
    /// Current filters as a query string, carried on the card forms.
    pub filters: String,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => AppError::Template(e).into_response(),
        }
    }
}

// --- Forms ---

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ListQuery {
    pub sort: Option<String>,
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub comment: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/{id}/upvote", post(upvote))
        .route("/post/{id}/comments", post(add_comment))
}

// --- Handlers ---

pub async fn render(view: &mut ViewSession, query: &ListQuery) -> AppResult<Response> {
    let sort = match query.sort.as_deref() {
        None | Some("") => SortKey::default(),
        Some(raw) => raw.parse::<SortKey>().map_err(AppError::BadRequest)?,
    };
    let search = query.q.as_deref().unwrap_or("");

    view.show_list(sort, search).await;
    let filters = filter_query(view);

    let list = &view.list;
    let posts = list
        .posts()
        .iter()
        .map(|post| PostCard::new(post, list.comment_input(post.id)))
        .collect();

    Ok(Html(ListTemplate {
        posts,
        search: list.search().to_string(),
        by_popularity: list.sort() == SortKey::Popularity,
        fetch_failed: list.fetch_failed(),
        filters,
    })
    .into_response())
}

async fn upvote(
    session: ActiveSession,
    Path(id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> AppResult<Response> {
    let target = {
        let mut view = session.session.lock().await;
        remount_list(&mut view, &query).await?;
        // The write runs on its own; the page shows the new count now.
        drop(view.list.upvote(PostId(id)));
        list_location(&view, PostId(id))
    };

    Ok(session.respond(Redirect::to(&target)))
}

async fn add_comment(
    session: ActiveSession,
    Path(id): Path<i64>,
    Query(query): Query<ListQuery>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let target = {
        let mut view = session.session.lock().await;
        remount_list(&mut view, &query).await?;
        view.list.set_comment_input(PostId(id), &form.comment);
        drop(view.list.submit_comment(PostId(id)));
        list_location(&view, PostId(id))
    };

    Ok(session.respond(Redirect::to(&target)))
}

/// Actions can arrive from a page the session no longer shows (e.g. after it
/// expired, or before it had a cookie); load the list the form was on first
/// so the action has a snapshot to patch. Filters missing from the form's
/// query fall back to the session's.
async fn remount_list(view: &mut ViewSession, query: &ListQuery) -> AppResult<()> {
    let sort = match query.sort.as_deref() {
        None | Some("") => view.list.sort(),
        Some(raw) => raw.parse::<SortKey>().map_err(AppError::BadRequest)?,
    };
    let search = match &query.q {
        Some(q) => q.clone(),
        None => view.list.search().to_string(),
    };
    view.show_list(sort, &search).await;
    Ok(())
}

fn filter_query(view: &ViewSession) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("sort", view.list.sort().as_str())
        .append_pair("q", view.list.search())
        .finish()
}

/// `/` with the list's current filters, anchored at the post acted on.
pub fn list_location(view: &ViewSession, anchor: PostId) -> String {
    format!("/?{}#post-{anchor}", filter_query(view))
}

// --- Time formatting ---

pub fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let now = Utc::now();
    let diff = now.signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}

// --- Tests ---
