use askama::Template;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::post;
use axum::{Form, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::ActiveSession;
use crate::router::Route;
use crate::routes::home::{format_relative_time, Html};
use crate::session::ViewSession;
use crate::state::AppState;
use crate::store::PostId;
use crate::views::{Mode, PostDetailView};

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub has_image: bool,
    pub image_url: String,
    pub created_at: String,
    pub upvotes: u32,
    pub comments: Vec<String>,
    pub editing: bool,
    pub has_notice: bool,
    pub notice: String,
    pub draft_title: String,
    pub draft_content: String,
    pub draft_image_url: String,
}

#[derive(Template)]
#[template(path = "pages/not_found.html")]
pub struct NotFoundTemplate;

// --- Forms ---

#[derive(Deserialize)]
pub struct EditPostForm {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/{id}/edit", post(enter_edit))
        .route("/post/{id}/cancel", post(cancel_edit))
        .route("/post/{id}/save", post(save))
        .route("/post/{id}/delete", post(delete))
}

// --- Handlers ---

pub async fn render(view: &mut ViewSession, id: PostId) -> AppResult<Response> {
    let detail = view.detail(id).await;
    Ok(page(detail))
}

fn page(detail: &PostDetailView) -> Response {
    let Some(post) = detail.post() else {
        return (StatusCode::NOT_FOUND, Html(NotFoundTemplate)).into_response();
    };

    let draft = detail.draft();
    Html(PostTemplate {
        id: post.id,
        title: post.title.clone(),
        content: post.content.clone().unwrap_or_default(),
        has_image: post.image_url.is_some(),
        image_url: post.image_url.clone().unwrap_or_default(),
        created_at: format_relative_time(&post.created_at),
        upvotes: post.upvotes,
        comments: post.comments.iter().map(|c| c.comment.clone()).collect(),
        editing: detail.mode() == Mode::Editing,
        has_notice: detail.notice().is_some(),
        notice: detail.notice().unwrap_or_default().to_string(),
        draft_title: draft.title.clone(),
        draft_content: draft.content.clone(),
        draft_image_url: draft.image_url.clone(),
    })
    .into_response()
}

fn back_to(id: PostId) -> Redirect {
    Redirect::to(&Route::Post(id).path())
}

async fn enter_edit(session: ActiveSession, Path(id): Path<i64>) -> AppResult<Response> {
    let id = PostId(id);
    {
        let mut view = session.session.lock().await;
        view.detail(id).await.enter_edit();
    }
    Ok(session.respond(back_to(id)))
}

async fn cancel_edit(session: ActiveSession, Path(id): Path<i64>) -> AppResult<Response> {
    let id = PostId(id);
    {
        let mut view = session.session.lock().await;
        view.detail(id).await.cancel_edit();
    }
    Ok(session.respond(back_to(id)))
}

async fn save(
    session: ActiveSession,
    Path(id): Path<i64>,
    Form(form): Form<EditPostForm>,
) -> AppResult<Response> {
    let id = PostId(id);
    {
        let mut view = session.session.lock().await;
        let detail = view.detail(id).await;
        detail.set_draft(&form.title, &form.content, &form.image_url);
        // On failure the view stays in editing; the redirect shows the form.
        detail.save().await;
    }
    Ok(session.respond(back_to(id)))
}

async fn delete(session: ActiveSession, Path(id): Path<i64>) -> AppResult<Response> {
    let id = PostId(id);
    let target = {
        let mut view = session.session.lock().await;
        let route = view.detail(id).await.delete().await;
        match route {
            Some(route) => {
                view.leave();
                route
            }
            None => Route::Post(id),
        }
    };
    Ok(session.respond(Redirect::to(&target.path())))
}
