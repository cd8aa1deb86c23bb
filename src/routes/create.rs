use askama::Template;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::ActiveSession;
use crate::router::Route;
use crate::routes::home::Html;
use crate::session::ViewSession;
use crate::views::{CreatePostView, ALREADY_SUBMITTING};

#[derive(Template)]
#[template(path = "pages/create.html")]
pub struct CreateTemplate {
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub submitting: bool,
    pub has_notice: bool,
    pub notice: String,
}

impl CreateTemplate {
    fn from_view(view: &CreatePostView) -> Self {
        Self {
            title: view.title.clone(),
            content: view.content.clone(),
            image_url: view.image_url.clone(),
            submitting: view.is_submitting(),
            has_notice: view.notice().is_some(),
            notice: view.notice().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Deserialize)]
pub struct CreatePostForm {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: String,
}

pub async fn render(view: &mut ViewSession) -> AppResult<Response> {
    view.navigate(Route::Create).await;
    Ok(Html(CreateTemplate::from_view(&view.create)).into_response())
}

pub async fn submit(
    session: ActiveSession,
    Form(form): Form<CreatePostForm>,
) -> AppResult<Response> {
    // Claimed before waiting on the session, so a double submit is refused
    // instead of queueing a second insert.
    let Some(claim) = session.creating.try_begin() else {
        tracing::warn!("Refused create while another is outstanding");
        let busy = CreateTemplate {
            title: form.title,
            content: form.content,
            image_url: form.image_url,
            submitting: true,
            has_notice: true,
            notice: ALREADY_SUBMITTING.to_string(),
        };
        return Ok(session.respond((StatusCode::CONFLICT, Html(busy))));
    };

    let response = {
        let mut view = session.session.lock().await;
        view.navigate(Route::Create).await;

        let create = &mut view.create;
        create.set_fields(&form.title, &form.content, &form.image_url);
        match create.submit_claimed(claim).await {
            Some(route) => Redirect::to(&route.path()).into_response(),
            None => Html(CreateTemplate::from_view(create)).into_response(),
        }
    };

    Ok(session.respond(response))
}
