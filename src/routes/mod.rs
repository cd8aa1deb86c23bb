pub mod assets;
pub mod create;
pub mod home;
pub mod post;

use axum::extract::Query;
use axum::http::Uri;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::{AppError, AppResult};
use crate::extractors::ActiveSession;
use crate::router::Route;
use crate::state::AppState;

/// The full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(page))
        .route("/create", get(page).post(create::submit))
        .route("/post/{id}", get(page))
        .merge(home::router())
        .merge(post::router())
        .route("/assets/{*path}", get(assets::serve))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET for the three views, dispatched through [`Route`].
async fn page(
    session: ActiveSession,
    uri: Uri,
    Query(query): Query<home::ListQuery>,
) -> AppResult<Response> {
    let route = Route::parse(uri.path()).ok_or(AppError::NotFound)?;

    let response = {
        let mut view = session.session.lock().await;
        match route {
            Route::List => home::render(&mut view, &query).await?,
            Route::Create => create::render(&mut view).await?,
            Route::Post(id) => post::render(&mut view, id).await?,
        }
    };

    Ok(session.respond(response))
}

async fn not_found() -> AppError {
    AppError::NotFound
}
