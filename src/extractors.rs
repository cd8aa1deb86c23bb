use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::session::ViewSession;
use crate::state::AppState;
use crate::views::InFlight;

/// The browser's view session, found by cookie or started fresh.
///
/// Safe requests (GET, HEAD) without a live session render from a detached
/// session and set no cookie; a session is only kept once the browser posts
/// a form.
pub struct ActiveSession {
    pub key: Option<String>,
    pub session: Arc<Mutex<ViewSession>>,
    pub creating: InFlight,
    cookie_name: String,
}

impl FromRequestParts<AppState> for ActiveSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookie_name = &state.config.session.cookie_name;
        let presented = extract_cookie(parts, cookie_name);

        let mut sessions = state.sessions.lock().await;
        let live = presented
            .and_then(|key| sessions.find(key).map(|slot| (key.to_string(), slot)));
        let (key, slot) = match live {
            Some((key, slot)) => (Some(key), slot),
            None if parts.method.is_safe() => (None, sessions.detached()),
            None => {
                let (key, slot) = sessions.start();
                (Some(key), slot)
            }
        };

        Ok(ActiveSession {
            key,
            session: slot.view,
            creating: slot.creating,
            cookie_name: cookie_name.clone(),
        })
    }
}

impl ActiveSession {
    /// Attach the session cookie, if the session is kept, to a response.
    pub fn respond(&self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        let Some(key) = &self.key else {
            return response;
        };
        let cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/",
            self.cookie_name, key
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        response
    }
}

fn extract_cookie<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}
