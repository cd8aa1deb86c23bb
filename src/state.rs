use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::session::ViewSessions;
use crate::store::SharedStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<Mutex<ViewSessions>>,
}

impl AppState {
    pub fn new(store: SharedStore, config: Config) -> Self {
        let sessions = ViewSessions::new(
            store,
            config.session.idle(),
            config.session.max_sessions,
        );
        Self {
            config,
            sessions: Arc::new(Mutex::new(sessions)),
        }
    }
}
