//! Maps the three URL patterns onto the three views.

use std::fmt;

use crate::store::PostId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// `/`
    List,
    /// `/create`
    Create,
    /// `/post/{id}`
    Post(PostId),
}

impl Route {
    /// Resolve a request path. Trailing slashes are ignored; anything else
    /// yields `None`.
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => return Some(Route::List),
            "/create" => return Some(Route::Create),
            _ => {}
        }

        let id = trimmed.strip_prefix("/post/")?;
        if id.contains('/') {
            return None;
        }
        id.parse::<i64>().ok().map(|n| Route::Post(PostId(n)))
    }

    pub fn path(&self) -> String {
        match self {
            Route::List => "/".to_string(),
            Route::Create => "/create".to_string(),
            Route::Post(id) => format!("/post/{id}"),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
