// Library exports for Hearth
// This allows integration tests to drive the store, views and routes directly

pub mod config;
pub mod error;
pub mod extractors;
pub mod router;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod views;
