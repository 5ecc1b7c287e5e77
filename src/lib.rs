pub mod app;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod types;
pub mod validation;

pub use app::{app, AppState};
pub use error::ApiError;

#[cfg(test)]
pub mod testing;
