//! Circulation server
//!
//! REST JSON API handling the borrow lifecycle of a library: lending copies of
//! books to members, returns with overdue fines, extensions, fine payment and
//! circulation reporting.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
