//! Core library for gymtrack.
//!
//! Provides the API client, session management, local session storage,
//! data models and form validation shared by gymtrack front ends.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;
pub mod utils;
pub mod validation;

pub use api::{ApiClient, ApiError};
pub use auth::{SessionError, SessionManager, SessionState};
pub use config::Config;
pub use storage::SessionStorage;
