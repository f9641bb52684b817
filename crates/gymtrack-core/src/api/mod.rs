//! REST API client module for the gym service.
//!
//! This module provides the `ApiClient` for signing in, editing the
//! profile, browsing exercises and recording workout history.
//!
//! Requests carry a bearer token from the shared `BearerAuth` handle once
//! the session manager has set one.

pub mod avatar;
pub mod bearer;
pub mod client;
pub mod error;

pub use avatar::AvatarUpload;
pub use bearer::BearerAuth;
pub use client::{ApiClient, NewAccount, SignInResponse, UpdateUserRequest};
pub use error::ApiError;
