//! Authentication module for managing the signed-in session.
//!
//! This module provides:
//! - `SessionManager`: Owns the session state and drives restore, sign-in,
//!   sign-out and profile updates
//! - `SessionState`: What the front end observes to pick its root screen
//! - `SessionError`: Failures the front end can match on
//!
//! The profile and token are always stored and cleared together.

pub mod error;
pub mod session;

pub use error::SessionError;
pub use session::{ProfileUpdate, SessionApi, SessionManager, SessionState, SessionToken};
