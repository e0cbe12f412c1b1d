//! HTTP middleware and extractors.

pub mod auth;
pub mod error;

pub use auth::{AuthState, SessionAuth};
pub use error::REALM;
