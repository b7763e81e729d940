//! Auth module: three-layer architecture (domain, repository, service).
//!
//! Credential checks, access token signing and refresh token rotation live
//! here; the HTTP layer only maps inputs and errors.

pub mod domain;
pub mod errors;
pub mod password;
pub mod refresh;
pub mod repo;
pub mod repository;
pub mod service;
pub mod token;

pub use errors::AuthError;
pub use service::{AuthConfig, AuthService};
