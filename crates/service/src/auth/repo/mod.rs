//! Storage-backed implementations of the auth repository traits.

pub mod seaorm;

pub use seaorm::{SeaOrmRefreshTokenRepository, SeaOrmUserRepository};
