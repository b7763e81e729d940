//! SeaORM entities and entity-level data access helpers.
pub mod errors;
pub mod db;
pub mod user;
pub mod refresh_token;

#[cfg(test)]
mod tests;
