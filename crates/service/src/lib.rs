//! Service layer providing the authentication workflows on top of models.
//! - Separates business logic from data access behind repository traits.
//! - Reuses validation and entity definitions in `models` crate.

pub mod auth;
#[cfg(test)]
pub mod test_support;
