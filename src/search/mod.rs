//! Search request lifecycle
//!
//! The controller turns a query into exactly one terminal state, enforcing
//! single-flight submission and a hard deadline.

mod backend;
mod controller;
mod models;

pub use backend::{SearchBackend, SEARCH_PATH};
pub use controller::SearchController;
pub use models::*;
