//! Hostel search client
//!
//! Sends free-text queries to a hostel search service and tracks each request
//! through a cancellable, deadline-bounded lifecycle. The presentation layer
//! observes the published [`SearchRequestState`] and never handles errors
//! itself.

pub mod config;
pub mod error;
pub mod network;
pub mod render;
pub mod search;

pub use config::Settings;
pub use error::{Result, SearchError};
pub use network::HttpClient;
pub use search::{ErrorKind, Hostel, RequestToken, SearchController, SearchRequestState};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
