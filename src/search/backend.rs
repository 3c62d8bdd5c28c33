//! Backend trait the controller searches through

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Path of the search endpoint relative to the service base URL
pub const SEARCH_PATH: &str = "/api/search";

/// A service that answers hostel queries
///
/// Implementations return the decoded JSON body of a 2xx response, or a
/// [`SearchError`](crate::SearchError) describing why there is none:
/// `Status` for non-2xx responses (with the raw body), `Parse` for a 2xx body
/// that is not JSON, `Http` for everything that went wrong on the way.
///
/// The returned future is dropped when the request is superseded or runs past
/// its deadline, so implementations must not rely on running to completion.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str {
        "search"
    }

    /// Run one search
    async fn search(&self, query: &str) -> Result<Value>;
}
