//! HTTP networking module
//!
//! Provides the HTTP client used to reach the search service.

mod client;

pub use client::{ApiResponse, HealthStatus, HttpClient};
