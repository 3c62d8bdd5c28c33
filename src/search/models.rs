//! Search state and result data models

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Shown when a search runs past its deadline
pub const TIMEOUT_MESSAGE: &str = "Request timed out. Please try again.";
/// Shown for transport failures and unreadable responses
pub const NETWORK_ERROR_MESSAGE: &str = "Failed to search hostels. Please try again.";
/// Shown for non-2xx responses that carry no usable `error` field
pub const SERVER_ERROR_FALLBACK: &str = "Search failed";

/// Identifies one submission; later submissions always get larger tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestToken(pub(crate) u64);

impl RequestToken {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a search failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response before the deadline
    Timeout,
    /// Connection, DNS or transport failure, or a 2xx body that is not JSON
    NetworkError,
    /// Non-2xx response
    ServerError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::NetworkError => "network error",
            ErrorKind::ServerError => "server error",
        };
        f.write_str(s)
    }
}

/// Externally observed state of the search controller
///
/// Exactly one variant is active. Everything except `Idle` records the token
/// and query of the submission that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SearchRequestState {
    #[default]
    Idle,
    Pending {
        token: RequestToken,
        query: String,
    },
    Succeeded {
        token: RequestToken,
        query: String,
        results: Vec<Hostel>,
    },
    Failed {
        token: RequestToken,
        query: String,
        kind: ErrorKind,
        message: String,
    },
}

impl SearchRequestState {
    /// Token of the submission this state belongs to
    pub fn token(&self) -> Option<RequestToken> {
        match self {
            SearchRequestState::Idle => None,
            SearchRequestState::Pending { token, .. }
            | SearchRequestState::Succeeded { token, .. }
            | SearchRequestState::Failed { token, .. } => Some(*token),
        }
    }

    /// Query of the submission this state belongs to
    pub fn query(&self) -> Option<&str> {
        match self {
            SearchRequestState::Idle => None,
            SearchRequestState::Pending { query, .. }
            | SearchRequestState::Succeeded { query, .. }
            | SearchRequestState::Failed { query, .. } => Some(query),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SearchRequestState::Pending { .. })
    }

    /// `Succeeded` or `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchRequestState::Succeeded { .. } | SearchRequestState::Failed { .. }
        )
    }

    /// Results to display; empty for every state except `Succeeded`
    pub fn results(&self) -> &[Hostel] {
        match self {
            SearchRequestState::Succeeded { results, .. } => results,
            _ => &[],
        }
    }

    /// Failure kind and message, if the search failed
    pub fn error(&self) -> Option<(ErrorKind, &str)> {
        match self {
            SearchRequestState::Failed { kind, message, .. } => Some((*kind, message)),
            _ => None,
        }
    }
}

/// A single hostel returned by the search service
///
/// The payload is kept exactly as received. Accessors give a typed view but
/// never fail: a missing or mistyped field reads as `None` or an empty list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hostel(Value);

impl Hostel {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// Split a response body into hostels; anything but an array yields none
    pub fn list_from(body: Value) -> Vec<Hostel> {
        match body {
            Value::Array(items) => items.into_iter().map(Hostel).collect(),
            _ => Vec::new(),
        }
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn id(&self) -> Option<&str> {
        self.text("id")
    }

    pub fn name(&self) -> Option<&str> {
        self.text("name")
    }

    pub fn location(&self) -> Option<&str> {
        self.text("location")
    }

    pub fn description(&self) -> Option<&str> {
        self.text("description")
    }

    pub fn facilities(&self) -> Vec<&str> {
        self.labels("facilities")
    }

    pub fn room_types(&self) -> Vec<&str> {
        self.labels("room_types")
    }

    pub fn monthly_rent(&self) -> Option<&str> {
        self.text("monthly_rent")
    }

    pub fn ratings(&self) -> Option<&str> {
        self.text("ratings")
    }

    pub fn contact(&self) -> Option<&str> {
        self.text("contact")
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    fn labels(&self, key: &str) -> Vec<&str> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}
