#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Response envelopes for the epi-risk server.
//!
//! Payload types come from the model crates; these only wrap them in the
//! JSON shapes the API has always returned.

use serde::{Deserialize, Serialize};

/// `{"result": ...}` wrapper used by every data route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResult<T> {
    /// The payload.
    pub result: T,
}

impl<T> ApiResult<T> {
    /// Wraps a payload.
    pub const fn new(result: T) -> Self {
        Self { result }
    }
}

/// Body of `GET /last_updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiLastUpdated {
    /// Feed refresh time as `YYYY-MM-DD HH:MM:SS` (UTC), or `null` if the
    /// feed never reported one.
    pub date: Option<String>,
}

/// Body of every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable failure description.
    pub error: String,
}

impl ApiError {
    /// Creates an error body.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelopes_serialize_to_fixed_keys() {
        assert_eq!(
            serde_json::to_string(&ApiResult::new(vec![1, 2])).unwrap(),
            r#"{"result":[1,2]}"#
        );
        assert_eq!(
            serde_json::to_string(&ApiLastUpdated { date: None }).unwrap(),
            r#"{"date":null}"#
        );
        assert_eq!(
            serde_json::to_string(&ApiError::new("boom")).unwrap(),
            r#"{"error":"boom"}"#
        );
    }
}
