// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Messages exchanged across the bridge.
//!
//! [`Request`] and [`Success`] are protobuf messages (prost derive, schema in
//! `proto/callbridge.proto`). [`Response`] is the typed view of the
//! two-variant response frame; its wire form lives in [`crate::codec`].

use std::time::Duration;

/// A call issued by the managed side (or by the native side on the callback path).
///
/// Immutable once built: fields are only set through [`Request::new`] and
/// [`Request::with_response_delay`].
#[derive(Clone, PartialEq, prost::Message)]
pub struct Request {
    #[prost(string, tag = "1")]
    message: String,

    /// Artificial latency in milliseconds applied by the native side.
    #[prost(uint64, tag = "2")]
    response_delay: u64,
}

impl Request {
    /// Create a request with no artificial delay.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            response_delay: 0,
        }
    }

    /// Return the same request with `delay_ms` of simulated latency.
    #[must_use]
    pub fn with_response_delay(mut self, delay_ms: u64) -> Self {
        self.response_delay = delay_ms;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn response_delay_ms(&self) -> u64 {
        self.response_delay
    }

    pub fn response_delay(&self) -> Duration {
        Duration::from_millis(self.response_delay)
    }
}

/// Payload of a successful call.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Success {
    #[prost(string, tag = "1")]
    pub message: String,
}

impl Success {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outcome of a call: exactly one of success or error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The call succeeded.
    Success { message: String },
    /// The callee reported a failure; `error_message` is passed through verbatim.
    Error { error_message: String },
}

impl Response {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    pub fn error(error_message: impl Into<String>) -> Self {
        Self::Error {
            error_message: error_message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Split into the success payload or the error message.
    pub fn into_result(self) -> Result<Success, String> {
        match self {
            Self::Success { message } => Ok(Success { message }),
            Self::Error { error_message } => Err(error_message),
        }
    }
}

impl From<Success> for Response {
    fn from(success: Success) -> Self {
        Self::Success {
            message: success.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_to_no_delay() {
        let request = Request::new("Hello, Rust!");
        assert_eq!(request.message(), "Hello, Rust!");
        assert_eq!(request.response_delay_ms(), 0);
        assert_eq!(request.response_delay(), Duration::ZERO);
    }

    #[test]
    fn test_request_with_delay() {
        let request = Request::new("Hello, Rust!").with_response_delay(250);
        assert_eq!(request.response_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_response_into_result() {
        assert_eq!(
            Response::success("ok").into_result(),
            Ok(Success::new("ok"))
        );
        assert_eq!(
            Response::error("nope").into_result(),
            Err("nope".to_string())
        );
    }

    #[test]
    fn test_success_converts_to_response() {
        let response: Response = Success::new("Hello, Java!").into();
        assert!(response.is_success());
        assert_eq!(response, Response::success("Hello, Java!"));
    }
}
