// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Encode/decode pair for bridge messages.
//!
//! The response frame carries two optional sub-messages, `success` (tag 1)
//! and `error` (tag 2). Decoding resolves it to a [`Response`]:
//!
//! | success | error | result |
//! |---------|-------|--------|
//! | set     | unset | `Response::Success` |
//! | unset   | set   | `Response::Error` |
//! | set     | set   | `Response::Error` (error wins) |
//! | unset   | unset | [`CodecError::EmptyResponse`] |

use prost::Message;
use thiserror::Error;

use crate::message::{Request, Response, Success};

/// Bytes could not be decoded into the expected message shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Protobuf schema mismatch: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Response carries neither a success nor an error payload")]
    EmptyResponse,
}

/// Wire form of [`Response`].
#[derive(Clone, PartialEq, prost::Message)]
struct ResponseFrame {
    #[prost(message, optional, tag = "1")]
    success: Option<Success>,

    #[prost(message, optional, tag = "2")]
    error: Option<ErrorDetail>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct ErrorDetail {
    #[prost(string, tag = "1")]
    error_message: String,
}

impl From<&Response> for ResponseFrame {
    fn from(response: &Response) -> Self {
        match response {
            Response::Success { message } => Self {
                success: Some(Success::new(message.clone())),
                error: None,
            },
            Response::Error { error_message } => Self {
                success: None,
                error: Some(ErrorDetail {
                    error_message: error_message.clone(),
                }),
            },
        }
    }
}

impl TryFrom<ResponseFrame> for Response {
    type Error = CodecError;

    fn try_from(frame: ResponseFrame) -> Result<Self, CodecError> {
        match (frame.success, frame.error) {
            (_, Some(error)) => Ok(Response::Error {
                error_message: error.error_message,
            }),
            (Some(success), None) => Ok(success.into()),
            (None, None) => Err(CodecError::EmptyResponse),
        }
    }
}

pub fn encode_request(request: &Request) -> Vec<u8> {
    request.encode_to_vec()
}

pub fn decode_request(bytes: &[u8]) -> Result<Request, CodecError> {
    Ok(Request::decode(bytes)?)
}

pub fn encode_response(response: &Response) -> Vec<u8> {
    ResponseFrame::from(response).encode_to_vec()
}

pub fn decode_response(bytes: &[u8]) -> Result<Response, CodecError> {
    ResponseFrame::decode(bytes)?.try_into()
}

/// Encode the bare success payload carried by the asynchronous path.
pub fn encode_success(success: &Success) -> Vec<u8> {
    success.encode_to_vec()
}

pub fn decode_success(bytes: &[u8]) -> Result<Success, CodecError> {
    Ok(Success::decode(bytes)?)
}
