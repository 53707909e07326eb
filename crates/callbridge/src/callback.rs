// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native side of the callback path.
//!
//! While servicing a call the native side may re-enter the managed side:
//! it encodes a [`Request`], hands the bytes to a [`CallbackChannel`] and
//! decodes the [`Response`] it gets back. The channel runs synchronously on
//! whatever native thread issues the callback.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::codec::{self, CodecError};
use crate::message::{Request, Response};

/// Failures on the native side of a callback.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("No callback registered")]
    NotRegistered,

    #[error("Callback returned status {0}")]
    Status(i32),

    #[error("Callback response could not be decoded: {0}")]
    Codec(#[from] CodecError),
}

/// Transport into the managed side.
///
/// Implementations must be callable concurrently from several native
/// threads.
pub trait CallbackChannel: Send + Sync {
    /// Deliver an encoded request and return the encoded response.
    fn deliver(&self, request: &[u8]) -> Result<Vec<u8>, CallbackError>;
}

/// Encodes requests for, and decodes responses from, a [`CallbackChannel`].
#[derive(Clone)]
pub struct CallbackContext {
    channel: Arc<dyn CallbackChannel>,
}

impl CallbackContext {
    pub fn new(channel: Arc<dyn CallbackChannel>) -> Self {
        Self { channel }
    }

    /// Call back into the managed side and wait for its answer.
    pub fn callback(&self, request: &Request) -> Result<Response, CallbackError> {
        let encoded = codec::encode_request(request);
        let reply = self.channel.deliver(&encoded)?;
        Ok(codec::decode_response(&reply)?)
    }

    /// Like [`callback`](Self::callback), with any failure folded into
    /// [`Response::Error`].
    pub fn callback_or_error(&self, request: &Request) -> Response {
        self.callback(request).unwrap_or_else(|err| {
            log::warn!("callback for '{}' failed: {}", request.message(), err);
            Response::error(err.to_string())
        })
    }
}

impl fmt::Debug for CallbackContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackContext").finish_non_exhaustive()
    }
}
