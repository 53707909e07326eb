// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for bridge calls.

use std::os::raw::c_char;

use callbridge::CodecError;
use callbridge_c::{callbridge_last_error_message, CallbridgeStatus};
use thiserror::Error;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur during bridge calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Bytes from the native side could not be decoded
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The native side answered with an error; `message` is passed through verbatim
    #[error("Remote error: {message}")]
    Remote { message: String },

    /// The bridge, or the native runtime behind it, is closed
    #[error("Bridge is closed")]
    RuntimeClosed,

    /// An asynchronous call could not be started
    #[error("Call could not be started: {0}")]
    Initiation(String),

    /// The native runtime rejected its configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Native initialization or another native operation failed
    #[error("Native library failure: {0}")]
    Native(String),
}

impl BridgeError {
    /// Whether the native side reported the failure as data (an error response).
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Map a non-OK status, using this thread's last native error message.
    pub(crate) fn from_status(status: CallbridgeStatus) -> Self {
        let message = last_native_error();
        match status {
            CallbridgeStatus::CallbridgeRuntimeClosed => Self::RuntimeClosed,
            CallbridgeStatus::CallbridgeInitiationFailed => Self::Initiation(message),
            CallbridgeStatus::CallbridgeConfigError => Self::Config(message),
            CallbridgeStatus::CallbridgeRemoteError => Self::Remote { message },
            other => Self::Native(format!("{other:?}: {message}")),
        }
    }
}

fn last_native_error() -> String {
    unsafe {
        let needed = callbridge_last_error_message(std::ptr::null_mut(), 0);
        let mut buf = vec![0u8; needed + 1];
        callbridge_last_error_message(buf.as_mut_ptr().cast::<c_char>(), buf.len());
        buf.truncate(needed);
        String::from_utf8_lossy(&buf).into_owned()
    }
}
