// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # callbridge SDK
//!
//! Managed side of the call bridge. [`Bridge`] drives the native library
//! through its C ABI:
//!
//! - [`Bridge::call_blocking`] waits for the response on the calling thread.
//! - [`Bridge::call_async`] returns a [`PendingResult`] resolved from a
//!   native worker thread; wait on it, poll it, subscribe to it or `.await` it.
//! - [`Bridge::set_callback_handler`] installs the [`CallbackHandler`] the
//!   native side calls back into while servicing a call.
//!
//! Native error responses surface as [`BridgeError::Remote`]; bytes that do
//! not decode surface as [`BridgeError::Codec`].

pub mod bridge;
pub mod error;
pub mod handler;

pub use bridge::Bridge;
pub use error::{BridgeError, BridgeResult};
pub use handler::{CallbackHandler, DefaultHandler, HandlerError, DEFAULT_CALLBACK_REPLY};

pub use callbridge::{
    CallbackMode, CodecError, PendingResult, Request, Response, RuntimeConfig, Success,
};
