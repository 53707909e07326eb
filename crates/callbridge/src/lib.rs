// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # callbridge
//!
//! Protocol core shared by both sides of the call bridge.
//!
//! A managed-side caller sends a [`Request`] to a natively compiled library
//! and receives a [`Response`]. Messages travel as protobuf bytes (see
//! [`codec`]) through a C ABI (`callbridge-c`). Three call shapes exist:
//!
//! - **Blocking**: the caller thread is suspended until the native side
//!   has produced an encoded [`Response`].
//! - **Asynchronous**: submission returns a [`PendingResult`] immediately;
//!   a native worker thread resolves it later with the encoded [`Success`]
//!   payload or a failure message.
//! - **Callback**: while servicing a call the native side re-enters the
//!   managed side through a [`CallbackChannel`] and waits for its answer.
//!
//! ```text
//! caller --Request--> codec --bytes--> NativeRuntime --bytes--> codec --Response--> caller
//!                                          |    ^
//!                                          v    |
//!                                   CallbackChannel (managed handler)
//! ```
//!
//! The native side of the protocol lives in [`NativeRuntime`]; the
//! single-assignment cell used by the asynchronous path is
//! [`PendingResult`], used on both sides of the boundary.

pub mod callback;
pub mod codec;
pub mod config;
pub mod message;
pub mod pending;
pub mod responder;
pub mod runtime;

pub use callback::{CallbackChannel, CallbackContext, CallbackError};
pub use codec::CodecError;
pub use config::{CallbackConfig, CallbackMode, ConfigError, ResponderConfig, RuntimeConfig};
pub use message::{Request, Response, Success};
pub use pending::{Completer, PendingResult};
pub use responder::Responder;
pub use runtime::{InitError, InitiationError, NativeRuntime};
