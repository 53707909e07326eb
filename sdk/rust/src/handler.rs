// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Managed callback handlers.
//!
//! The native side calls back with an encoded [`Request`]; the trampoline
//! decodes it, runs the registered [`CallbackHandler`] and returns the
//! encoded [`Response`] in a `malloc` buffer. Handler faults (an `Err`,
//! a panic or an undecodable request) are answered with
//! [`Response::Error`] and never cross the C boundary.

use std::any::Any;
use std::os::raw::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use callbridge::{codec, Request, Response};

/// Error returned by a handler; its `Display` becomes the error response.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Reply of the [`DefaultHandler`].
pub const DEFAULT_CALLBACK_REPLY: &str = "Hello from the callback";

/// Handler for native-initiated callbacks.
///
/// May run concurrently on several native threads.
pub trait CallbackHandler: Send + Sync + 'static {
    fn on_callback(&self, request: &Request) -> Result<Response, HandlerError>;
}

impl<F> CallbackHandler for F
where
    F: Fn(&Request) -> Result<Response, HandlerError> + Send + Sync + 'static,
{
    fn on_callback(&self, request: &Request) -> Result<Response, HandlerError> {
        self(request)
    }
}

/// Installed by [`Bridge::open`](crate::Bridge::open): logs the request and
/// answers [`DEFAULT_CALLBACK_REPLY`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHandler;

impl CallbackHandler for DefaultHandler {
    fn on_callback(&self, request: &Request) -> Result<Response, HandlerError> {
        log::info!("callback from native side: '{}'", request.message());
        Ok(Response::success(DEFAULT_CALLBACK_REPLY))
    }
}

/// Registration payload passed to the native side as `user_data`.
pub(crate) type HandlerSlot = Box<dyn CallbackHandler>;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Decode, dispatch and convert every fault into an error response.
pub(crate) fn answer(handler: &dyn CallbackHandler, request: &[u8]) -> Response {
    let request = match codec::decode_request(request) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("undecodable callback request: {}", e);
            return Response::error(format!("Unable to decode callback request: {e}"));
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(|| handler.on_callback(&request))) {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            log::warn!("callback handler failed on '{}': {}", request.message(), e);
            Response::error(e.to_string())
        }
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            log::warn!("callback handler panicked on '{}': {}", request.message(), reason);
            Response::error(format!("Callback handler panicked: {reason}"))
        }
    }
}

/// C trampoline registered with `callbridge_set_callback`.
pub(crate) unsafe extern "C" fn dispatch_callback(
    request: *const u8,
    request_len: usize,
    out_response: *mut *mut u8,
    out_response_len: *mut usize,
    user_data: *mut c_void,
) -> i32 {
    if out_response.is_null() || out_response_len.is_null() || user_data.is_null() {
        return 1;
    }
    let bytes = if request_len == 0 {
        &[][..]
    } else if request.is_null() {
        return 1;
    } else {
        std::slice::from_raw_parts(request, request_len)
    };

    let handler = &*user_data.cast::<HandlerSlot>();
    let encoded = codec::encode_response(&answer(handler.as_ref(), bytes));

    let buffer = libc::malloc(encoded.len()).cast::<u8>();
    if buffer.is_null() {
        log::error!("callback response allocation failed ({} bytes)", encoded.len());
        return 2;
    }
    ptr::copy_nonoverlapping(encoded.as_ptr(), buffer, encoded.len());
    *out_response = buffer;
    *out_response_len = encoded.len();
    0
}

/// Destroy function paired with [`dispatch_callback`].
pub(crate) unsafe extern "C" fn release_callback(user_data: *mut c_void) {
    if !user_data.is_null() {
        drop(Box::from_raw(user_data.cast::<HandlerSlot>()));
    }
}
