// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pending results of asynchronous calls.
//!
//! # Usage from C
//!
//! ```c
//! CallbridgePending* pending = NULL;
//! if (callbridge_call_async(runtime, req, req_len, &pending) == CALLBRIDGE_OK) {
//!     uint8_t* buf = NULL;
//!     size_t len = 0;
//!     CallbridgeStatus st = callbridge_pending_wait(pending, UINT64_MAX, &buf, &len);
//!     // CALLBRIDGE_OK: buf holds the encoded Success payload
//!     // CALLBRIDGE_REMOTE_ERROR: buf holds the UTF-8 error message
//!     callbridge_buffer_free(buf, len);
//!     callbridge_pending_release(pending);
//! }
//! ```

use std::os::raw::c_void;
use std::ptr;
use std::time::Duration;

use callbridge::PendingResult;

use crate::{into_buffer, record_error, CallbridgeStatus};

/// Opaque handle to the pending result of an asynchronous call
#[repr(C)]
pub struct CallbridgePending {
    _private: [u8; 0],
}

pub(crate) type NativePending = PendingResult<Vec<u8>, String>;

/// Completion callback of an asynchronous call.
///
/// `status` is `CALLBRIDGE_OK` with the encoded `Success` payload, or
/// `CALLBRIDGE_REMOTE_ERROR` with the UTF-8 error message. `data` is only
/// valid for the duration of the call.
pub type CallbridgeCompletionFn =
    unsafe extern "C" fn(status: CallbridgeStatus, data: *const u8, len: usize, user_data: *mut c_void);

/// Completion function and its context, moved to the resolving thread.
struct Subscription {
    callback: CallbridgeCompletionFn,
    user_data: *mut c_void,
}

// SAFETY: the subscription contract requires the callback and user_data to
// be usable from the thread that resolves the call.
unsafe impl Send for Subscription {}

impl Subscription {
    fn notify(self, outcome: &Result<Vec<u8>, String>) {
        let (status, data) = match outcome {
            Ok(payload) => (CallbridgeStatus::CallbridgeOk, payload.as_slice()),
            Err(message) => (CallbridgeStatus::CallbridgeRemoteError, message.as_bytes()),
        };
        unsafe { (self.callback)(status, data.as_ptr(), data.len(), self.user_data) };
    }
}

pub(crate) fn into_handle(pending: NativePending) -> *mut CallbridgePending {
    Box::into_raw(Box::new(pending)).cast::<CallbridgePending>()
}

unsafe fn from_handle<'a>(pending: *const CallbridgePending) -> &'a NativePending {
    &*pending.cast::<NativePending>()
}

/// Subscribe to the resolution of a call.
///
/// `callback` runs exactly once: on the native thread that resolves the
/// call, or immediately on the calling thread if it is already resolved.
/// Several subscriptions on one handle are allowed; each runs once. The
/// subscription stays valid after `callbridge_pending_release`.
///
/// # Safety
/// - `pending` must be a live handle from `callbridge_call_async`.
/// - `callback` must be safe to call from any thread with `user_data`.
#[no_mangle]
pub unsafe extern "C" fn callbridge_pending_on_complete(
    pending: *const CallbridgePending,
    callback: Option<CallbridgeCompletionFn>,
    user_data: *mut c_void,
) -> CallbridgeStatus {
    if pending.is_null() {
        return record_error(CallbridgeStatus::CallbridgeInvalidArgument, "pending is NULL");
    }
    let Some(callback) = callback else {
        return record_error(CallbridgeStatus::CallbridgeInvalidArgument, "callback is NULL");
    };

    let subscription = Subscription {
        callback,
        user_data,
    };
    from_handle(pending).on_complete(move |outcome| subscription.notify(outcome));
    CallbridgeStatus::CallbridgeOk
}

/// Whether the call has resolved. NULL reports `false`.
///
/// # Safety
/// - `pending` must be a live handle or NULL.
#[no_mangle]
pub unsafe extern "C" fn callbridge_pending_is_ready(pending: *const CallbridgePending) -> bool {
    !pending.is_null() && from_handle(pending).is_ready()
}

/// Wait for the call to resolve.
///
/// `timeout_ms == UINT64_MAX` waits forever. On `CALLBRIDGE_OK` the buffer
/// holds the encoded `Success` payload; on `CALLBRIDGE_REMOTE_ERROR` the
/// UTF-8 error message. Either buffer must be freed with
/// `callbridge_buffer_free`. `CALLBRIDGE_TIMEOUT` leaves the call running.
///
/// # Safety
/// - `pending` must be a live handle.
/// - `out_buf` and `out_len` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn callbridge_pending_wait(
    pending: *const CallbridgePending,
    timeout_ms: u64,
    out_buf: *mut *mut u8,
    out_len: *mut usize,
) -> CallbridgeStatus {
    if pending.is_null() || out_buf.is_null() || out_len.is_null() {
        return record_error(CallbridgeStatus::CallbridgeInvalidArgument, "NULL argument");
    }
    *out_buf = ptr::null_mut();
    *out_len = 0;

    let pending = from_handle(pending);
    let outcome = if timeout_ms == u64::MAX {
        Some(pending.wait())
    } else {
        pending.wait_timeout(Duration::from_millis(timeout_ms))
    };

    match outcome {
        Some(Ok(payload)) => {
            into_buffer(payload, out_buf, out_len);
            CallbridgeStatus::CallbridgeOk
        }
        Some(Err(message)) => {
            let status = record_error(CallbridgeStatus::CallbridgeRemoteError, &message);
            into_buffer(message.into_bytes(), out_buf, out_len);
            status
        }
        None => record_error(
            CallbridgeStatus::CallbridgeTimeout,
            format!("call not resolved within {timeout_ms} ms"),
        ),
    }
}

/// Release a pending handle. The call itself keeps running and its
/// subscriptions still fire.
///
/// # Safety
/// - `pending` must be a handle from `callbridge_call_async` or NULL.
/// - Must only be called once per handle.
#[no_mangle]
pub unsafe extern "C" fn callbridge_pending_release(pending: *mut CallbridgePending) {
    if !pending.is_null() {
        drop(Box::from_raw(pending.cast::<NativePending>()));
    }
}
