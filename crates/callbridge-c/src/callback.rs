// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Managed callback registration.
//!
//! # Usage from C
//!
//! ```c
//! int32_t on_callback(const uint8_t* req, size_t req_len,
//!                     uint8_t** out_resp, size_t* out_resp_len,
//!                     void* user_data) {
//!     // decode req, build an encoded Response
//!     *out_resp = malloc(len);
//!     memcpy(*out_resp, encoded, len);
//!     *out_resp_len = len;
//!     return 0;
//! }
//!
//! callbridge_set_callback(runtime, on_callback, ctx, destroy_ctx);
//! ```

use std::os::raw::c_void;
use std::ptr;
use std::sync::Arc;

use callbridge::{CallbackChannel, CallbackError};

use crate::{guarded, lookup, record_error, CallbridgeStatus};

/// C callback invoked by the native side with an encoded `Request`.
///
/// # Parameters
/// - `request`: encoded request bytes (read-only, valid for the call only).
/// - `request_len`: length of `request`.
/// - `out_response`: on success, set to a `malloc()`-allocated encoded `Response`.
/// - `out_response_len`: on success, set to the response length.
/// - `user_data`: pointer given at registration.
///
/// # Returns
/// 0 on success. Any other value is reported to the native side as an error
/// response; `out_response` is then ignored.
///
/// # Memory
/// The response buffer must be allocated with `malloc()`; the library
/// `free()`s it.
///
/// # Threading
/// May be invoked concurrently from several native threads.
pub type CallbridgeCallbackFn = unsafe extern "C" fn(
    request: *const u8,
    request_len: usize,
    out_response: *mut *mut u8,
    out_response_len: *mut usize,
    user_data: *mut c_void,
) -> i32;

/// Releases `user_data` once the registration is no longer reachable.
pub type CallbridgeDestroyFn = unsafe extern "C" fn(user_data: *mut c_void);

/// Bridge from a C function pointer to [`CallbackChannel`].
struct CCallback {
    callback: CallbridgeCallbackFn,
    user_data: *mut c_void,
    destroy: Option<CallbridgeDestroyFn>,
}

// SAFETY: the registration contract requires the callback and user_data to
// be usable from any thread.
unsafe impl Send for CCallback {}
unsafe impl Sync for CCallback {}

impl CallbackChannel for CCallback {
    fn deliver(&self, request: &[u8]) -> Result<Vec<u8>, CallbackError> {
        let mut response_ptr: *mut u8 = ptr::null_mut();
        let mut response_len: usize = 0;

        let rc = unsafe {
            (self.callback)(
                request.as_ptr(),
                request.len(),
                &mut response_ptr,
                &mut response_len,
                self.user_data,
            )
        };

        if rc != 0 {
            log::warn!("managed callback returned status {}", rc);
            return Err(CallbackError::Status(rc));
        }
        if response_ptr.is_null() {
            return Ok(Vec::new());
        }

        // Copy the data, then free the C-allocated buffer
        let response = unsafe { std::slice::from_raw_parts(response_ptr, response_len).to_vec() };
        unsafe {
            libc::free(response_ptr.cast::<c_void>());
        }
        Ok(response)
    }
}

impl Drop for CCallback {
    fn drop(&mut self) {
        if let Some(destroy) = self.destroy {
            unsafe { destroy(self.user_data) };
        }
    }
}

/// Register the managed callback of a runtime, replacing any previous one.
///
/// `destroy` (may be NULL) is called exactly once with `user_data` when the
/// registration is replaced, cleared or the runtime released, after any
/// callback still running on it has returned.
///
/// # Returns
/// - `CALLBRIDGE_INVALID_ARGUMENT` if `callback` is NULL
/// - `CALLBRIDGE_RUNTIME_CLOSED` if `runtime` is not a live handle
///
/// On any non-OK status `destroy` is not called and the caller keeps
/// ownership of `user_data`.
///
/// # Safety
/// - `callback` and `destroy` must be safe to call from any thread while
///   the registration is alive.
#[no_mangle]
pub unsafe extern "C" fn callbridge_set_callback(
    runtime: u64,
    callback: Option<CallbridgeCallbackFn>,
    user_data: *mut c_void,
    destroy: Option<CallbridgeDestroyFn>,
) -> CallbridgeStatus {
    let Some(callback) = callback else {
        return record_error(CallbridgeStatus::CallbridgeInvalidArgument, "callback is NULL");
    };
    let Some(native) = lookup(runtime) else {
        return record_error(
            CallbridgeStatus::CallbridgeRuntimeClosed,
            format!("unknown runtime handle {runtime}"),
        );
    };

    // Replacing a registration runs its destroy function.
    guarded("callbridge_set_callback", move || {
        native.set_callback(Arc::new(CCallback {
            callback,
            user_data,
            destroy,
        }));
        log::debug!("callback registered on runtime {}", runtime);
        CallbridgeStatus::CallbridgeOk
    })
}

/// Remove the managed callback of a runtime.
///
/// # Safety
/// Always safe to call; unknown handles report `CALLBRIDGE_RUNTIME_CLOSED`.
#[no_mangle]
pub unsafe extern "C" fn callbridge_clear_callback(runtime: u64) -> CallbridgeStatus {
    let Some(native) = lookup(runtime) else {
        return record_error(
            CallbridgeStatus::CallbridgeRuntimeClosed,
            format!("unknown runtime handle {runtime}"),
        );
    };
    guarded("callbridge_clear_callback", move || {
        native.clear_callback();
        CallbridgeStatus::CallbridgeOk
    })
}
