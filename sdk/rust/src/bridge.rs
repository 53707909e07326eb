// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Managed-side bridge.
//!
//! A [`Bridge`] owns one native runtime handle and turns typed calls into
//! calls on the `callbridge-c` ABI.
//!
//! # Example
//!
//! ```no_run
//! use callbridge_sdk::{Bridge, Request};
//!
//! let bridge = Bridge::open()?;
//! let reply = bridge.call_blocking(&Request::new("Hello, Rust!"))?;
//! assert_eq!(reply.message, "Hello, Java!");
//!
//! let pending = bridge.call_async(&Request::new("Hello, Rust!").with_response_delay(100))?;
//! let reply = pending.wait()?;
//! # Ok::<(), callbridge_sdk::BridgeError>(())
//! ```

use std::ffi::CString;
use std::fmt;
use std::os::raw::c_void;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;

use callbridge::pending::{self, Completer, PendingResult};
use callbridge::{codec, Request, RuntimeConfig, Success};
use callbridge_c::{
    callbridge_buffer_free, callbridge_call_async, callbridge_call_blocking,
    callbridge_clear_callback, callbridge_init, callbridge_init_with_config,
    callbridge_library_init, callbridge_pending_on_complete, callbridge_pending_release,
    callbridge_release, callbridge_set_callback, CallbridgeStatus,
};

use crate::error::{BridgeError, BridgeResult};
use crate::handler::{
    dispatch_callback, release_callback, CallbackHandler, DefaultHandler, HandlerSlot,
};

/// Handle value of a closed bridge; the native side never issues it.
const CLOSED: u64 = 0;

type AsyncCompleter = Completer<Success, BridgeError>;

fn load_library() {
    static LIBRARY: Once = Once::new();
    LIBRARY.call_once(|| unsafe { callbridge_library_init() });
}

fn check(status: CallbridgeStatus) -> BridgeResult<()> {
    match status {
        CallbridgeStatus::CallbridgeOk => Ok(()),
        other => Err(BridgeError::from_status(other)),
    }
}

/// Copy a library buffer and free it.
unsafe fn take_buffer(data: *mut u8, len: usize) -> Vec<u8> {
    if data.is_null() {
        return Vec::new();
    }
    let bytes = std::slice::from_raw_parts(data, len).to_vec();
    callbridge_buffer_free(data, len);
    bytes
}

/// Map the bytes returned by a blocking call.
fn map_blocking_reply(bytes: &[u8]) -> BridgeResult<Success> {
    codec::decode_response(bytes)?
        .into_result()
        .map_err(|message| BridgeError::Remote { message })
}

/// Map the completion of an asynchronous call.
fn map_async_reply(status: CallbridgeStatus, payload: &[u8]) -> BridgeResult<Success> {
    match status {
        CallbridgeStatus::CallbridgeOk => Ok(codec::decode_success(payload)?),
        CallbridgeStatus::CallbridgeRemoteError => Err(BridgeError::Remote {
            message: String::from_utf8_lossy(payload).into_owned(),
        }),
        other => Err(BridgeError::Native(format!(
            "unexpected completion status {other:?}"
        ))),
    }
}

/// Completion trampoline; `user_data` owns the managed completer.
unsafe extern "C" fn complete_async_call(
    status: CallbridgeStatus,
    data: *const u8,
    len: usize,
    user_data: *mut c_void,
) {
    if user_data.is_null() {
        return;
    }
    let completer = Box::from_raw(user_data.cast::<AsyncCompleter>());
    let payload = if data.is_null() || len == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(data, len)
    };
    completer.complete(map_async_reply(status, payload));
}

/// Managed-side handle to one native runtime.
///
/// Calls may be issued from any number of threads. The native runtime is
/// released by [`close`](Self::close) or, failing that, on drop.
pub struct Bridge {
    runtime: AtomicU64,
}

impl Bridge {
    /// Open a native runtime with the default configuration and the
    /// [`DefaultHandler`] registered.
    pub fn open() -> BridgeResult<Self> {
        load_library();
        let mut runtime = CLOSED;
        check(unsafe { callbridge_init(&mut runtime) })?;
        Self::adopt(runtime)
    }

    /// Open a native runtime from `config`.
    pub fn open_with_config(config: &RuntimeConfig) -> BridgeResult<Self> {
        load_library();
        let document = config
            .to_toml_string()
            .map_err(|e| BridgeError::Config(e.to_string()))?;
        let document = CString::new(document).map_err(|e| BridgeError::Config(e.to_string()))?;

        let mut runtime = CLOSED;
        check(unsafe { callbridge_init_with_config(document.as_ptr(), &mut runtime) })?;
        Self::adopt(runtime)
    }

    fn adopt(runtime: u64) -> BridgeResult<Self> {
        log::debug!("bridge opened on runtime {}", runtime);
        let bridge = Self {
            runtime: AtomicU64::new(runtime),
        };
        bridge.set_callback_handler(DefaultHandler)?;
        Ok(bridge)
    }

    fn runtime(&self) -> BridgeResult<u64> {
        match self.runtime.load(Ordering::Acquire) {
            CLOSED => Err(BridgeError::RuntimeClosed),
            runtime => Ok(runtime),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.runtime.load(Ordering::Acquire) == CLOSED
    }

    /// Release the native runtime. Calls issued afterwards fail with
    /// [`BridgeError::RuntimeClosed`] without reaching the native side;
    /// pending asynchronous calls resolve with an error.
    ///
    /// # Panics
    ///
    /// Panics if the bridge is already closed.
    pub fn close(&self) {
        let runtime = self.runtime.swap(CLOSED, Ordering::AcqRel);
        assert_ne!(runtime, CLOSED, "Bridge::close called on a closed bridge");
        Self::release(runtime);
    }

    fn release(runtime: u64) {
        match unsafe { callbridge_release(runtime) } {
            CallbridgeStatus::CallbridgeOk => log::debug!("bridge released runtime {}", runtime),
            status => log::warn!(
                "releasing runtime {} failed: {}",
                runtime,
                BridgeError::from_status(status)
            ),
        }
    }

    /// Send `request` and wait for the native response on this thread.
    pub fn call_blocking(&self, request: &Request) -> BridgeResult<Success> {
        let runtime = self.runtime()?;
        let bytes = codec::encode_request(request);

        let mut out = ptr::null_mut();
        let mut out_len = 0;
        check(unsafe {
            callbridge_call_blocking(runtime, bytes.as_ptr(), bytes.len(), &mut out, &mut out_len)
        })?;
        let reply = unsafe { take_buffer(out, out_len) };
        map_blocking_reply(&reply)
    }

    /// Start `request` and return immediately.
    ///
    /// A failure to start the call is returned here; failures of the call
    /// itself resolve the [`PendingResult`]. Resolution happens on a native
    /// worker thread.
    pub fn call_async(
        &self,
        request: &Request,
    ) -> BridgeResult<PendingResult<Success, BridgeError>> {
        let runtime = self.runtime()?;
        let bytes = codec::encode_request(request);

        let mut handle = ptr::null_mut();
        check(unsafe { callbridge_call_async(runtime, bytes.as_ptr(), bytes.len(), &mut handle) })?;

        let (completer, result) = pending::channel(|| {
            BridgeError::Native("native side dropped the call without completing it".into())
        });
        let user_data = Box::into_raw(Box::new(completer)).cast::<c_void>();

        let subscribed = unsafe {
            let status =
                callbridge_pending_on_complete(handle, Some(complete_async_call), user_data);
            callbridge_pending_release(handle);
            status
        };
        if let Err(e) = check(subscribed) {
            drop(unsafe { Box::from_raw(user_data.cast::<AsyncCompleter>()) });
            return Err(e);
        }
        Ok(result)
    }

    /// Register `handler` for native callbacks, replacing the current one.
    pub fn set_callback_handler(&self, handler: impl CallbackHandler) -> BridgeResult<()> {
        let runtime = self.runtime()?;
        let slot: HandlerSlot = Box::new(handler);
        let user_data = Box::into_raw(Box::new(slot)).cast::<c_void>();

        let status = unsafe {
            callbridge_set_callback(
                runtime,
                Some(dispatch_callback),
                user_data,
                Some(release_callback),
            )
        };
        if let Err(e) = check(status) {
            unsafe { release_callback(user_data) };
            return Err(e);
        }
        Ok(())
    }

    /// Remove the callback handler; inline callbacks then fail with
    /// "No callback registered".
    pub fn clear_callback_handler(&self) -> BridgeResult<()> {
        let runtime = self.runtime()?;
        check(unsafe { callbridge_clear_callback(runtime) })
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let runtime = *self.runtime.get_mut();
        if runtime != CLOSED {
            *self.runtime.get_mut() = CLOSED;
            Self::release(runtime);
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("runtime", &self.runtime.load(Ordering::Acquire))
            .finish()
    }
}
