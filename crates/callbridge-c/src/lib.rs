// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # callbridge C ABI
//!
//! The native library of the call bridge. Managed callers reach the
//! native runtime only through the `extern "C"` functions below.
//!
//! Runtimes are identified by opaque `uint64_t` handles. Handles are never
//! reused within a process; a released or unknown handle is reported as
//! `CALLBRIDGE_RUNTIME_CLOSED`.
//!
//! # Usage from C
//!
//! ```c
//! uint64_t runtime = 0;
//! if (callbridge_init(&runtime) != CALLBRIDGE_OK) { /* ... */ }
//!
//! uint8_t* resp = NULL;
//! size_t resp_len = 0;
//! callbridge_call_blocking(runtime, req, req_len, &resp, &resp_len);
//! // decode resp[0..resp_len] as a Response
//! callbridge_buffer_free(resp, resp_len);
//!
//! callbridge_release(runtime);
//! ```
//!
//! # Safety
//!
//! All public functions are `unsafe` and require the caller to uphold the
//! invariants documented in each function's safety comment.

mod callback;
mod logging;
mod pending_ffi;

pub use callback::*;
pub use logging::*;
pub use pending_ffi::*;

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::CStr;
use std::fmt::Display;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once, OnceLock};

use callbridge::{InitError, InitiationError, NativeRuntime, RuntimeConfig};

/// Status codes returned by every fallible entry point.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbridgeStatus {
    /// Operation completed successfully
    CallbridgeOk = 0,
    /// NULL pointer or malformed argument
    CallbridgeInvalidArgument = 1,
    /// Runtime handle unknown, released, or shutting down
    CallbridgeRuntimeClosed = 2,
    /// Asynchronous call could not be started
    CallbridgeInitiationFailed = 3,
    /// The call resolved with an error message
    CallbridgeRemoteError = 4,
    /// Wait timed out, the call is still running
    CallbridgeTimeout = 5,
    /// Configuration could not be parsed or is invalid
    CallbridgeConfigError = 6,
    /// Unexpected internal failure
    CallbridgeOperationFailed = 7,
}

// =============================================================================
// Last error
// =============================================================================

thread_local! {
    static LAST_ERROR: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Record `message` as this thread's last error and return `status`.
pub(crate) fn record_error(status: CallbridgeStatus, message: impl Display) -> CallbridgeStatus {
    let message = message.to_string();
    log::debug!("{:?}: {}", status, message);
    LAST_ERROR.with(|last| *last.borrow_mut() = message);
    status
}

/// Copy this thread's last error message into `out_buf`.
///
/// Returns the message length in bytes (excluding the terminating NUL);
/// the copy is truncated to `capacity - 1` bytes. Pass NULL to query the
/// length only.
///
/// # Safety
/// - `out_buf` must point to `capacity` writable bytes, or be NULL.
#[no_mangle]
pub unsafe extern "C" fn callbridge_last_error_message(
    out_buf: *mut c_char,
    capacity: usize,
) -> usize {
    LAST_ERROR.with(|last| copy_str_to_buf(&last.borrow(), out_buf, capacity))
}

/// Copy a Rust str into a C buffer. Returns bytes needed (excluding null).
fn copy_str_to_buf(s: &str, out_buf: *mut c_char, capacity: usize) -> usize {
    let needed = s.len();
    if !out_buf.is_null() && capacity > 0 {
        let copy_len = needed.min(capacity - 1);
        unsafe {
            ptr::copy_nonoverlapping(s.as_ptr(), out_buf.cast::<u8>(), copy_len);
            *out_buf.add(copy_len) = 0;
        }
    }
    needed
}

// =============================================================================
// Runtime registry
// =============================================================================

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

fn runtime_registry() -> &'static Mutex<HashMap<u64, Arc<NativeRuntime>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<u64, Arc<NativeRuntime>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn register(runtime: NativeRuntime) -> u64 {
    let id = NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed);
    runtime_registry()
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .insert(id, Arc::new(runtime));
    id
}

/// Clone the runtime out of the registry; the lock is not held during calls.
pub(crate) fn lookup(id: u64) -> Option<Arc<NativeRuntime>> {
    runtime_registry()
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .get(&id)
        .cloned()
}

fn unregister(id: u64) -> Option<Arc<NativeRuntime>> {
    runtime_registry()
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .remove(&id)
}

fn runtime_closed(id: u64) -> CallbridgeStatus {
    record_error(
        CallbridgeStatus::CallbridgeRuntimeClosed,
        format!("unknown runtime handle {id}"),
    )
}

// =============================================================================
// Helpers
// =============================================================================

/// Run `f`, reporting a panic as `CALLBRIDGE_OPERATION_FAILED` instead of
/// unwinding into the caller.
pub(crate) fn guarded(
    operation: &str,
    f: impl FnOnce() -> CallbridgeStatus,
) -> CallbridgeStatus {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("{}: panicked: {}", operation, reason);
            record_error(
                CallbridgeStatus::CallbridgeOperationFailed,
                format!("{operation} panicked: {reason}"),
            )
        }
    }
}

/// Borrow `len` bytes at `data`; NULL is accepted for an empty slice.
unsafe fn borrow_bytes<'a>(data: *const u8, len: usize) -> Option<&'a [u8]> {
    if len == 0 {
        Some(&[])
    } else if data.is_null() {
        None
    } else {
        Some(std::slice::from_raw_parts(data, len))
    }
}

/// Hand `bytes` to the caller; free with `callbridge_buffer_free`.
pub(crate) unsafe fn into_buffer(bytes: Vec<u8>, out_buf: *mut *mut u8, out_len: *mut usize) {
    let boxed = bytes.into_boxed_slice();
    let len = boxed.len();
    if len == 0 {
        *out_buf = ptr::null_mut();
    } else {
        *out_buf = Box::into_raw(boxed).cast::<u8>();
    }
    *out_len = len;
}

fn create_runtime(config: &RuntimeConfig, out_runtime: *mut u64) -> CallbridgeStatus {
    match NativeRuntime::new(config) {
        Ok(runtime) => {
            let id = register(runtime);
            log::info!("runtime {} initialized", id);
            unsafe { *out_runtime = id };
            CallbridgeStatus::CallbridgeOk
        }
        Err(e @ InitError::Config(_)) => record_error(CallbridgeStatus::CallbridgeConfigError, e),
        Err(e) => {
            log::error!("callbridge_init: {}", e);
            record_error(CallbridgeStatus::CallbridgeOperationFailed, e)
        }
    }
}

// =============================================================================
// Library lifecycle
// =============================================================================

/// Get the callbridge library version string
///
/// # Safety
/// The returned pointer is static and must not be freed.
#[no_mangle]
pub unsafe extern "C" fn callbridge_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr().cast::<c_char>()
}

/// One-time process-wide initialization. Repeated calls are no-ops.
///
/// Installs an env_logger backend at `WARN` (overridable through
/// `RUST_LOG`) unless a logger is already installed. `callbridge_init`
/// calls it implicitly.
///
/// # Safety
/// Always safe to call.
#[no_mangle]
pub unsafe extern "C" fn callbridge_library_init() {
    static LIBRARY_INIT: Once = Once::new();
    LIBRARY_INIT.call_once(|| {
        logging::init_from_env(CallbridgeLogLevel::CallbridgeLogWarn);
        log::info!("callbridge {} loaded", env!("CARGO_PKG_VERSION"));
    });
}

/// Create a native runtime with the default configuration.
///
/// # Safety
/// - `out_runtime` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn callbridge_init(out_runtime: *mut u64) -> CallbridgeStatus {
    if out_runtime.is_null() {
        return record_error(CallbridgeStatus::CallbridgeInvalidArgument, "out_runtime is NULL");
    }
    callbridge_library_init();
    guarded("callbridge_init", || {
        create_runtime(&RuntimeConfig::default(), out_runtime)
    })
}

/// Create a native runtime from a TOML configuration document.
///
/// # Returns
/// `CALLBRIDGE_CONFIG_ERROR` if the document does not parse or validate;
/// the last error message carries the cause.
///
/// # Safety
/// - `config_toml` must be a valid null-terminated C string.
/// - `out_runtime` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn callbridge_init_with_config(
    config_toml: *const c_char,
    out_runtime: *mut u64,
) -> CallbridgeStatus {
    if config_toml.is_null() || out_runtime.is_null() {
        return record_error(CallbridgeStatus::CallbridgeInvalidArgument, "NULL argument");
    }
    let Ok(document) = CStr::from_ptr(config_toml).to_str() else {
        return record_error(
            CallbridgeStatus::CallbridgeInvalidArgument,
            "config_toml is not valid UTF-8",
        );
    };
    callbridge_library_init();

    let config = match RuntimeConfig::from_toml_str(document) {
        Ok(config) => config,
        Err(e) => return record_error(CallbridgeStatus::CallbridgeConfigError, e),
    };
    guarded("callbridge_init_with_config", || {
        create_runtime(&config, out_runtime)
    })
}

/// Release a native runtime.
///
/// Pending asynchronous calls are resolved with a "runtime released"
/// error. The registered callback's `destroy` runs once no callback is
/// executing on it.
///
/// # Returns
/// `CALLBRIDGE_RUNTIME_CLOSED` if the handle is unknown or already released.
///
/// # Safety
/// Always safe to call, including from a callback or a worker thread.
#[no_mangle]
pub unsafe extern "C" fn callbridge_release(runtime: u64) -> CallbridgeStatus {
    let Some(native) = unregister(runtime) else {
        return runtime_closed(runtime);
    };
    // Clearing the callback runs the host's destroy function.
    guarded("callbridge_release", move || {
        native.shutdown();
        native.clear_callback();
        drop(native);
        log::info!("runtime {} released", runtime);
        CallbridgeStatus::CallbridgeOk
    })
}

// =============================================================================
// Calls
// =============================================================================

/// Blocking call: send an encoded `Request`, receive an encoded `Response`.
///
/// Returns after the native side has produced the response, including the
/// request's delay. Failures of the call itself (undecodable request,
/// rejected message, callback fault) are encoded in the response; the
/// status only reports argument and handle errors.
///
/// The caller MUST free `*out_response` with `callbridge_buffer_free()`.
///
/// # Safety
/// - `request` must point to `request_len` bytes (or be NULL if `request_len` is 0).
/// - `out_response` and `out_response_len` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn callbridge_call_blocking(
    runtime: u64,
    request: *const u8,
    request_len: usize,
    out_response: *mut *mut u8,
    out_response_len: *mut usize,
) -> CallbridgeStatus {
    if out_response.is_null() || out_response_len.is_null() {
        return record_error(CallbridgeStatus::CallbridgeInvalidArgument, "NULL output pointer");
    }
    *out_response = ptr::null_mut();
    *out_response_len = 0;
    let Some(payload) = borrow_bytes(request, request_len) else {
        return record_error(CallbridgeStatus::CallbridgeInvalidArgument, "request is NULL");
    };
    let Some(native) = lookup(runtime) else {
        return runtime_closed(runtime);
    };

    guarded("callbridge_call_blocking", || {
        let response = native.call_blocking(payload);
        into_buffer(response, out_response, out_response_len);
        CallbridgeStatus::CallbridgeOk
    })
}

/// Start an asynchronous call.
///
/// Returns immediately. On `CALLBRIDGE_OK`, `*out_pending` is a handle to
/// release with `callbridge_pending_release()`. An initiation failure
/// (undecodable request, too many calls in flight) is reported here as
/// `CALLBRIDGE_INITIATION_FAILED` and never through the pending result.
///
/// # Safety
/// - `request` must point to `request_len` bytes (or be NULL if `request_len` is 0).
/// - `out_pending` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn callbridge_call_async(
    runtime: u64,
    request: *const u8,
    request_len: usize,
    out_pending: *mut *mut CallbridgePending,
) -> CallbridgeStatus {
    if out_pending.is_null() {
        return record_error(CallbridgeStatus::CallbridgeInvalidArgument, "out_pending is NULL");
    }
    *out_pending = ptr::null_mut();
    let Some(payload) = borrow_bytes(request, request_len) else {
        return record_error(CallbridgeStatus::CallbridgeInvalidArgument, "request is NULL");
    };
    let Some(native) = lookup(runtime) else {
        return runtime_closed(runtime);
    };

    guarded("callbridge_call_async", || match native.call_async(payload) {
        Ok(pending) => {
            *out_pending = pending_ffi::into_handle(pending);
            CallbridgeStatus::CallbridgeOk
        }
        Err(InitiationError::RuntimeClosed) => runtime_closed(runtime),
        Err(e) => record_error(CallbridgeStatus::CallbridgeInitiationFailed, e),
    })
}

/// Free a buffer returned by this library.
///
/// # Safety
/// - `data` must be a buffer returned by `callbridge_call_blocking` or
///   `callbridge_pending_wait`, or NULL.
/// - `len` must match the length returned with it.
/// - Must only be called once per buffer.
#[no_mangle]
pub unsafe extern "C" fn callbridge_buffer_free(data: *mut u8, len: usize) {
    if !data.is_null() && len > 0 {
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(data, len)));
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use callbridge::{codec, Request, Response, Success};
    use std::ffi::CString;
    use std::os::raw::c_void;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    fn init() -> u64 {
        let mut runtime = 0;
        unsafe {
            assert_eq!(callbridge_init(&mut runtime), CallbridgeStatus::CallbridgeOk);
        }
        runtime
    }

    fn init_with(config: &str) -> Result<u64, CallbridgeStatus> {
        let config = CString::new(config).unwrap();
        let mut runtime = 0;
        match unsafe { callbridge_init_with_config(config.as_ptr(), &mut runtime) } {
            CallbridgeStatus::CallbridgeOk => Ok(runtime),
            status => Err(status),
        }
    }

    fn last_error() -> String {
        unsafe {
            let needed = callbridge_last_error_message(ptr::null_mut(), 0);
            let mut buf = vec![0u8; needed + 1];
            callbridge_last_error_message(buf.as_mut_ptr().cast::<c_char>(), buf.len());
            buf.truncate(needed);
            String::from_utf8(buf).unwrap()
        }
    }

    fn call_blocking(runtime: u64, request: &Request) -> Response {
        let bytes = codec::encode_request(request);
        let mut out = ptr::null_mut();
        let mut out_len = 0;
        unsafe {
            assert_eq!(
                callbridge_call_blocking(runtime, bytes.as_ptr(), bytes.len(), &mut out, &mut out_len),
                CallbridgeStatus::CallbridgeOk
            );
            let response = codec::decode_response(std::slice::from_raw_parts(out, out_len)).unwrap();
            callbridge_buffer_free(out, out_len);
            response
        }
    }

    fn call_async(runtime: u64, request: &Request) -> *mut CallbridgePending {
        let bytes = codec::encode_request(request);
        let mut pending = ptr::null_mut();
        unsafe {
            assert_eq!(
                callbridge_call_async(runtime, bytes.as_ptr(), bytes.len(), &mut pending),
                CallbridgeStatus::CallbridgeOk
            );
        }
        pending
    }

    fn wait(pending: *mut CallbridgePending) -> (CallbridgeStatus, Vec<u8>) {
        let mut buf = ptr::null_mut();
        let mut len = 0;
        unsafe {
            let status = callbridge_pending_wait(pending, 5_000, &mut buf, &mut len);
            let bytes = if buf.is_null() {
                Vec::new()
            } else {
                std::slice::from_raw_parts(buf, len).to_vec()
            };
            callbridge_buffer_free(buf, len);
            callbridge_pending_release(pending);
            (status, bytes)
        }
    }

    #[test]
    fn test_null_safety() {
        unsafe {
            assert_eq!(
                callbridge_init(ptr::null_mut()),
                CallbridgeStatus::CallbridgeInvalidArgument
            );
            assert_eq!(
                callbridge_init_with_config(ptr::null(), ptr::null_mut()),
                CallbridgeStatus::CallbridgeInvalidArgument
            );
            assert_eq!(
                callbridge_call_blocking(1, ptr::null(), 0, ptr::null_mut(), ptr::null_mut()),
                CallbridgeStatus::CallbridgeInvalidArgument
            );
            let mut out = ptr::null_mut();
            let mut out_len = 0;
            assert_eq!(
                callbridge_call_blocking(1, ptr::null(), 4, &mut out, &mut out_len),
                CallbridgeStatus::CallbridgeInvalidArgument
            );
            assert_eq!(
                callbridge_call_async(1, ptr::null(), 0, ptr::null_mut()),
                CallbridgeStatus::CallbridgeInvalidArgument
            );
            callbridge_buffer_free(ptr::null_mut(), 0);
        }
    }

    #[test]
    fn test_version() {
        let version = unsafe { CStr::from_ptr(callbridge_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_library_init_is_idempotent() {
        unsafe {
            callbridge_library_init();
            callbridge_library_init();
        }
    }

    #[test]
    fn test_lifecycle_and_stale_handle() {
        let runtime = init();
        assert_eq!(
            call_blocking(runtime, &Request::new("Hello, Rust!")),
            Response::success("Hello, Java!")
        );

        unsafe {
            assert_eq!(callbridge_release(runtime), CallbridgeStatus::CallbridgeOk);
            assert_eq!(
                callbridge_release(runtime),
                CallbridgeStatus::CallbridgeRuntimeClosed
            );

            let bytes = codec::encode_request(&Request::new("Hello, Rust!"));
            let mut out = ptr::null_mut();
            let mut out_len = 0;
            assert_eq!(
                callbridge_call_blocking(runtime, bytes.as_ptr(), bytes.len(), &mut out, &mut out_len),
                CallbridgeStatus::CallbridgeRuntimeClosed
            );
            assert!(out.is_null());
        }
        assert!(last_error().contains("unknown runtime handle"));
    }

    #[test]
    fn test_handles_are_not_reused() {
        let first = init();
        unsafe { callbridge_release(first) };
        let second = init();
        assert_ne!(first, 0);
        assert!(second > first);
        unsafe { callbridge_release(second) };
    }

    #[test]
    fn test_config_errors() {
        assert_eq!(
            init_with("worker_threads = \"many\""),
            Err(CallbridgeStatus::CallbridgeConfigError)
        );
        assert!(last_error().contains("TOML"));

        assert_eq!(
            init_with("max_in_flight = 0"),
            Err(CallbridgeStatus::CallbridgeConfigError)
        );
        assert!(last_error().contains("max_in_flight"));
    }

    #[test]
    fn test_custom_responder() {
        let runtime =
            init_with("[responder]\naccepted_message = \"ping\"\nreply_message = \"pong\"")
                .unwrap();
        assert_eq!(call_blocking(runtime, &Request::new("ping")), Response::success("pong"));
        assert_eq!(
            call_blocking(runtime, &Request::new("Hello, Rust!")),
            Response::error("Unable to respond to 'Hello, Rust!'")
        );
        unsafe { callbridge_release(runtime) };
    }

    #[test]
    fn test_async_round_trip() {
        let runtime = init();

        let (status, bytes) = wait(call_async(runtime, &Request::new("Hello, Rust!")));
        assert_eq!(status, CallbridgeStatus::CallbridgeOk);
        assert_eq!(codec::decode_success(&bytes).unwrap(), Success::new("Hello, Java!"));

        let (status, bytes) = wait(call_async(runtime, &Request::new("Bad greeting")));
        assert_eq!(status, CallbridgeStatus::CallbridgeRemoteError);
        assert_eq!(bytes, b"Unable to respond to 'Bad greeting'");

        unsafe { callbridge_release(runtime) };
    }

    #[test]
    fn test_async_returns_before_delay() {
        let runtime = init();
        let start = Instant::now();
        let pending = call_async(runtime, &Request::new("Hello, Rust!").with_response_delay(200));
        assert!(start.elapsed() < Duration::from_millis(100));
        assert!(unsafe { !callbridge_pending_is_ready(pending) });

        let (status, _) = wait(pending);
        assert_eq!(status, CallbridgeStatus::CallbridgeOk);
        assert!(start.elapsed() >= Duration::from_millis(200));
        unsafe { callbridge_release(runtime) };
    }

    #[test]
    fn test_async_initiation_failure() {
        let runtime = init();
        let garbage = [0x0A, 0x05, 0x41];
        let mut pending = ptr::null_mut();
        unsafe {
            assert_eq!(
                callbridge_call_async(runtime, garbage.as_ptr(), garbage.len(), &mut pending),
                CallbridgeStatus::CallbridgeInitiationFailed
            );
            assert!(pending.is_null());
        }
        assert!(last_error().starts_with("Unable to decode request"));
        unsafe { callbridge_release(runtime) };
    }

    #[test]
    fn test_release_resolves_in_flight_call() {
        let runtime = init();
        let pending = call_async(runtime, &Request::new("Hello, Rust!").with_response_delay(60_000));
        unsafe { callbridge_release(runtime) };

        let (status, bytes) = wait(pending);
        assert_eq!(status, CallbridgeStatus::CallbridgeRemoteError);
        assert_eq!(bytes, callbridge::runtime::RELEASED_MESSAGE.as_bytes());
    }

    unsafe extern "C" fn answer_from_callback(
        _request: *const u8,
        _request_len: usize,
        out_response: *mut *mut u8,
        out_response_len: *mut usize,
        user_data: *mut c_void,
    ) -> i32 {
        (*user_data.cast::<AtomicUsize>()).fetch_add(1, Ordering::SeqCst);
        let encoded = codec::encode_response(&Response::success("Hello from the callback"));
        let buffer = libc::malloc(encoded.len()).cast::<u8>();
        ptr::copy_nonoverlapping(encoded.as_ptr(), buffer, encoded.len());
        *out_response = buffer;
        *out_response_len = encoded.len();
        0
    }

    unsafe extern "C" fn mark_destroyed(user_data: *mut c_void) {
        (*user_data.cast::<AtomicUsize>()).fetch_add(100, Ordering::SeqCst);
    }

    #[test]
    fn test_inline_callback_and_destroy_on_release() {
        let runtime = init_with("[callback]\nmode = \"inline\"").unwrap();
        let calls = Box::into_raw(Box::new(AtomicUsize::new(0)));

        unsafe {
            assert_eq!(
                callbridge_set_callback(
                    runtime,
                    Some(answer_from_callback),
                    calls.cast::<c_void>(),
                    Some(mark_destroyed),
                ),
                CallbridgeStatus::CallbridgeOk
            );
        }
        assert_eq!(
            call_blocking(runtime, &Request::new("Hello, Rust!")),
            Response::success("Hello from the callback")
        );

        unsafe {
            assert_eq!((*calls).load(Ordering::SeqCst), 1);
            callbridge_release(runtime);
            assert_eq!((*calls).load(Ordering::SeqCst), 101);
            drop(Box::from_raw(calls));
        }
    }

    #[test]
    fn test_guarded_reports_panics() {
        let status = guarded("test_operation", || panic!("boom"));
        assert_eq!(status, CallbridgeStatus::CallbridgeOperationFailed);
        assert_eq!(last_error(), "test_operation panicked: boom");
    }

    #[test]
    fn test_last_error_truncates() {
        record_error(CallbridgeStatus::CallbridgeTimeout, "0123456789");
        let mut buf = [0 as c_char; 5];
        let needed = unsafe { callbridge_last_error_message(buf.as_mut_ptr(), buf.len()) };
        assert_eq!(needed, 10);
        let copied = unsafe { CStr::from_ptr(buf.as_ptr()) };
        assert_eq!(copied.to_str().unwrap(), "0123");
    }
}
