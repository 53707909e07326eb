// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging initialization for the callbridge C ABI

use std::ffi::CStr;
use std::os::raw::c_char;

use crate::{record_error, CallbridgeStatus};

/// Log level for callbridge logging
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbridgeLogLevel {
    CallbridgeLogOff = 0,
    CallbridgeLogError = 1,
    CallbridgeLogWarn = 2,
    CallbridgeLogInfo = 3,
    CallbridgeLogDebug = 4,
    CallbridgeLogTrace = 5,
}

impl From<CallbridgeLogLevel> for log::LevelFilter {
    fn from(level: CallbridgeLogLevel) -> Self {
        match level {
            CallbridgeLogLevel::CallbridgeLogOff => log::LevelFilter::Off,
            CallbridgeLogLevel::CallbridgeLogError => log::LevelFilter::Error,
            CallbridgeLogLevel::CallbridgeLogWarn => log::LevelFilter::Warn,
            CallbridgeLogLevel::CallbridgeLogInfo => log::LevelFilter::Info,
            CallbridgeLogLevel::CallbridgeLogDebug => log::LevelFilter::Debug,
            CallbridgeLogLevel::CallbridgeLogTrace => log::LevelFilter::Trace,
        }
    }
}

/// Install the env_logger backend, `RUST_LOG` taking precedence over
/// `default_level`. Returns `false` if a logger is already installed.
pub(crate) fn init_from_env(default_level: CallbridgeLogLevel) -> bool {
    let filter: log::LevelFilter = default_level.into();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter.to_string()))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}

/// Initialize callbridge logging with console output
///
/// # Safety
/// Always safe to call, from any thread. Only the first installation in
/// the process succeeds; later ones return `CALLBRIDGE_OPERATION_FAILED`.
///
/// # Returns
/// `CALLBRIDGE_OK` on success, `CALLBRIDGE_OPERATION_FAILED` if a logger is
/// already installed (including the one installed by `callbridge_library_init`)
///
/// # Example (C)
/// ```c
/// callbridge_logging_init(CALLBRIDGE_LOG_INFO);
/// ```
#[no_mangle]
pub unsafe extern "C" fn callbridge_logging_init(level: CallbridgeLogLevel) -> CallbridgeStatus {
    let filter: log::LevelFilter = level.into();

    match env_logger::Builder::new()
        .filter_level(filter)
        .format_timestamp_millis()
        .try_init()
    {
        Ok(()) => CallbridgeStatus::CallbridgeOk,
        Err(e) => record_error(CallbridgeStatus::CallbridgeOperationFailed, e),
    }
}

/// Initialize callbridge logging with environment variable override
///
/// Reads `RUST_LOG` if set, otherwise uses `default_level`.
///
/// # Safety
/// Always safe to call, from any thread. Only the first installation in
/// the process succeeds; later ones return `CALLBRIDGE_OPERATION_FAILED`.
#[no_mangle]
pub unsafe extern "C" fn callbridge_logging_init_env(
    default_level: CallbridgeLogLevel,
) -> CallbridgeStatus {
    if init_from_env(default_level) {
        CallbridgeStatus::CallbridgeOk
    } else {
        record_error(
            CallbridgeStatus::CallbridgeOperationFailed,
            "logger already initialized",
        )
    }
}

/// Initialize callbridge logging with a custom filter string
///
/// # Safety
/// - `filter` must be a valid null-terminated C string or NULL.
///
/// # Example (C)
/// ```c
/// callbridge_logging_init_with_filter("callbridge=debug,warn");
/// ```
#[no_mangle]
pub unsafe extern "C" fn callbridge_logging_init_with_filter(
    filter: *const c_char,
) -> CallbridgeStatus {
    if filter.is_null() {
        return CallbridgeStatus::CallbridgeInvalidArgument;
    }

    let Ok(filter_str) = CStr::from_ptr(filter).to_str() else {
        return record_error(
            CallbridgeStatus::CallbridgeInvalidArgument,
            "filter is not valid UTF-8",
        );
    };

    match env_logger::Builder::new()
        .parse_filters(filter_str)
        .format_timestamp_millis()
        .try_init()
    {
        Ok(()) => CallbridgeStatus::CallbridgeOk,
        Err(e) => record_error(CallbridgeStatus::CallbridgeOperationFailed, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn test_level_mapping() {
        assert_eq!(
            log::LevelFilter::from(CallbridgeLogLevel::CallbridgeLogOff),
            log::LevelFilter::Off
        );
        assert_eq!(
            log::LevelFilter::from(CallbridgeLogLevel::CallbridgeLogDebug),
            log::LevelFilter::Debug
        );
    }

    #[test]
    fn test_null_filter() {
        unsafe {
            assert_eq!(
                callbridge_logging_init_with_filter(ptr::null()),
                CallbridgeStatus::CallbridgeInvalidArgument
            );
        }
    }

    #[test]
    fn test_concurrent_init_installs_at_most_once() {
        let installs: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| unsafe {
                    callbridge_logging_init_env(CallbridgeLogLevel::CallbridgeLogOff)
                })
            })
            .collect();
        let statuses: Vec<_> = installs.into_iter().map(|h| h.join().unwrap()).collect();

        let installed = statuses
            .iter()
            .filter(|s| **s == CallbridgeStatus::CallbridgeOk)
            .count();
        assert!(installed <= 1);
        assert!(statuses.iter().all(|s| matches!(
            s,
            CallbridgeStatus::CallbridgeOk | CallbridgeStatus::CallbridgeOperationFailed
        )));
    }

    #[test]
    fn test_second_init_fails() {
        // Whichever test installs the logger first, the second attempt is refused.
        init_from_env(CallbridgeLogLevel::CallbridgeLogOff);
        unsafe {
            assert_eq!(
                callbridge_logging_init(CallbridgeLogLevel::CallbridgeLogInfo),
                CallbridgeStatus::CallbridgeOperationFailed
            );
        }
    }
}
