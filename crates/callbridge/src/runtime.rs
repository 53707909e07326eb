// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native runtime: one initialized native instance.
//!
//! Owns a tokio multi-thread runtime for the asynchronous path, the
//! [`Responder`] and the callback registration. Blocking calls run on the
//! caller's thread; asynchronous calls are spawned onto the runtime and
//! resolve a [`PendingResult`] from a worker thread.
//!
//! # Shutdown
//!
//! [`NativeRuntime::shutdown`] (or drop) shuts the tokio runtime down in the
//! background. Tasks still sleeping are dropped, which drops their
//! [`Completer`](crate::Completer) and resolves the pending result with a
//! failure instead of leaving a waiter hanging.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime};

use crate::callback::{CallbackChannel, CallbackContext, CallbackError};
use crate::codec::{self, CodecError};
use crate::config::{CallbackConfig, CallbackMode, ConfigError, RuntimeConfig};
use crate::message::{Request, Response};
use crate::pending::{self, PendingResult};
use crate::responder::Responder;

/// Failure message of calls dropped by a runtime shutdown.
pub const RELEASED_MESSAGE: &str = "runtime released before the call completed";

/// Native runtime could not be created.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Invalid runtime configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start native runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Asynchronous call could not be started. Reported synchronously, never
/// through the pending result.
#[derive(Debug, Error)]
pub enum InitiationError {
    #[error("Native runtime is closed")]
    RuntimeClosed,

    #[error("Unable to decode request: {0}")]
    InvalidRequest(#[from] CodecError),

    #[error("Too many calls in flight (limit {limit})")]
    TooManyInFlight { limit: usize },
}

/// State shared with worker tasks.
struct Service {
    responder: Responder,
    callback_config: CallbackConfig,
    callback: RwLock<Option<CallbackContext>>,
}

impl Service {
    fn callback_context(&self) -> Option<CallbackContext> {
        self.callback.read().clone()
    }

    /// Whether answering `request` re-enters the managed side.
    fn relays_inline(&self, request: &Request) -> bool {
        self.callback_config.mode == CallbackMode::Inline && self.responder.accepts(request)
    }

    /// Answer `request` once its delay has elapsed.
    fn finish(&self, request: &Request) -> Response {
        if !self.relays_inline(request) {
            return self.responder.respond(request);
        }
        match self.callback_context() {
            Some(context) => {
                let request = Request::new(self.callback_config.message.clone());
                context.callback_or_error(&request)
            }
            None => {
                log::warn!("inline callback requested but none is registered");
                Response::error(CallbackError::NotRegistered.to_string())
            }
        }
    }

    /// Late reply of a deferred blocking call.
    fn deliver_deferred_reply(&self) {
        let Some(context) = self.callback_context() else {
            log::warn!("deferred reply dropped: no callback registered");
            return;
        };
        let request = Request::new(self.responder.reply_message());
        match context.callback_or_error(&request) {
            Response::Success { message } => log::info!("deferred reply acknowledged: {}", message),
            Response::Error { error_message } => {
                log::warn!("deferred reply rejected: {}", error_message)
            }
        }
    }
}

/// Decrements the in-flight counter when the owning task ends or is dropped.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// One live native instance.
pub struct NativeRuntime {
    service: Arc<Service>,
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    closed: AtomicBool,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: usize,
}

impl NativeRuntime {
    /// Validate `config` and start the worker threads.
    pub fn new(config: &RuntimeConfig) -> Result<Self, InitError> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name(config.thread_name.clone())
            .enable_time()
            .build()?;
        let handle = runtime.handle().clone();

        log::info!(
            "native runtime started ({} workers, callback mode {:?})",
            config.worker_threads,
            config.callback.mode
        );

        Ok(Self {
            service: Arc::new(Service {
                responder: Responder::new(config.responder.clone()),
                callback_config: config.callback.clone(),
                callback: RwLock::new(None),
            }),
            runtime: Mutex::new(Some(runtime)),
            handle,
            closed: AtomicBool::new(false),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: config.max_in_flight,
        })
    }

    /// Register the managed side, replacing any previous registration.
    pub fn set_callback(&self, channel: Arc<dyn CallbackChannel>) {
        let previous = self
            .service
            .callback
            .write()
            .replace(CallbackContext::new(channel));
        // Dropping a registration may run host code; the lock is released first.
        drop(previous);
    }

    /// Remove the managed callback. Callbacks already running keep their
    /// channel until they return.
    pub fn clear_callback(&self) {
        let previous = self.service.callback.write().take();
        drop(previous);
    }

    pub fn has_callback(&self) -> bool {
        self.service.callback.read().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Asynchronous calls currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Blocking round-trip: encoded `Request` in, encoded `Response` out.
    ///
    /// Runs on the calling thread, including the request's delay. Every
    /// failure, undecodable input included, is answered with an encoded
    /// error response.
    pub fn call_blocking(&self, request: &[u8]) -> Vec<u8> {
        let response = match codec::decode_request(request) {
            Ok(request) => self.service_blocking(&request),
            Err(e) => {
                log::warn!("blocking call with undecodable request: {}", e);
                Response::error(format!("Unable to decode request: {e}"))
            }
        };
        codec::encode_response(&response)
    }

    fn service_blocking(&self, request: &Request) -> Response {
        log::debug!(
            "blocking call '{}' (delay {} ms)",
            request.message(),
            request.response_delay_ms()
        );
        let delay = request.response_delay();

        if self.service.callback_config.mode == CallbackMode::Deferred
            && !delay.is_zero()
            && self.service.responder.accepts(request)
        {
            self.schedule_deferred_reply(delay);
            return self.service.responder.deferred_reply();
        }

        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.service.finish(request)
    }

    fn schedule_deferred_reply(&self, delay: Duration) {
        let service = self.service.clone();
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let delivery = tokio::task::spawn_blocking(move || service.deliver_deferred_reply());
            if let Err(e) = delivery.await {
                log::error!("deferred reply task failed: {}", e);
            }
        });
    }

    /// Start an asynchronous call.
    ///
    /// Returns immediately. The pending result resolves on a worker thread
    /// to the encoded [`Success`](crate::Success) payload, or to the error
    /// message the blocking path would have returned.
    pub fn call_async(
        &self,
        request: &[u8],
    ) -> Result<PendingResult<Vec<u8>, String>, InitiationError> {
        if self.is_closed() {
            return Err(InitiationError::RuntimeClosed);
        }
        let request = codec::decode_request(request)?;

        let previous = self.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = InFlight(self.in_flight.clone());
        if previous >= self.max_in_flight {
            return Err(InitiationError::TooManyInFlight {
                limit: self.max_in_flight,
            });
        }

        log::debug!(
            "async call '{}' (delay {} ms)",
            request.message(),
            request.response_delay_ms()
        );

        let (completer, pending) = pending::channel(|| RELEASED_MESSAGE.to_string());
        let service = self.service.clone();
        self.handle.spawn(async move {
            let _guard = guard;
            let delay = request.response_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let response = if service.relays_inline(&request) {
                let worker = service.clone();
                match tokio::task::spawn_blocking(move || worker.finish(&request)).await {
                    Ok(response) => response,
                    Err(e) => Response::error(format!("Callback task failed: {e}")),
                }
            } else {
                service.finish(&request)
            };

            match response.into_result() {
                Ok(success) => completer.succeed(codec::encode_success(&success)),
                Err(message) => completer.fail(message),
            };
        });

        Ok(pending)
    }

    /// Stop accepting asynchronous calls and shut the worker threads down
    /// without waiting for them. Idempotent.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(runtime) = self.runtime.lock().take() {
            log::info!("native runtime shutting down ({} calls in flight)", self.in_flight());
            runtime.shutdown_background();
        }
    }
}

impl Drop for NativeRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for NativeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRuntime")
            .field("closed", &self.is_closed())
            .field("in_flight", &self.in_flight())
            .field("max_in_flight", &self.max_in_flight)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Success;
    use std::sync::mpsc;
    use std::time::Instant;

    fn runtime() -> NativeRuntime {
        NativeRuntime::new(&RuntimeConfig::default()).unwrap()
    }

    fn runtime_with(mode: CallbackMode) -> NativeRuntime {
        NativeRuntime::new(&RuntimeConfig::default().with_callback_mode(mode)).unwrap()
    }

    fn blocking(runtime: &NativeRuntime, request: &Request) -> Response {
        let reply = runtime.call_blocking(&codec::encode_request(request));
        codec::decode_response(&reply).unwrap()
    }

    /// Forwards every callback request to a channel and answers with a fixed response.
    struct Forwarder {
        seen: Mutex<mpsc::Sender<String>>,
        answer: Response,
    }

    impl Forwarder {
        fn new(answer: Response) -> (Arc<Self>, mpsc::Receiver<String>) {
            let (tx, rx) = mpsc::channel();
            let forwarder = Arc::new(Self {
                seen: Mutex::new(tx),
                answer,
            });
            (forwarder, rx)
        }
    }

    impl CallbackChannel for Forwarder {
        fn deliver(&self, request: &[u8]) -> Result<Vec<u8>, CallbackError> {
            let request = codec::decode_request(request)?;
            let _ = self.seen.lock().send(request.message().to_string());
            Ok(codec::encode_response(&self.answer))
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = RuntimeConfig {
            worker_threads: 0,
            ..Default::default()
        };
        assert!(matches!(
            NativeRuntime::new(&config),
            Err(InitError::Config(_))
        ));
    }

    #[test]
    fn test_blocking_success_and_error() {
        let runtime = runtime();
        assert_eq!(
            blocking(&runtime, &Request::new("Hello, Rust!")),
            Response::success("Hello, Java!")
        );
        assert_eq!(
            blocking(&runtime, &Request::new("Bad greeting")),
            Response::error("Unable to respond to 'Bad greeting'")
        );
    }

    #[test]
    fn test_blocking_undecodable_request_is_an_error_response() {
        let runtime = runtime();
        let reply = runtime.call_blocking(&[0x0A, 0x05, 0x41]);
        match codec::decode_response(&reply).unwrap() {
            Response::Error { error_message } => {
                assert!(error_message.starts_with("Unable to decode request:"))
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_blocking_honours_delay() {
        let runtime = runtime();
        let start = Instant::now();
        let response = blocking(&runtime, &Request::new("Hello, Rust!").with_response_delay(100));
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(response.is_success());
    }

    #[test]
    fn test_async_success_is_bare_payload() {
        let runtime = runtime();
        let pending = runtime
            .call_async(&codec::encode_request(&Request::new("Hello, Rust!")))
            .unwrap();
        let bytes = pending.wait_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(codec::decode_success(&bytes).unwrap(), Success::new("Hello, Java!"));
    }

    #[test]
    fn test_async_error_matches_blocking_message() {
        let runtime = runtime();
        let request = Request::new("Bad greeting");
        let pending = runtime.call_async(&codec::encode_request(&request)).unwrap();
        let err = pending.wait_timeout(Duration::from_secs(5)).unwrap().unwrap_err();
        assert_eq!(Response::error(err), blocking(&runtime, &request));
    }

    #[test]
    fn test_async_returns_before_delay() {
        let runtime = runtime();
        let start = Instant::now();
        let pending = runtime
            .call_async(&codec::encode_request(
                &Request::new("Hello, Rust!").with_response_delay(300),
            ))
            .unwrap();
        assert!(start.elapsed() < Duration::from_millis(100));
        assert!(!pending.is_ready());

        pending.wait_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_async_undecodable_request_fails_initiation() {
        let runtime = runtime();
        assert!(matches!(
            runtime.call_async(&[0x0A, 0x05, 0x41]),
            Err(InitiationError::InvalidRequest(_))
        ));
        assert_eq!(runtime.in_flight(), 0);
    }

    #[test]
    fn test_in_flight_limit() {
        let config = RuntimeConfig {
            max_in_flight: 1,
            ..Default::default()
        };
        let runtime = NativeRuntime::new(&config).unwrap();
        let slow = codec::encode_request(&Request::new("Hello, Rust!").with_response_delay(200));

        let first = runtime.call_async(&slow).unwrap();
        assert!(matches!(
            runtime.call_async(&slow),
            Err(InitiationError::TooManyInFlight { limit: 1 })
        ));

        first.wait_timeout(Duration::from_secs(5)).unwrap().unwrap();
        // The guard is released after completion; give the task a moment to end.
        let deadline = Instant::now() + Duration::from_secs(5);
        while runtime.in_flight() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(runtime.call_async(&slow).is_ok());
    }

    #[test]
    fn test_shutdown_refuses_new_calls() {
        let runtime = runtime();
        runtime.shutdown();
        runtime.shutdown();
        assert!(runtime.is_closed());
        assert!(matches!(
            runtime.call_async(&codec::encode_request(&Request::new("Hello, Rust!"))),
            Err(InitiationError::RuntimeClosed)
        ));
    }

    #[test]
    fn test_shutdown_resolves_in_flight_calls() {
        let runtime = runtime();
        let pending = runtime
            .call_async(&codec::encode_request(
                &Request::new("Hello, Rust!").with_response_delay(60_000),
            ))
            .unwrap();
        drop(runtime);

        let outcome = pending.wait_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome, Err(RELEASED_MESSAGE.to_string()));
    }

    #[test]
    fn test_inline_callback_is_relayed() {
        let runtime = runtime_with(CallbackMode::Inline);
        let (forwarder, seen) = Forwarder::new(Response::success("Hello from the callback"));
        runtime.set_callback(forwarder);
        assert!(runtime.has_callback());

        assert_eq!(
            blocking(&runtime, &Request::new("Hello, Rust!")),
            Response::success("Hello from the callback")
        );
        assert_eq!(seen.try_recv().unwrap(), "Hello, native!");
        assert!(seen.try_recv().is_err());
    }

    #[test]
    fn test_inline_callback_on_async_path() {
        let runtime = runtime_with(CallbackMode::Inline);
        let (forwarder, seen) = Forwarder::new(Response::error("handler refused"));
        runtime.set_callback(forwarder);

        let pending = runtime
            .call_async(&codec::encode_request(&Request::new("Hello, Rust!")))
            .unwrap();
        assert_eq!(
            pending.wait_timeout(Duration::from_secs(5)).unwrap(),
            Err("handler refused".to_string())
        );
        assert_eq!(seen.recv_timeout(Duration::from_secs(1)).unwrap(), "Hello, native!");
    }

    #[test]
    fn test_inline_without_callback() {
        let runtime = runtime_with(CallbackMode::Inline);
        assert_eq!(
            blocking(&runtime, &Request::new("Hello, Rust!")),
            Response::error("No callback registered")
        );
    }

    #[test]
    fn test_inline_skips_rejected_requests() {
        let runtime = runtime_with(CallbackMode::Inline);
        let (forwarder, seen) = Forwarder::new(Response::success("unused"));
        runtime.set_callback(forwarder);

        assert_eq!(
            blocking(&runtime, &Request::new("nope")),
            Response::error("Unable to respond to 'nope'")
        );
        assert!(seen.try_recv().is_err());
    }

    #[test]
    fn test_cleared_callback_is_not_called() {
        let runtime = runtime_with(CallbackMode::Inline);
        let (forwarder, seen) = Forwarder::new(Response::success("unused"));
        runtime.set_callback(forwarder);
        runtime.clear_callback();

        assert_eq!(
            blocking(&runtime, &Request::new("Hello, Rust!")),
            Response::error("No callback registered")
        );
        assert!(seen.try_recv().is_err());
    }

    /// Inspects the runtime's registration from its own drop.
    struct Reentrant {
        runtime: std::sync::Weak<NativeRuntime>,
        dropped: Mutex<mpsc::Sender<bool>>,
    }

    impl CallbackChannel for Reentrant {
        fn deliver(&self, _request: &[u8]) -> Result<Vec<u8>, CallbackError> {
            Err(CallbackError::NotRegistered)
        }
    }

    impl Drop for Reentrant {
        fn drop(&mut self) {
            if let Some(runtime) = self.runtime.upgrade() {
                let _ = self.dropped.lock().send(runtime.has_callback());
            }
        }
    }

    #[test]
    fn test_replaced_callback_dropped_outside_lock() {
        let runtime = Arc::new(runtime());
        let (tx, rx) = mpsc::channel();
        let register = |tx: mpsc::Sender<bool>| {
            runtime.set_callback(Arc::new(Reentrant {
                runtime: Arc::downgrade(&runtime),
                dropped: Mutex::new(tx),
            }))
        };

        register(tx.clone());
        register(tx);
        assert!(rx.recv_timeout(Duration::from_secs(1)).unwrap());

        runtime.clear_callback();
        assert!(!rx.recv_timeout(Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn test_deferred_reply() {
        let runtime = runtime_with(CallbackMode::Deferred);
        let (forwarder, seen) = Forwarder::new(Response::success("thanks"));
        runtime.set_callback(forwarder);

        let start = Instant::now();
        let response = blocking(&runtime, &Request::new("Hello, Rust!").with_response_delay(100));
        assert_eq!(response, Response::success("Will reply later!"));
        assert!(start.elapsed() < Duration::from_millis(100));

        assert_eq!(seen.recv_timeout(Duration::from_secs(5)).unwrap(), "Hello, Java!");
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_deferred_mode_without_delay_answers_directly() {
        let runtime = runtime_with(CallbackMode::Deferred);
        let (forwarder, seen) = Forwarder::new(Response::success("thanks"));
        runtime.set_callback(forwarder);

        assert_eq!(
            blocking(&runtime, &Request::new("Hello, Rust!")),
            Response::success("Hello, Java!")
        );
        assert!(seen.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
