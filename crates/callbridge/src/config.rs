// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native runtime configuration.
//!
//! Supports both programmatic and TOML configuration:
//!
//! ```toml
//! worker_threads = 4
//! max_in_flight = 256
//!
//! [responder]
//! accepted_message = "Hello, Rust!"
//! reply_message = "Hello, Java!"
//!
//! [callback]
//! mode = "inline"
//! message = "Hello, native!"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration of one native runtime instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Worker threads executing asynchronous calls.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Name given to worker threads.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Asynchronous calls allowed in flight before submission is refused.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default)]
    pub responder: ResponderConfig,

    #[serde(default)]
    pub callback: CallbackConfig,
}

fn default_worker_threads() -> usize {
    2
}

fn default_thread_name() -> String {
    "callbridge-worker".to_string()
}

fn default_max_in_flight() -> usize {
    1024
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            thread_name: default_thread_name(),
            max_in_flight: default_max_in_flight(),
            responder: ResponderConfig::default(),
            callback: CallbackConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML, the form accepted by `callbridge_init_with_config`.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Enable callbacks in the given mode.
    #[must_use]
    pub fn with_callback_mode(mut self, mode: CallbackMode) -> Self {
        self.callback.mode = mode;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid(
                "worker_threads must be at least 1".into(),
            ));
        }
        if self.thread_name.is_empty() {
            return Err(ConfigError::Invalid("thread_name must not be empty".into()));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "max_in_flight must be at least 1".into(),
            ));
        }
        if self.responder.accepted_message.is_empty() {
            return Err(ConfigError::Invalid(
                "responder.accepted_message must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Behaviour of the native request handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// The only greeting the native side answers successfully.
    #[serde(default = "default_accepted_message")]
    pub accepted_message: String,

    /// Success message returned for the accepted greeting.
    #[serde(default = "default_reply_message")]
    pub reply_message: String,

    /// Immediate reply of a blocking call whose answer is delivered later
    /// through a deferred callback.
    #[serde(default = "default_deferred_reply")]
    pub deferred_reply: String,
}

fn default_accepted_message() -> String {
    "Hello, Rust!".to_string()
}

fn default_reply_message() -> String {
    "Hello, Java!".to_string()
}

fn default_deferred_reply() -> String {
    "Will reply later!".to_string()
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            accepted_message: default_accepted_message(),
            reply_message: default_reply_message(),
            deferred_reply: default_deferred_reply(),
        }
    }
}

/// When the native side calls back into the managed side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackMode {
    /// Never call back.
    #[default]
    Off,
    /// Call back once while servicing an accepted request and relay the answer.
    Inline,
    /// Reply immediately to delayed blocking calls, call back after the delay.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackConfig {
    #[serde(default)]
    pub mode: CallbackMode,

    /// Message sent to the managed side in [`CallbackMode::Inline`].
    #[serde(default = "default_callback_message")]
    pub message: String,
}

fn default_callback_message() -> String {
    "Hello, native!".to_string()
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            mode: CallbackMode::Off,
            message: default_callback_message(),
        }
    }
}
