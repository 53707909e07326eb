// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native request logic.

use crate::config::ResponderConfig;
use crate::message::{Request, Response};

/// Greeting responder: answers the configured greeting, rejects anything else.
///
/// Stateless and deterministic, so it can be cloned into worker tasks.
#[derive(Debug, Clone, Default)]
pub struct Responder {
    config: ResponderConfig,
}

impl Responder {
    pub fn new(config: ResponderConfig) -> Self {
        Self { config }
    }

    pub fn accepts(&self, request: &Request) -> bool {
        request.message() == self.config.accepted_message
    }

    /// Answer `request` without delay.
    pub fn respond(&self, request: &Request) -> Response {
        if self.accepts(request) {
            Response::success(self.config.reply_message.clone())
        } else {
            Response::error(format!("Unable to respond to '{}'", request.message()))
        }
    }

    /// Immediate reply for a call whose answer is delivered by a deferred callback.
    pub fn deferred_reply(&self) -> Response {
        Response::success(self.config.deferred_reply.clone())
    }

    /// Message carried by the deferred callback.
    pub fn reply_message(&self) -> &str {
        &self.config.reply_message
    }
}
