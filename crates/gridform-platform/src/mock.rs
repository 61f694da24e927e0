//! Scripted in-memory Platform
//!
//! Replies are scripted per endpoint: one-shot replies are consumed in order
//! before the persistent reply for that endpoint is used. Every call is
//! recorded so tests can assert on the exact call sequence.

use crate::client::PlatformClient;
use crate::error::{PlatformError, Result};
use crate::params::Params;
use async_trait::async_trait;
use reqwest::Method;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// A scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    Body(String),
    NotFound,
    Fail { status: u16, message: String },
}

impl MockReply {
    pub fn body(body: impl Into<String>) -> Self {
        MockReply::Body(body.into())
    }

    pub fn fail(status: u16, message: impl Into<String>) -> Self {
        MockReply::Fail {
            status,
            message: message.into(),
        }
    }
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: Method,
    pub endpoint: String,
    pub params: Params,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }
}

#[derive(Default)]
struct Script {
    once: HashMap<String, VecDeque<MockReply>>,
    always: HashMap<String, MockReply>,
}

#[derive(Default)]
pub struct MockPlatform {
    script: Mutex<Script>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `body` to every call of `endpoint`
    pub fn on(&self, endpoint: &str, body: impl Into<String>) -> &Self {
        self.on_reply(endpoint, MockReply::body(body))
    }

    pub fn on_reply(&self, endpoint: &str, reply: MockReply) -> &Self {
        self.lock_script().always.insert(endpoint.to_string(), reply);
        self
    }

    /// Reply with `reply` to the next call of `endpoint` only
    pub fn once(&self, endpoint: &str, reply: MockReply) -> &Self {
        self.lock_script()
            .once
            .entry(endpoint.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock_calls().clone()
    }

    /// Endpoints called, in order
    pub fn endpoints(&self) -> Vec<String> {
        self.lock_calls().iter().map(|c| c.endpoint.clone()).collect()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<RecordedCall> {
        self.lock_calls()
            .iter()
            .filter(|c| c.endpoint == endpoint)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock_calls().clear();
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<RecordedCall>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_reply(&self, endpoint: &str) -> Option<MockReply> {
        let mut script = self.lock_script();
        if let Some(reply) = script.once.get_mut(endpoint).and_then(|q| q.pop_front()) {
            return Some(reply);
        }
        script.always.get(endpoint).cloned()
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn call(&self, method: Method, endpoint: &str, params: &Params) -> Result<String> {
        self.lock_calls().push(RecordedCall {
            method,
            endpoint: endpoint.to_string(),
            params: params.clone(),
        });

        match self.next_reply(endpoint) {
            Some(MockReply::Body(body)) => Ok(body),
            Some(MockReply::NotFound) => Err(PlatformError::NotFound {
                endpoint: endpoint.to_string(),
                message: "mock: not found".to_string(),
            }),
            Some(MockReply::Fail { status, message }) => {
                Err(PlatformError::from_status(endpoint, status, &message))
            }
            None => Err(PlatformError::Status {
                endpoint: endpoint.to_string(),
                status: 500,
                message: format!("mock: no reply scripted for {}", endpoint),
            }),
        }
    }
}
