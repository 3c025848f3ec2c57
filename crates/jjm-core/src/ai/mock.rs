//! Mock backend for testing
//!
//! Replies are scripted in order; once the script runs out every call gets
//! the default reply. Each call's prompts are recorded for assertions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::AIBackend;

/// Reply used when nothing is scripted
pub const MOCK_DEFAULT_REPLY: &str = "Ini jawaban dari JJ (mock).";

/// A recorded `complete` call
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub system: String,
    pub user: String,
}

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    /// When set, every call fails with this message
    fail_with: Option<String>,
    script: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Healthy mock that always answers with `MOCK_DEFAULT_REPLY`
    pub fn new() -> Self {
        Self {
            healthy: true,
            fail_with: None,
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Queue successful replies, consumed one per call
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        for reply in replies {
            mock.push_reply(reply);
        }
        mock
    }

    /// A mock whose every call fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            healthy: false,
            fail_with: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(reply.into()));
        }
    }

    pub fn push_failure(&self, message: &str) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(message.to_string()));
        }
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockCall {
                system: system.to_string(),
                user: user.to_string(),
            });
        }

        if let Some(ref message) = self.fail_with {
            return Err(Error::Backend(message.clone()));
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(Error::Backend(message)),
            None => Ok(MOCK_DEFAULT_REPLY.to_string()),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
