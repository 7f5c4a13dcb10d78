//! Deterministic judgment client for tests.

use crate::client::JudgmentClient;
use crate::types::JudgmentRequest;
use async_trait::async_trait;
use freightguard_core::{Judgment, JudgmentError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Queue-backed mock: each `assess` call pops the next scripted response.
/// An empty queue yields an error, which exercises the fallback path.
pub struct MockJudgmentClient {
    responses: Mutex<VecDeque<Result<Judgment, JudgmentError>>>,
    calls: AtomicUsize,
}

impl MockJudgmentClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A client scripted with a single successful judgment.
    pub fn with_judgment(judgment: Judgment) -> Self {
        let client = Self::new();
        client.push_judgment(judgment);
        client
    }

    /// A client scripted with a single error.
    pub fn with_error(error: JudgmentError) -> Self {
        let client = Self::new();
        client.push_error(error);
        client
    }

    pub fn push_judgment(&self, judgment: Judgment) {
        self.responses
            .lock()
            .expect("mock responses poisoned")
            .push_back(Ok(judgment));
    }

    pub fn push_error(&self, error: JudgmentError) {
        self.responses
            .lock()
            .expect("mock responses poisoned")
            .push_back(Err(error));
    }

    /// Number of `assess` calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockJudgmentClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JudgmentClient for MockJudgmentClient {
    async fn assess(&self, _request: &JudgmentRequest) -> Result<Judgment, JudgmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .expect("mock responses poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(JudgmentError::Other {
                    message: "mock judgment queue exhausted".to_string(),
                })
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
