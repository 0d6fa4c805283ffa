//! Deterministic mock upstream for relay and endpoint tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::time::{Duration, sleep};

use crate::error::RelayError;
use crate::llm::client::{AbortHandle, CompletionRequest, Generation, UpstreamClient};

/// Scripted step for one mock generation.
#[derive(Debug, Clone)]
pub enum MockStepKind {
    /// Emit a text fragment.
    Fragment(String),
    /// End the stream with a terminal error.
    Error(String),
}

/// One step with an optional delay before it fires.
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay_ms: u64,
    pub kind: MockStepKind,
}

impl MockStep {
    pub fn fragment(content: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Fragment(content.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Error(message.into()),
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// Mock upstream driven by a queue of scripts, one per generation.
///
/// Each `start_generation` call consumes the next script and bumps a call
/// counter, so tests can assert that validation failures never reach the
/// upstream at all.
#[derive(Debug, Clone, Default)]
pub struct MockUpstream {
    scripts: Arc<Mutex<VecDeque<Vec<MockStep>>>>,
    calls: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_script(steps: Vec<MockStep>) -> Self {
        let mock = Self::new();
        mock.push_script(steps);
        mock
    }

    /// Queue a script for the next generation.
    pub fn push_script(&self, steps: Vec<MockStep>) {
        self.scripts.lock().push_back(steps);
    }

    /// Number of generations started so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl UpstreamClient for MockUpstream {
    fn provider(&self) -> &str {
        "mock"
    }

    fn start_generation(&self, _request: CompletionRequest) -> Generation {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let steps = self.scripts.lock().pop_front().unwrap_or_default();
        let abort = AbortHandle::new();
        let token = abort.clone();

        let stream = Box::pin(async_stream::stream! {
            for step in steps {
                if step.delay_ms > 0 {
                    tokio::select! {
                        _ = token.aborted() => return,
                        _ = sleep(Duration::from_millis(step.delay_ms)) => {}
                    }
                }
                if token.is_aborted() {
                    return;
                }
                match step.kind {
                    MockStepKind::Fragment(content) => yield Ok(content),
                    MockStepKind::Error(message) => {
                        yield Err(RelayError::Upstream(message));
                        return;
                    }
                }
            }
        });

        Generation { stream, abort }
    }
}
