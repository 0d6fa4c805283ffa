//! Upstream client trait and streaming types

use std::pin::Pin;

use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::ChatMessage;

/// Lazy, single-pass sequence of generated text fragments.
///
/// A terminal `Err` item ends the sequence; the stream must not be polled
/// again after yielding one.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Capability to abort one in-flight generation.
///
/// Calling [`abort`](AbortHandle::abort) any number of times is safe, as is
/// calling it after the fragment stream has already finished. An aborted
/// stream ends as a normal completion, not an error.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    token: CancellationToken,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Suspend until the handle is aborted.
    pub async fn aborted(&self) {
        self.token.cancelled().await;
    }
}

/// One in-flight generation: the fragments plus the means to stop them.
pub struct Generation {
    pub stream: FragmentStream,
    pub abort: AbortHandle,
}

/// Upstream completion request with the system instruction already in place.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }
}

/// A streaming completion backend.
///
/// Failure to reach the upstream, a non-success status, and a mid-stream
/// transport error all surface as a terminal `Err` on the fragment stream,
/// never as a panic from `start_generation` itself.
pub trait UpstreamClient: Send + Sync {
    /// Provider name for logging
    fn provider(&self) -> &str;

    /// Open a streaming completion and return the fragments plus an abort
    /// capability. The request is not sent until the stream is first polled.
    fn start_generation(&self, request: CompletionRequest) -> Generation;
}
