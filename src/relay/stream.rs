//! Core forwarding loop between the upstream client and the caller

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Bytes;
use futures::{Stream, StreamExt};
use uuid::Uuid;

use crate::error::Result;
use crate::llm::{AbortHandle, CompletionRequest, Generation, UpstreamClient};
use crate::models::{ChatMessage, GenerateRequest};
use crate::relay::CancellationRegistry;

/// Byte stream handed to the transport layer.
///
/// The error type is `Infallible`: once streaming begins, every failure
/// mode is absorbed into a graceful close.
pub type OutputStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, Infallible>> + Send>>;

/// An accepted generation: its handle plus the stream of output bytes.
pub struct StartedGeneration {
    pub id: Uuid,
    pub stream: OutputStream,
}

/// Removes the registry entry when the forwarding stream is dropped, on any
/// terminal path including a downstream disconnect, and aborts the upstream
/// so a vanished caller does not leak a running generation.
struct RegistryGuard {
    registry: Arc<CancellationRegistry>,
    id: Uuid,
    abort: AbortHandle,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
        self.abort.abort();
    }
}

/// Relays one upstream generation to one caller, fragment by fragment.
pub struct StreamRelay {
    upstream: Arc<dyn UpstreamClient>,
    registry: Arc<CancellationRegistry>,
    system_prompt: String,
}

impl StreamRelay {
    pub fn new(
        upstream: Arc<dyn UpstreamClient>,
        registry: Arc<CancellationRegistry>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            upstream,
            registry,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn registry(&self) -> &Arc<CancellationRegistry> {
        &self.registry
    }

    /// Start a generation and return its output stream.
    ///
    /// The first fragment is awaited here: an upstream that fails before
    /// producing any output surfaces as an `Err` so the transport can still
    /// send a real error status. From the first fragment on, upstream
    /// failures only ever shorten the stream; the partial text already sent
    /// stands as the final answer.
    pub async fn handle(&self, request: GenerateRequest) -> Result<StartedGeneration> {
        request.validate()?;

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage::system(&self.system_prompt));
        messages.extend(request.messages);

        let Generation { mut stream, abort } = self
            .upstream
            .start_generation(CompletionRequest::new(messages));

        let id = Uuid::new_v4();
        self.registry.register(id, abort.clone());
        let guard = RegistryGuard {
            registry: self.registry.clone(),
            id,
            abort,
        };
        tracing::debug!(
            generation_id = %id,
            provider = self.upstream.provider(),
            "Generation started"
        );

        let first = match stream.next().await {
            Some(Ok(fragment)) => Some(fragment),
            Some(Err(e)) => {
                tracing::warn!(generation_id = %id, error = %e, "Upstream failed before any output");
                return Err(e);
            }
            None => None,
        };

        let output = Box::pin(async_stream::stream! {
            let guard = guard;
            let mut forwarded = 0usize;

            if let Some(fragment) = first {
                forwarded += 1;
                yield Ok::<_, Infallible>(Bytes::from(fragment));

                // One fragment in flight at a time: the next upstream pull
                // happens only after the previous yield is consumed.
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(fragment) => {
                            forwarded += 1;
                            yield Ok(Bytes::from(fragment));
                        }
                        Err(e) => {
                            // Partial output already stands on the caller's
                            // side; the interruption is visible only to
                            // operators.
                            tracing::warn!(
                                generation_id = %guard.id,
                                error = %e,
                                fragments = forwarded,
                                "Upstream interrupted mid-stream, closing partial response"
                            );
                            break;
                        }
                    }
                }
            }

            if guard.abort.is_aborted() {
                tracing::info!(
                    generation_id = %guard.id,
                    fragments = forwarded,
                    "Generation cancelled"
                );
            } else {
                tracing::debug!(
                    generation_id = %guard.id,
                    fragments = forwarded,
                    "Generation completed"
                );
            }
        });

        Ok(StartedGeneration { id, stream: output })
    }
}
