//! OpenAI-compatible streaming completion client

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::llm::client::{AbortHandle, CompletionRequest, Generation, UpstreamClient};
use crate::models::ChatRole;

/// Client for any `/chat/completions` SSE-streaming endpoint
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom base URL (for API-compatible services)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Pull all content deltas out of one SSE event payload.
fn extract_deltas(event_str: &str, out: &mut Vec<String>) -> bool {
    let mut done = false;
    for line in event_str.lines() {
        if let Some(data) = line.strip_prefix("data: ") {
            if data.trim() == "[DONE]" {
                done = true;
                continue;
            }

            let parsed: StreamResponse = match serde_json::from_str(data) {
                Ok(p) => p,
                Err(_) => continue,
            };

            for choice in parsed.choices {
                if choice.finish_reason.is_some() {
                    continue;
                }
                if let Some(content) = choice.delta.content
                    && !content.is_empty()
                {
                    out.push(content);
                }
            }
        }
    }
    done
}

impl UpstreamClient for OpenAiClient {
    fn provider(&self) -> &str {
        "openai"
    }

    fn start_generation(&self, request: CompletionRequest) -> Generation {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let base_url = self.base_url.clone();
        let model = self.model.clone();
        let abort = AbortHandle::new();
        let token = abort.clone();

        let stream = Box::pin(async_stream::stream! {
            let messages: Vec<WireMessage> = request
                .messages
                .iter()
                .map(|m| {
                    let role = match m.role {
                        ChatRole::System => "system",
                        ChatRole::User => "user",
                        ChatRole::Assistant => "assistant",
                    }
                    .to_string();

                    WireMessage {
                        role,
                        content: m.content.clone(),
                    }
                })
                .collect();

            let body = serde_json::json!({
                "model": model,
                "messages": messages,
                "stream": true,
            });

            let send = client
                .post(format!("{}/chat/completions", base_url))
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send();

            let response = tokio::select! {
                // An abort while still waiting for upstream headers ends the
                // generation with no output at all.
                _ = token.aborted() => return,
                resp = send => match resp {
                    Ok(resp) => resp,
                    Err(e) => {
                        yield Err(RelayError::from(e));
                        return;
                    }
                },
            };

            if !response.status().is_success() {
                let status = response.status();
                let detail = response.text().await.unwrap_or_default();
                yield Err(RelayError::Upstream(format!(
                    "Upstream returned {}: {}",
                    status, detail
                )));
                return;
            }

            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            loop {
                let chunk_result = tokio::select! {
                    // An abort ends the generation as a normal completion.
                    _ = token.aborted() => break,
                    chunk = byte_stream.next() => match chunk {
                        Some(chunk) => chunk,
                        None => break,
                    },
                };

                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(RelayError::from(e));
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // Process complete SSE events from the buffer
                let mut deltas = Vec::new();
                let mut done = false;
                while let Some(pos) = buffer.find("\n\n") {
                    let event_str = buffer[..pos].to_string();
                    buffer = buffer[pos + 2..].to_string();
                    done |= extract_deltas(&event_str, &mut deltas);
                }
                for delta in deltas {
                    yield Ok(delta);
                }
                if done {
                    return;
                }
            }

            // Whatever is left after the stream ends may be a final event
            // without its trailing blank line.
            if !token.is_aborted() && !buffer.trim().is_empty() {
                let mut deltas = Vec::new();
                extract_deltas(&buffer, &mut deltas);
                for delta in deltas {
                    yield Ok(delta);
                }
            }
        });

        Generation { stream, abort }
    }
}
