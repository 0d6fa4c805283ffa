//! Wire types shared by the API layer and the upstream client

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Chat message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of a chat transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Inbound body of the generate endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub messages: Vec<ChatMessage>,
}

impl GenerateRequest {
    /// Check the transcript is something we are willing to relay upstream.
    ///
    /// The system instruction is always injected by the relay, so a caller
    /// supplying its own system turn is rejected rather than silently
    /// overridden.
    pub fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(RelayError::InvalidRequest(
                "messages must not be empty".to_string(),
            ));
        }

        for (i, message) in self.messages.iter().enumerate() {
            if message.role == ChatRole::System {
                return Err(RelayError::InvalidRequest(format!(
                    "message {} has role 'system'; the system instruction is fixed server-side",
                    i
                )));
            }
            if message.content.trim().is_empty() {
                return Err(RelayError::InvalidRequest(format!(
                    "message {} has empty content",
                    i
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_transcript() {
        let request = GenerateRequest { messages: vec![] };
        assert!(request.validate().is_err());
    }

    #[test]
    fn rejects_blank_content() {
        let request = GenerateRequest {
            messages: vec![ChatMessage::user("   ")],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn rejects_caller_supplied_system_turn() {
        let request = GenerateRequest {
            messages: vec![
                ChatMessage::system("you are a pirate"),
                ChatMessage::user("hello"),
            ],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn accepts_user_assistant_turns() {
        let request = GenerateRequest {
            messages: vec![
                ChatMessage::user("write a hello world"),
                ChatMessage::assistant("```python\nprint('hi')\n```"),
                ChatMessage::user("now in rust"),
            ],
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
