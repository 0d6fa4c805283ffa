use std::env;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a code generator expert. Provide a brief explanation \
     accompanying the code. You must provide code in markdown code snippets. \
     Use code comments for explanations.";

/// Runtime configuration, environment-driven.
///
/// Everything the relay needs to know about its upstream is opaque
/// configuration: the relay logic itself never inspects these values.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub upstream_url: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8383
}

fn default_upstream_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream_url: default_upstream_url(),
            api_key: String::new(),
            model: default_model(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        let host = env::var("CHATRELAY_HOST").unwrap_or_else(|_| default_host());
        let port = env::var("CHATRELAY_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or_else(default_port);
        let upstream_url =
            env::var("CHATRELAY_UPSTREAM_URL").unwrap_or_else(|_| default_upstream_url());
        let api_key = env::var("CHATRELAY_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .unwrap_or_default();
        let model = env::var("CHATRELAY_MODEL").unwrap_or_else(|_| default_model());
        let system_prompt =
            env::var("CHATRELAY_SYSTEM_PROMPT").unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string());

        Self {
            host,
            port,
            upstream_url,
            api_key,
            model,
            system_prompt,
        }
    }
}
