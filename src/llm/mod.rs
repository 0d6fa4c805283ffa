pub mod client;
pub mod mock_client;
pub mod openai;

pub use client::{AbortHandle, CompletionRequest, FragmentStream, Generation, UpstreamClient};
pub use openai::OpenAiClient;
