pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod relay;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
