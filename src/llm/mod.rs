pub mod ollama;
pub mod prompt;
pub mod provider;
pub mod types;

pub use ollama::OllamaClient;
pub use provider::GenerationBackend;
pub use types::{GenerationConfig, GenerationError, GenerationOptions, GenerationRequest};
