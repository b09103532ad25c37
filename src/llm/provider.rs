use async_trait::async_trait;

use super::types::{GenerationError, GenerationRequest};

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// model identifier surfaced by the status endpoint
    fn model_name(&self) -> &str;

    /// cheap reachability probe; an unreachable backend is `false`, never an
    /// error
    async fn check_health(&self) -> bool;

    /// run one chat completion; transport problems come back as typed
    /// `GenerationError`s. Callers that drop the returned future abort the
    /// underlying request.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}
