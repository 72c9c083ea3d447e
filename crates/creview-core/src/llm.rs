//! Model caller trait.
//!
//! A [`ModelCaller`] turns one prompt into one raw text response. It owns
//! transport concerns (endpoints, keys, timeouts); the review orchestrator
//! only sees `Ok(text)` or a [`ReviewError::ModelCall`](crate::ReviewError).
//! HTTP implementations live in the `creview` app crate.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait ModelCaller: Send + Sync {
    /// Short backend name for logs (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Send `prompt` to `model` and return the raw response text.
    async fn call(&self, prompt: &str, model: &str, max_tokens: u32) -> Result<String>;
}
