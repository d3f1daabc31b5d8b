//! Application state shared by every handler

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ApiError;
use tonal_core::{AnalysisEngine, ServerConfig};

/// Shared application state with backpressure
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AnalysisEngine>,
    /// Bounds concurrent inference
    pub request_semaphore: Arc<Semaphore>,
    pub request_timeout_secs: u64,
}

impl AppState {
    pub fn new(engine: AnalysisEngine, server: &ServerConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            request_semaphore: Arc::new(Semaphore::new(server.max_concurrent_requests.max(1))),
            request_timeout_secs: server.request_timeout_secs,
        }
    }

    /// Acquire a permit for concurrent request processing
    pub async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit, ApiError> {
        self.request_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ApiError::internal("Server is shutting down"))
    }

    /// Run inference under the concurrency limit and the request timeout.
    ///
    /// `work` receives the permit and must keep it until the model is done,
    /// so a timed-out request still counts against the limit.
    pub async fn run_inference<W, F, T>(&self, work: W) -> Result<T, ApiError>
    where
        W: FnOnce(OwnedSemaphorePermit) -> F,
        F: Future<Output = tonal_core::Result<T>>,
    {
        let permit = self.acquire_permit().await?;
        let timeout = Duration::from_secs(self.request_timeout_secs);

        tokio::time::timeout(timeout, work(permit))
            .await
            .map_err(|_| ApiError::internal("Request timed out"))?
            .map_err(ApiError::from)
    }
}
