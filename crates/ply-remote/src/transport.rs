use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{RemoteError, RemoteResult};
use crate::service::ChunkService;

/// Carries one encoded request frame to a chunk service and returns the
/// encoded reply frame.
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    async fn call(&self, frame: Vec<u8>) -> RemoteResult<Vec<u8>>;
}

/// In-process transport straight into a [`ChunkService`].
#[derive(Clone)]
pub struct LoopbackTransport {
    service: Arc<ChunkService>,
}

impl LoopbackTransport {
    pub fn new(service: Arc<ChunkService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ChunkTransport for LoopbackTransport {
    async fn call(&self, frame: Vec<u8>) -> RemoteResult<Vec<u8>> {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || service.handle_frame(&frame))
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?
    }
}
