use crate::domain::model::{ImageRef, WorkflowGraph};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn server_url(&self) -> &str;
    fn workflow_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn poll_interval(&self) -> Duration;
    fn history_timeout(&self) -> Duration;
    fn request_timeout(&self) -> Duration;
}

/// Image-generation server boundary. The server owns the workflow schema and
/// the output store; this side only queues, polls and downloads.
#[async_trait]
pub trait GenerationServer: Send + Sync {
    /// True when the server answers its stats endpoint.
    async fn ping(&self) -> bool;

    /// Queue a patched graph; returns the server-assigned prompt id.
    async fn queue_prompt(&self, graph: &WorkflowGraph, client_id: &str) -> Result<String>;

    /// Block until the prompt shows up in history, returning its history entry.
    async fn wait_for_completion(&self, prompt_id: &str) -> Result<Value>;

    /// Fetch raw image bytes for a history output reference.
    async fn download_image(&self, image: &ImageRef) -> Result<Vec<u8>>;

    /// Model files installed server-side, for CLI listing.
    async fn list_loras(&self) -> Result<Vec<String>>;
    async fn list_checkpoints(&self) -> Result<Vec<String>>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Load the workflow document.
    async fn extract(&self) -> Result<WorkflowGraph>;
    /// Substitute parameters into the marker-tagged nodes.
    async fn transform(&self, graph: WorkflowGraph) -> Result<WorkflowGraph>;
    /// Queue the graph and wait for its history entry.
    async fn generate(&self, graph: WorkflowGraph) -> Result<Value>;
    /// Download the produced image and persist it; returns the saved path.
    async fn load(&self, history: Value) -> Result<String>;
}
