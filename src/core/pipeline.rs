use crate::core::patcher::patch_workflow;
use crate::core::{ConfigProvider, GenerationServer, Pipeline, Storage};
use crate::domain::model::{CharacterParams, GenParams, ImageRef, WorkflowGraph};
use crate::utils::error::{CourierError, Result};
use serde_json::Value;

/// One generation run: read the workflow document, substitute parameters,
/// queue it on the server and persist the produced image.
///
/// Two storage roots: the workflow file resolves against the working
/// directory, images land under the configured output directory.
pub struct GeneratePipeline<S: Storage, C: ConfigProvider, G: GenerationServer> {
    workflows: S,
    outputs: S,
    config: C,
    server: G,
    character: CharacterParams,
    append_text: String,
    params: GenParams,
}

impl<S: Storage, C: ConfigProvider, G: GenerationServer> GeneratePipeline<S, C, G> {
    pub fn new(
        workflows: S,
        outputs: S,
        config: C,
        server: G,
        character: CharacterParams,
        append_text: String,
        params: GenParams,
    ) -> Self {
        Self {
            workflows,
            outputs,
            config,
            server,
            character,
            append_text,
            params,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider, G: GenerationServer> Pipeline for GeneratePipeline<S, C, G> {
    async fn extract(&self) -> Result<WorkflowGraph> {
        let path = self.config.workflow_path();
        tracing::debug!("Reading workflow document: {}", path);

        let raw = self.workflows.read_file(path).await?;
        let value: Value = serde_json::from_slice(&raw)?;

        WorkflowGraph::from_value(value).ok_or_else(|| CourierError::WorkflowError {
            message: format!("Workflow document '{}' is not a JSON object", path),
        })
    }

    async fn transform(&self, graph: WorkflowGraph) -> Result<WorkflowGraph> {
        patch_workflow(&graph, &self.character, &self.append_text, &self.params)
    }

    async fn generate(&self, graph: WorkflowGraph) -> Result<Value> {
        let client_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("Queueing prompt (client_id={})", client_id);
        let prompt_id = self.server.queue_prompt(&graph, &client_id).await?;
        tracing::info!("Prompt queued: {}", prompt_id);

        self.server.wait_for_completion(&prompt_id).await
    }

    async fn load(&self, history: Value) -> Result<String> {
        let image_ref = extract_first_image(&history)?;
        tracing::debug!("Downloading image: {:?}", image_ref);
        let bytes = self.server.download_image(&image_ref).await?;

        let filename = timestamped_filename(&image_ref.filename);
        self.outputs.write_file(&filename, &bytes).await?;

        Ok(format!("{}/{}", self.config.output_path(), filename))
    }
}

/// First image reference found in a history entry's node outputs.
pub fn extract_first_image(history_entry: &Value) -> Result<ImageRef> {
    let outputs = history_entry
        .get("outputs")
        .and_then(Value::as_object)
        .ok_or(CourierError::NoImagesError)?;

    for node_output in outputs.values() {
        if let Some(images) = node_output.get("images").and_then(Value::as_array) {
            if let Some(first) = images.first() {
                return Ok(serde_json::from_value(first.clone())?);
            }
        }
    }

    Err(CourierError::NoImagesError)
}

fn timestamped_filename(server_filename: &str) -> String {
    let ext = std::path::Path::new(server_filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png");
    format!("courier_{}.{}", chrono::Local::now().format("%Y%m%d_%H%M%S"), ext)
}
