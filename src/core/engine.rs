use crate::core::Pipeline;
use crate::utils::error::Result;

pub struct GenerationEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> GenerationEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting generation run...");

        tracing::info!("Loading workflow...");
        let graph = self.pipeline.extract().await?;
        tracing::info!("Workflow loaded ({} nodes)", graph.0.len());

        tracing::info!("Patching workflow...");
        let patched = self.pipeline.transform(graph).await?;

        tracing::info!("Generating...");
        let history = self.pipeline.generate(patched).await?;

        tracing::info!("Saving image...");
        let output_path = self.pipeline.load(history).await?;
        tracing::info!("Image saved to: {}", output_path);

        Ok(output_path)
    }
}
