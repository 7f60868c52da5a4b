use crate::core::Pipeline;
use crate::utils::error::CourierError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Stage the background run is currently in, for progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Patching,
    Generating,
    Saving,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Loading => write!(f, "Loading workflow"),
            Phase::Patching => write!(f, "Patching workflow"),
            Phase::Generating => write!(f, "Waiting for the generation server"),
            Phase::Saving => write!(f, "Downloading image"),
        }
    }
}

/// Progress events emitted by a generation worker. The stream always ends
/// with `Done`, after either `Saved` or `Failed`.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Status(Phase),
    Saved(String),
    Failed(Arc<CourierError>),
    Done,
}

/// Handle to a running generation task. Dropping the handle does not cancel
/// the task; consume `events` until `Done` or await `join`.
pub struct WorkerHandle {
    pub events: mpsc::UnboundedReceiver<WorkerEvent>,
    pub join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Drains the event stream, logging status, and returns the saved path
    /// or the failure.
    pub async fn wait(mut self) -> std::result::Result<String, Arc<CourierError>> {
        let mut outcome = Err(Arc::new(CourierError::WorkflowError {
            message: "worker finished without reporting a result".to_string(),
        }));
        while let Some(event) = self.events.recv().await {
            match event {
                WorkerEvent::Status(phase) => tracing::info!("{}...", phase),
                WorkerEvent::Saved(path) => outcome = Ok(path),
                WorkerEvent::Failed(error) => outcome = Err(error),
                WorkerEvent::Done => break,
            }
        }
        let _ = self.join.await;
        outcome
    }
}

/// Runs the pipeline on a background task so the caller's thread stays free
/// for UI work. All progress flows through the returned event channel; there
/// is no shared state with the caller.
pub fn spawn_generation<P>(pipeline: P) -> WorkerHandle
where
    P: Pipeline + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    let join = tokio::spawn(async move {
        let result = run_stages(&pipeline, &tx).await;
        match result {
            Ok(path) => {
                let _ = tx.send(WorkerEvent::Saved(path));
            }
            Err(e) => {
                tracing::error!("Generation failed: {}", e);
                let _ = tx.send(WorkerEvent::Failed(Arc::new(e)));
            }
        }
        let _ = tx.send(WorkerEvent::Done);
    });

    WorkerHandle { events: rx, join }
}

async fn run_stages<P: Pipeline>(
    pipeline: &P,
    tx: &mpsc::UnboundedSender<WorkerEvent>,
) -> crate::utils::error::Result<String> {
    let _ = tx.send(WorkerEvent::Status(Phase::Loading));
    let graph = pipeline.extract().await?;

    let _ = tx.send(WorkerEvent::Status(Phase::Patching));
    let patched = pipeline.transform(graph).await?;

    let _ = tx.send(WorkerEvent::Status(Phase::Generating));
    let history = pipeline.generate(patched).await?;

    let _ = tx.send(WorkerEvent::Status(Phase::Saving));
    pipeline.load(history).await
}
