use crate::domain::model::{ImageRef, WorkflowGraph};
use crate::domain::ports::GenerationServer;
use crate::utils::error::{CourierError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};

const PING_TIMEOUT: Duration = Duration::from_millis(2500);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Extra wait granted once when the server still shows queue activity at the
/// normal deadline.
const QUEUE_ACTIVE_EXTENSION: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct PromptResponse {
    prompt_id: String,
}

/// HTTP client for a locally running ComfyUI instance.
pub struct ComfyClient {
    base_url: String,
    client: reqwest::Client,
    poll_interval: Duration,
    history_timeout: Duration,
    request_timeout: Duration,
}

impl ComfyClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            poll_interval: Duration::from_millis(500),
            history_timeout: Duration::from_secs(180),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timing(mut self, poll_interval: Duration, history_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.history_timeout = history_timeout;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    async fn get_queue(&self) -> Result<Value> {
        let response = self
            .client
            .get(format!("{}/queue", self.base_url))
            .timeout(self.request_timeout)
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// True when the server reports running or pending queue entries.
    async fn queue_active(&self) -> bool {
        let queue = match self.get_queue().await {
            Ok(queue) => queue,
            Err(e) => {
                tracing::warn!("Queue check failed: {}", e);
                return false;
            }
        };

        let count = |key: &str| {
            queue
                .get(key)
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0)
        };
        let running = count("queue_running");
        let pending = count("queue_pending");
        tracing::debug!("Queue check: running={}, pending={}", running, pending);
        running > 0 || pending > 0
    }

    async fn object_info_choices(&self, class_type: &str, field: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/object_info/{}", self.base_url, class_type))
            .timeout(Duration::from_secs(5))
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(Vec::new());
        }

        let data: Value = response.json().await?;
        // Shape: {class: {input: {required: {field: [[choices...], ...]}}}}
        let choices = data
            .get(class_type)
            .and_then(|v| v.get("input"))
            .and_then(|v| v.get("required"))
            .and_then(|v| v.get(field))
            .and_then(Value::as_array)
            .and_then(|field_spec| field_spec.first())
            .and_then(Value::as_array);

        let mut names: Vec<String> = choices
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl GenerationServer for ComfyClient {
    async fn ping(&self) -> bool {
        let result = self
            .client
            .get(format!("{}/system_stats", self.base_url))
            .timeout(PING_TIMEOUT)
            .send()
            .await;
        matches!(result, Ok(response) if response.status().is_success())
    }

    async fn queue_prompt(&self, graph: &WorkflowGraph, client_id: &str) -> Result<String> {
        tracing::debug!("Queueing prompt to {}/prompt", self.base_url);
        let response = self
            .client
            .post(format!("{}/prompt", self.base_url))
            .timeout(self.request_timeout)
            .json(&serde_json::json!({
                "prompt": graph,
                "client_id": client_id,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CourierError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        let result: PromptResponse = response.json().await?;
        Ok(result.prompt_id)
    }

    async fn wait_for_completion(&self, prompt_id: &str) -> Result<Value> {
        let start = Instant::now();
        let mut deadline = self.history_timeout;
        let mut extended = false;
        let mut polls: u32 = 0;

        tracing::debug!("Waiting for history: {}", prompt_id);

        while start.elapsed() < deadline {
            polls += 1;

            let poll = self
                .client
                .get(format!("{}/history/{}", self.base_url, prompt_id))
                .timeout(Duration::from_secs(10))
                .send()
                .await;

            match poll {
                Ok(response) if response.status().is_success() => {
                    let data: Value = response.json().await?;
                    if let Some(entry) = data.get(prompt_id) {
                        tracing::debug!("History received after {} polls", polls);
                        return Ok(entry.clone());
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Poll {} failed: {}", polls, e),
            }

            if polls % 10 == 0 {
                tracing::info!(
                    "Still waiting... ({:.1}s elapsed, {} polls)",
                    start.elapsed().as_secs_f64(),
                    polls
                );
            }

            tokio::time::sleep(self.poll_interval).await;

            // At the normal deadline, grant one extension while the server
            // still shows queue activity.
            if start.elapsed() >= self.history_timeout && !extended {
                extended = true;
                if self.queue_active().await {
                    deadline += QUEUE_ACTIVE_EXTENSION;
                    tracing::info!(
                        "Queue still active, extending wait by {}s",
                        QUEUE_ACTIVE_EXTENSION.as_secs()
                    );
                } else {
                    tracing::warn!("No active queue items, giving up");
                    break;
                }
            }
        }

        Err(CourierError::TimeoutError {
            waited_secs: start.elapsed().as_secs_f64(),
            polls,
        })
    }

    async fn download_image(&self, image: &ImageRef) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(format!("{}/view", self.base_url))
            .timeout(self.request_timeout)
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.kind.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CourierError::ServerError {
                status: status.as_u16(),
                message: format!("failed to download {}", image.filename),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn list_loras(&self) -> Result<Vec<String>> {
        self.object_info_choices("LoraLoader", "lora_name").await
    }

    async fn list_checkpoints(&self) -> Result<Vec<String>> {
        self.object_info_choices("CheckpointLoaderSimple", "ckpt_name")
            .await
    }
}
