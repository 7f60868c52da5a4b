pub mod file;

use crate::domain::model::{CharacterParams, GenParams};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::Parser;
use file::FileConfig;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "comfy-courier")]
#[command(about = "Patch a marker-tagged ComfyUI workflow, queue it and fetch the image")]
pub struct CliConfig {
    /// Base URL of the generation server
    #[arg(long)]
    pub server_url: Option<String>,

    /// Path to the API-format workflow JSON
    #[arg(long)]
    pub workflow: Option<String>,

    /// Directory where generated images are written
    #[arg(long)]
    pub output_path: Option<String>,

    /// Scene text appended to the positive prompt
    #[arg(long, default_value = "")]
    pub append: String,

    /// Negative prompt override
    #[arg(long)]
    pub negative: Option<String>,

    /// Fixed seed; omit for a fresh random seed per run
    #[arg(long)]
    pub seed: Option<i64>,

    #[arg(long)]
    pub steps: Option<u32>,

    #[arg(long)]
    pub cfg: Option<f64>,

    #[arg(long)]
    pub sampler: Option<String>,

    #[arg(long)]
    pub scheduler: Option<String>,

    /// Checkpoint override; omit to keep the workflow's own
    #[arg(long)]
    pub checkpoint: Option<String>,

    /// Character base prompt; omit to keep the workflow's positive text
    #[arg(long)]
    pub visual_base: Option<String>,

    #[arg(long)]
    pub quality_tags: Option<String>,

    /// Character LoRA filename; omit to disable the LoRA node
    #[arg(long)]
    pub lora: Option<String>,

    #[arg(long)]
    pub lora_strength: Option<f64>,

    /// TOML settings file; created with defaults when missing
    #[arg(long, default_value = "courier.toml")]
    pub config: String,

    /// Check server reachability and exit
    #[arg(long)]
    pub ping: bool,

    /// List LoRA files installed on the server and exit
    #[arg(long)]
    pub list_loras: bool,

    /// List checkpoints installed on the server and exit
    #[arg(long)]
    pub list_checkpoints: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

/// Fully resolved settings: file config overlaid with CLI flags, with
/// built-in defaults underneath both.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    pub workflow_path: String,
    pub output_path: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub history_timeout: Duration,
    pub append: String,
    pub character: CharacterParams,
    pub params: GenParams,
}

impl Settings {
    pub fn resolve(cli: &CliConfig) -> Result<Self> {
        let file = FileConfig::load_or_init(&cli.config)?;
        file.validate()?;
        Ok(Self::overlay(cli, &file))
    }

    /// CLI flag beats file value beats built-in default, field by field.
    pub fn overlay(cli: &CliConfig, file: &FileConfig) -> Self {
        let server = file.server.clone().unwrap_or_default();
        let workflow = file.workflow.clone().unwrap_or_default();
        let character = file.character.clone().unwrap_or_default();
        let sampler = file.sampler.clone().unwrap_or_default();
        let output = file.output.clone().unwrap_or_default();

        let defaults = GenParams::default();
        let params = GenParams {
            seed: cli.seed.or(sampler.seed),
            steps: cli.steps.or(sampler.steps).unwrap_or(defaults.steps),
            cfg: cli.cfg.or(sampler.cfg).unwrap_or(defaults.cfg),
            sampler: cli
                .sampler
                .clone()
                .or(sampler.sampler)
                .unwrap_or(defaults.sampler),
            scheduler: cli
                .scheduler
                .clone()
                .or(sampler.scheduler)
                .unwrap_or(defaults.scheduler),
            quality_tags: cli
                .quality_tags
                .clone()
                .or(workflow.quality_tags)
                .unwrap_or(defaults.quality_tags),
            negative: cli
                .negative
                .clone()
                .or(workflow.negative)
                .unwrap_or(defaults.negative),
            checkpoint: cli
                .checkpoint
                .clone()
                .or(sampler.checkpoint)
                .unwrap_or_default(),
        };

        let character = CharacterParams {
            visual_base: cli
                .visual_base
                .clone()
                .or(character.visual_base)
                .unwrap_or_default(),
            lora_name: cli.lora.clone().or(character.lora_name).unwrap_or_default(),
            lora_strength: cli
                .lora_strength
                .or(character.lora_strength)
                .unwrap_or(0.0),
        };

        Self {
            server_url: cli
                .server_url
                .clone()
                .or(server.url)
                .unwrap_or_else(|| "http://127.0.0.1:8188".to_string()),
            workflow_path: cli
                .workflow
                .clone()
                .or(workflow.path)
                .unwrap_or_else(|| "workflows/txt2img.api.json".to_string()),
            output_path: cli
                .output_path
                .clone()
                .or(output.path)
                .unwrap_or_else(|| "./output".to_string()),
            request_timeout: Duration::from_secs(server.timeout_seconds.unwrap_or(30)),
            poll_interval: Duration::from_millis(server.poll_interval_ms.unwrap_or(500)),
            history_timeout: Duration::from_secs(server.history_timeout_seconds.unwrap_or(180)),
            append: cli.append.clone(),
            character,
            params,
        }
    }
}

impl ConfigProvider for Settings {
    fn server_url(&self) -> &str {
        &self.server_url
    }

    fn workflow_path(&self) -> &str {
        &self.workflow_path
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn history_timeout(&self) -> Duration {
        self.history_timeout
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_url("server_url", &self.server_url)?;
        validation::validate_path("workflow", &self.workflow_path)?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_range("steps", self.params.steps, 1, 150)?;
        validation::validate_range("cfg", self.params.cfg, 0.0, 30.0)?;
        validation::validate_range("lora_strength", self.character.lora_strength, 0.0, 2.0)?;
        // A positive strength with no file to load would 400 at the server.
        if self.character.lora_strength > 0.0 {
            validation::validate_non_empty_string("lora", &self.character.lora_name)?;
        }
        Ok(())
    }
}
