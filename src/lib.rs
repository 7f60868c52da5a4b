pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::{ComfyClient, LocalStorage};
pub use crate::config::{CliConfig, Settings};
pub use crate::core::engine::GenerationEngine;
pub use crate::core::pipeline::GeneratePipeline;
pub use crate::core::worker::{spawn_generation, WorkerEvent, WorkerHandle};
pub use crate::domain::model::{CharacterParams, GenParams, ImageRef, WorkflowGraph};
pub use crate::utils::error::{CourierError, Result};
