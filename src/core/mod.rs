pub mod engine;
pub mod patcher;
pub mod pipeline;
pub mod prompt;
pub mod worker;

pub use crate::domain::model::{CharacterParams, GenParams, ImageRef, WorkflowGraph};
pub use crate::domain::ports::{ConfigProvider, GenerationServer, Pipeline, Storage};
pub use crate::utils::error::Result;
