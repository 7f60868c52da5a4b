// Adapters layer: concrete implementations for external systems.

pub mod comfy;
pub mod storage;

pub use comfy::ComfyClient;
pub use storage::LocalStorage;
