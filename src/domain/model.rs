use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ComfyUI API-format prompt graph: an object keyed by string node id.
///
/// Node ids are unstable across workflow edits, so nothing in this crate
/// addresses nodes by id. Lookup goes through `_meta.title` markers instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph(pub serde_json::Map<String, Value>);

impl WorkflowGraph {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Node id of the first node whose `_meta.title` equals `title`.
    pub fn node_id_by_title(&self, title: &str) -> Option<&str> {
        self.0.iter().find_map(|(id, node)| {
            let meta_title = node.get("_meta")?.get("title")?.as_str()?;
            (meta_title == title).then_some(id.as_str())
        })
    }

    pub fn node(&self, id: &str) -> Option<&Value> {
        self.0.get(id)
    }

    pub fn class_type(&self, id: &str) -> Option<&str> {
        self.0.get(id)?.get("class_type")?.as_str()
    }

    /// Mutable view of a node's `inputs` object, creating it when absent.
    pub fn inputs_mut(&mut self, id: &str) -> Option<&mut serde_json::Map<String, Value>> {
        let node = self.0.get_mut(id)?.as_object_mut()?;
        node.entry("inputs")
            .or_insert_with(|| Value::Object(Default::default()))
            .as_object_mut()
    }
}

/// Generation parameters substituted into the workflow per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenParams {
    /// None = fresh random seed every run.
    pub seed: Option<i64>,
    pub steps: u32,
    pub cfg: f64,
    pub sampler: String,
    pub scheduler: String,
    pub quality_tags: String,
    pub negative: String,
    /// Empty = keep the checkpoint the workflow already names.
    pub checkpoint: String,
}

impl Default for GenParams {
    fn default() -> Self {
        Self {
            seed: None,
            steps: 8,
            cfg: 2.2,
            sampler: "euler_ancestral".to_string(),
            scheduler: "simple".to_string(),
            quality_tags: "masterpiece, best quality, high quality, detailed".to_string(),
            negative: "worst aesthetic, worst quality, low quality, bad quality, lowres, \
                       signature, username, logo, bad hands, mutated hands, ambiguous form, feral"
                .to_string(),
            checkpoint: String::new(),
        }
    }
}

/// Stable visual description of the subject being rendered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterParams {
    /// Base positive prompt for the subject; empty = keep workflow text.
    pub visual_base: String,
    /// Empty = LoRA node disabled (strengths zeroed).
    pub lora_name: String,
    pub lora_strength: f64,
}

/// Pointer into the generation server's output store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(default = "default_image_kind", rename = "type")]
    pub kind: String,
}

fn default_image_kind() -> String {
    "output".to_string()
}
