use crate::core::prompt::build_positive_prompt;
use crate::domain::model::{CharacterParams, GenParams, WorkflowGraph};
use crate::utils::error::{CourierError, Result};
use rand::Rng;
use serde_json::{json, Value};

/// Marker titles stored in a node's `_meta.title`. Workflows are authored in
/// the server's graph editor; these fixed strings let us find the nodes to
/// rewrite without depending on numeric node ids.
pub const MARKER_PROMPT_POS: &str = "__PROMPT_POS__";
pub const MARKER_PROMPT_NEG: &str = "__PROMPT_NEG__";
pub const MARKER_LORA_CHARACTER: &str = "__LORA_CHARACTER__";
pub const MARKER_CHECKPOINT_BASE: &str = "__CHECKPOINT_BASE__";
pub const MARKER_SAMPLER_MAIN: &str = "__SAMPLER_MAIN__";

const SAMPLER_CLASSES: [&str; 2] = ["KSampler", "KSamplerAdvanced"];

/// Positive/negative prompt node ids, resolved by marker title.
fn detect_prompt_nodes(graph: &WorkflowGraph) -> (Option<String>, Option<String>) {
    let pos = graph.node_id_by_title(MARKER_PROMPT_POS).map(String::from);
    let neg = graph.node_id_by_title(MARKER_PROMPT_NEG).map(String::from);
    tracing::debug!("Detected prompt nodes: pos={:?}, neg={:?}", pos, neg);
    (pos, neg)
}

fn current_text(graph: &WorkflowGraph, id: &str) -> String {
    graph
        .node(id)
        .and_then(|n| n.get("inputs"))
        .and_then(|i| i.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Substitutes character, prompt and sampler parameters into a marker-tagged
/// workflow. The input graph is left untouched; a patched clone is returned.
///
/// `__PROMPT_POS__` is the only mandatory marker. Every other marker degrades
/// gracefully: LoRA and sampler log a warning when absent, the checkpoint and
/// negative patches are skipped silently.
pub fn patch_workflow(
    graph: &WorkflowGraph,
    character: &CharacterParams,
    append_text: &str,
    params: &GenParams,
) -> Result<WorkflowGraph> {
    let mut g = graph.clone();
    let (pos_id, neg_id) = detect_prompt_nodes(&g);

    let pos_id = pos_id.ok_or_else(|| CourierError::WorkflowError {
        message: format!("No {} node found in the workflow", MARKER_PROMPT_POS),
    })?;

    // Positive prompt: quality tags + character base + scene append. The base
    // falls back to whatever text the workflow author left in the node.
    let base = if character.visual_base.trim().is_empty() {
        current_text(&g, &pos_id)
    } else {
        character.visual_base.trim().to_string()
    };
    let final_positive = build_positive_prompt(&params.quality_tags, &base, append_text);
    tracing::debug!("Positive prompt: {}", final_positive);

    if let Some(inputs) = g.inputs_mut(&pos_id) {
        inputs.insert("text".to_string(), json!(final_positive));
    }

    // Negative prompt, only when both the node and the text exist.
    if let Some(neg_id) = neg_id {
        if !params.negative.is_empty() {
            tracing::debug!("Negative prompt: {}", params.negative);
            if let Some(inputs) = g.inputs_mut(&neg_id) {
                inputs.insert("text".to_string(), json!(params.negative));
            }
        }
    }

    patch_character_lora(&mut g, character);
    patch_checkpoint(&mut g, params);
    patch_sampler(&mut g, params);

    Ok(g)
}

fn patch_character_lora(g: &mut WorkflowGraph, character: &CharacterParams) {
    let lora_id = g
        .node_id_by_title(MARKER_LORA_CHARACTER)
        .map(String::from)
        .filter(|id| g.class_type(id) == Some("LoraLoader"));

    let Some(lora_id) = lora_id else {
        tracing::warn!("{} node not found", MARKER_LORA_CHARACTER);
        return;
    };

    let name = character.lora_name.clone();
    let strength = character.lora_strength;
    if let Some(inputs) = g.inputs_mut(&lora_id) {
        if name.is_empty() {
            // Disable by zeroing the strengths; the node stays wired in.
            inputs.insert("strength_model".to_string(), json!(0.0));
            inputs.insert("strength_clip".to_string(), json!(0.0));
            tracing::debug!("Character LoRA: disabled");
        } else {
            inputs.insert("lora_name".to_string(), json!(name));
            inputs.insert("strength_model".to_string(), json!(strength));
            inputs.insert("strength_clip".to_string(), json!(strength));
            tracing::debug!("Character LoRA: {} @ {}", character.lora_name, strength);
        }
    }
}

fn patch_checkpoint(g: &mut WorkflowGraph, params: &GenParams) {
    if params.checkpoint.is_empty() {
        return;
    }

    let ckpt_id = g
        .node_id_by_title(MARKER_CHECKPOINT_BASE)
        .map(String::from)
        .filter(|id| g.class_type(id) == Some("CheckpointLoaderSimple"));

    if let Some(ckpt_id) = ckpt_id {
        let name = params.checkpoint.clone();
        if let Some(inputs) = g.inputs_mut(&ckpt_id) {
            inputs.insert("ckpt_name".to_string(), json!(name));
            tracing::debug!("Checkpoint: {}", params.checkpoint);
        }
    }
}

fn patch_sampler(g: &mut WorkflowGraph, params: &GenParams) {
    let sampler_id = g
        .node_id_by_title(MARKER_SAMPLER_MAIN)
        .map(String::from)
        .filter(|id| {
            g.class_type(id)
                .map(|ct| SAMPLER_CLASSES.contains(&ct))
                .unwrap_or(false)
        });

    let Some(sampler_id) = sampler_id else {
        tracing::warn!("{} node not found", MARKER_SAMPLER_MAIN);
        return;
    };

    let seed = match params.seed {
        Some(seed) => {
            tracing::debug!("Sampler: fixed seed = {}", seed);
            seed
        }
        None => {
            let seed = rand::thread_rng().gen_range(1..i64::from(i32::MAX));
            tracing::debug!("Sampler: random seed = {}", seed);
            seed
        }
    };

    let updates: [(&str, Value); 5] = [
        ("seed", json!(seed)),
        ("steps", json!(params.steps)),
        ("cfg", json!(params.cfg)),
        ("sampler_name", json!(params.sampler)),
        ("scheduler", json!(params.scheduler)),
    ];

    if let Some(inputs) = g.inputs_mut(&sampler_id) {
        // Only rewrite keys the node already declares; KSamplerAdvanced for
        // instance has no "seed" input.
        for (key, value) in updates {
            if inputs.contains_key(key) {
                inputs.insert(key.to_string(), value);
            }
        }
    }

    tracing::debug!(
        "Sampler: steps={}, cfg={}, sampler={}",
        params.steps,
        params.cfg,
        params.sampler
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_graph() -> WorkflowGraph {
        WorkflowGraph::from_value(json!({
            "1": {
                "class_type": "CheckpointLoaderSimple",
                "_meta": {"title": "__CHECKPOINT_BASE__"},
                "inputs": {"ckpt_name": "authored.safetensors"}
            },
            "2": {
                "class_type": "LoraLoader",
                "_meta": {"title": "__LORA_CHARACTER__"},
                "inputs": {"lora_name": "none", "strength_model": 1.0, "strength_clip": 1.0}
            },
            "3": {
                "class_type": "KSampler",
                "_meta": {"title": "__SAMPLER_MAIN__"},
                "inputs": {"seed": 0, "steps": 20, "cfg": 7.0, "sampler_name": "euler", "scheduler": "normal", "denoise": 1.0}
            },
            "6": {
                "class_type": "CLIPTextEncode",
                "_meta": {"title": "__PROMPT_POS__"},
                "inputs": {"text": "authored base prompt"}
            },
            "7": {
                "class_type": "CLIPTextEncode",
                "_meta": {"title": "__PROMPT_NEG__"},
                "inputs": {"text": ""}
            }
        }))
        .unwrap()
    }

    fn input(g: &WorkflowGraph, id: &str, key: &str) -> Value {
        g.node(id).unwrap()["inputs"][key].clone()
    }

    #[test]
    fn test_positive_prompt_patched_with_visual_base() {
        let graph = sample_graph();
        let character = CharacterParams {
            visual_base: "1girl, silver hair".to_string(),
            ..Default::default()
        };
        let params = GenParams {
            quality_tags: "best quality".to_string(),
            ..Default::default()
        };

        let patched = patch_workflow(&graph, &character, "night rooftop", &params).unwrap();

        assert_eq!(
            input(&patched, "6", "text"),
            json!("best quality, 1girl, silver hair, night rooftop")
        );
    }

    #[test]
    fn test_positive_prompt_keeps_authored_text_as_base() {
        let graph = sample_graph();
        let params = GenParams {
            quality_tags: "best quality".to_string(),
            ..Default::default()
        };

        let patched =
            patch_workflow(&graph, &CharacterParams::default(), "", &params).unwrap();

        assert_eq!(
            input(&patched, "6", "text"),
            json!("best quality, authored base prompt")
        );
    }

    #[test]
    fn test_missing_positive_marker_is_an_error() {
        let graph = WorkflowGraph::from_value(json!({
            "3": {"class_type": "KSampler", "_meta": {"title": "__SAMPLER_MAIN__"}, "inputs": {"seed": 0}}
        }))
        .unwrap();

        let err = patch_workflow(
            &graph,
            &CharacterParams::default(),
            "",
            &GenParams::default(),
        )
        .unwrap_err();

        assert!(matches!(err, CourierError::WorkflowError { .. }));
    }

    #[test]
    fn test_negative_prompt_patched_when_present() {
        let graph = sample_graph();
        let params = GenParams {
            negative: "lowres, bad hands".to_string(),
            ..Default::default()
        };

        let patched =
            patch_workflow(&graph, &CharacterParams::default(), "", &params).unwrap();

        assert_eq!(input(&patched, "7", "text"), json!("lowres, bad hands"));
    }

    #[test]
    fn test_empty_negative_leaves_node_untouched() {
        let graph = sample_graph();
        let params = GenParams {
            negative: String::new(),
            ..Default::default()
        };

        let patched =
            patch_workflow(&graph, &CharacterParams::default(), "", &params).unwrap();

        assert_eq!(input(&patched, "7", "text"), json!(""));
    }

    #[test]
    fn test_lora_enabled() {
        let graph = sample_graph();
        let character = CharacterParams {
            lora_name: "heroine_v2.safetensors".to_string(),
            lora_strength: 0.85,
            ..Default::default()
        };

        let patched =
            patch_workflow(&graph, &character, "", &GenParams::default()).unwrap();

        assert_eq!(input(&patched, "2", "lora_name"), json!("heroine_v2.safetensors"));
        assert_eq!(input(&patched, "2", "strength_model"), json!(0.85));
        assert_eq!(input(&patched, "2", "strength_clip"), json!(0.85));
    }

    #[test]
    fn test_lora_disabled_by_zeroing_strengths() {
        let graph = sample_graph();

        let patched = patch_workflow(
            &graph,
            &CharacterParams::default(),
            "",
            &GenParams::default(),
        )
        .unwrap();

        // Name keeps the authored value, strengths drop to zero.
        assert_eq!(input(&patched, "2", "lora_name"), json!("none"));
        assert_eq!(input(&patched, "2", "strength_model"), json!(0.0));
        assert_eq!(input(&patched, "2", "strength_clip"), json!(0.0));
    }

    #[test]
    fn test_checkpoint_patched_only_when_set() {
        let graph = sample_graph();

        let kept = patch_workflow(
            &graph,
            &CharacterParams::default(),
            "",
            &GenParams::default(),
        )
        .unwrap();
        assert_eq!(input(&kept, "1", "ckpt_name"), json!("authored.safetensors"));

        let params = GenParams {
            checkpoint: "illustrious_xl.safetensors".to_string(),
            ..Default::default()
        };
        let swapped =
            patch_workflow(&graph, &CharacterParams::default(), "", &params).unwrap();
        assert_eq!(
            input(&swapped, "1", "ckpt_name"),
            json!("illustrious_xl.safetensors")
        );
    }

    #[test]
    fn test_sampler_fixed_seed_and_params() {
        let graph = sample_graph();
        let params = GenParams {
            seed: Some(1234),
            steps: 12,
            cfg: 3.5,
            sampler: "dpmpp_2m".to_string(),
            scheduler: "karras".to_string(),
            ..Default::default()
        };

        let patched =
            patch_workflow(&graph, &CharacterParams::default(), "", &params).unwrap();

        assert_eq!(input(&patched, "3", "seed"), json!(1234));
        assert_eq!(input(&patched, "3", "steps"), json!(12));
        assert_eq!(input(&patched, "3", "cfg"), json!(3.5));
        assert_eq!(input(&patched, "3", "sampler_name"), json!("dpmpp_2m"));
        assert_eq!(input(&patched, "3", "scheduler"), json!("karras"));
        // Untouched keys survive.
        assert_eq!(input(&patched, "3", "denoise"), json!(1.0));
    }

    #[test]
    fn test_sampler_random_seed_in_range() {
        let graph = sample_graph();
        let params = GenParams {
            seed: None,
            ..Default::default()
        };

        let patched =
            patch_workflow(&graph, &CharacterParams::default(), "", &params).unwrap();

        let seed = input(&patched, "3", "seed").as_i64().unwrap();
        assert!(seed >= 1);
        assert!(seed < i64::from(i32::MAX));
    }

    #[test]
    fn test_sampler_patches_only_declared_keys() {
        // KSamplerAdvanced without a plain "seed" input.
        let graph = WorkflowGraph::from_value(json!({
            "3": {
                "class_type": "KSamplerAdvanced",
                "_meta": {"title": "__SAMPLER_MAIN__"},
                "inputs": {"steps": 20, "cfg": 7.0}
            },
            "6": {
                "class_type": "CLIPTextEncode",
                "_meta": {"title": "__PROMPT_POS__"},
                "inputs": {"text": ""}
            }
        }))
        .unwrap();

        let params = GenParams {
            steps: 10,
            ..Default::default()
        };
        let patched =
            patch_workflow(&graph, &CharacterParams::default(), "", &params).unwrap();

        let inputs = patched.node("3").unwrap()["inputs"].as_object().unwrap();
        assert_eq!(inputs["steps"], json!(10));
        assert!(!inputs.contains_key("seed"));
        assert!(!inputs.contains_key("sampler_name"));
    }

    #[test]
    fn test_input_graph_not_mutated() {
        let graph = sample_graph();
        let params = GenParams {
            seed: Some(99),
            checkpoint: "other.safetensors".to_string(),
            ..Default::default()
        };

        let _ = patch_workflow(&graph, &CharacterParams::default(), "changed", &params).unwrap();

        assert_eq!(input(&graph, "6", "text"), json!("authored base prompt"));
        assert_eq!(input(&graph, "3", "seed"), json!(0));
        assert_eq!(input(&graph, "1", "ckpt_name"), json!("authored.safetensors"));
    }
}
