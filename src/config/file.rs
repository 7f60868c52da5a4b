use crate::utils::error::{CourierError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// TOML view of the persistent settings. Every section and field is optional;
/// anything missing falls back to the built-in defaults, so hand-edited files
/// stay valid across versions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerSection>,
    pub workflow: Option<WorkflowSection>,
    pub character: Option<CharacterSection>,
    pub sampler: Option<SamplerSection>,
    pub output: Option<OutputSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub history_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowSection {
    pub path: Option<String>,
    pub quality_tags: Option<String>,
    pub negative: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterSection {
    pub visual_base: Option<String>,
    pub lora_name: Option<String>,
    pub lora_strength: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplerSection {
    pub seed: Option<i64>,
    pub steps: Option<u32>,
    pub cfg: Option<f64>,
    pub sampler: Option<String>,
    pub scheduler: Option<String>,
    pub checkpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSection {
    pub path: Option<String>,
}

const DEFAULT_FILE: &str = r#"# comfy-courier settings

[server]
url = "http://127.0.0.1:8188"
timeout_seconds = 30
poll_interval_ms = 500
history_timeout_seconds = 180

[workflow]
path = "workflows/txt2img.api.json"

[character]
visual_base = ""
lora_name = ""
lora_strength = 0.0

[sampler]
steps = 8
cfg = 2.2
sampler = "euler_ancestral"
scheduler = "simple"

[output]
path = "./output"
"#;

impl FileConfig {
    /// Loads the file, or writes the default template and returns defaults
    /// when it does not exist yet.
    pub fn load_or_init<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config file not found, writing defaults: {}", path.display());
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, DEFAULT_FILE)?;
            return Self::from_toml_str(DEFAULT_FILE);
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| CourierError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn server_url(&self) -> Option<&str> {
        self.server.as_ref()?.url.as_deref()
    }
}

/// Replaces `${VAR_NAME}` occurrences with the environment value; unknown
/// variables are left as written.
fn substitute_env_vars(content: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static pattern");

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .into_owned()
}

impl Validate for FileConfig {
    fn validate(&self) -> Result<()> {
        if let Some(url) = self.server_url() {
            validation::validate_url("server.url", url)?;
        }
        if let Some(path) = self.output.as_ref().and_then(|o| o.path.as_deref()) {
            validation::validate_path("output.path", path)?;
        }
        if let Some(strength) = self.character.as_ref().and_then(|c| c.lora_strength) {
            validation::validate_range("character.lora_strength", strength, 0.0, 2.0)?;
        }
        if let Some(cfg) = self.sampler.as_ref().and_then(|s| s.cfg) {
            validation::validate_range("sampler.cfg", cfg, 0.0, 30.0)?;
        }
        if let Some(steps) = self.sampler.as_ref().and_then(|s| s.steps) {
            validation::validate_range("sampler.steps", steps, 1, 150)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_config() {
        let toml_content = r#"
[server]
url = "http://localhost:8188"

[workflow]
path = "workflows/custom.api.json"
quality_tags = "best quality"

[sampler]
steps = 12
cfg = 3.0
"#;

        let config = FileConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.server_url(), Some("http://localhost:8188"));
        assert_eq!(
            config.workflow.as_ref().unwrap().path.as_deref(),
            Some("workflows/custom.api.json")
        );
        assert_eq!(config.sampler.as_ref().unwrap().steps, Some(12));
        assert!(config.character.is_none());
    }

    #[test]
    fn test_parse_server_timeout() {
        let config = FileConfig::from_toml_str(
            r#"
[server]
url = "http://localhost:8188"
timeout_seconds = 45
"#,
        )
        .unwrap();
        assert_eq!(config.server.as_ref().unwrap().timeout_seconds, Some(45));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("COURIER_TEST_URL", "http://10.0.0.5:8188");

        let config = FileConfig::from_toml_str(
            r#"
[server]
url = "${COURIER_TEST_URL}"
"#,
        )
        .unwrap();
        assert_eq!(config.server_url(), Some("http://10.0.0.5:8188"));

        std::env::remove_var("COURIER_TEST_URL");
    }

    #[test]
    fn test_unknown_env_var_left_in_place() {
        let config = FileConfig::from_toml_str(
            r#"
[workflow]
path = "${COURIER_NO_SUCH_VAR}/wf.json"
"#,
        )
        .unwrap();
        assert_eq!(
            config.workflow.unwrap().path.unwrap(),
            "${COURIER_NO_SUCH_VAR}/wf.json"
        );
    }

    #[test]
    fn test_validation_rejects_bad_url() {
        let config = FileConfig::from_toml_str(
            r#"
[server]
url = "not-a-url"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_out_of_range_strength() {
        let config = FileConfig::from_toml_str(
            r#"
[character]
lora_strength = 5.0
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_init_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.toml");

        let config = FileConfig::load_or_init(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.server_url(), Some("http://127.0.0.1:8188"));
        assert!(config.validate().is_ok());

        // Second load reads the file back.
        let reread = FileConfig::load_or_init(&path).unwrap();
        assert_eq!(reread.server_url(), Some("http://127.0.0.1:8188"));
    }

    #[test]
    fn test_load_existing_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[server]\nurl = \"http://192.168.1.10:8188\"\n")
            .unwrap();

        let config = FileConfig::load_or_init(temp_file.path()).unwrap();
        assert_eq!(config.server_url(), Some("http://192.168.1.10:8188"));
    }
}
