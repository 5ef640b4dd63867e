use crate::error::{GatewayError, Result};
use crate::providers::BackendPreset;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub backend: BackendConfig,
    /// Client model name -> backend model name. Empty means the built-in table.
    #[serde(default)]
    pub models: HashMap<String, String>,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub params: ParamsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_name")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Drop streamed events whose delta carries `reasoning_content`.
    #[serde(default = "default_true")]
    pub suppress_reasoning: bool,
    /// Stream from the backend (and to the client) whatever the client asked.
    #[serde(default)]
    pub force_streaming: bool,
    /// Ask the backend chat template to think before answering.
    #[serde(default)]
    pub enable_thinking: bool,
    #[serde(default)]
    pub framing: FramingMode,
}

/// What to do with upstream lines that are not `data:` lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FramingMode {
    /// Drop comments, `event:`/`id:` fields and blank separators.
    #[default]
    DataOnly,
    /// Forward non-empty non-data lines verbatim. They are held until their
    /// event's data line is judged and dropped with it if it is suppressed.
    Passthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_timeout_secs")]
    pub default_secs: u64,
    /// Backend model ids that may take as long as they need.
    #[serde(default = "default_unbounded_models")]
    pub unbounded_models: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamsConfig {
    /// Inbound top-level fields that are never forwarded to the backend.
    #[serde(default)]
    pub drop: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            backend: BackendConfig::default(),
            models: HashMap::new(),
            defaults: DefaultsConfig::default(),
            policy: PolicyConfig::default(),
            timeouts: TimeoutsConfig::default(),
            params: ParamsConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: default_backend_name(),
            base_url: None,
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            suppress_reasoning: true,
            force_streaming: false,
            enable_thinking: false,
            framing: FramingMode::default(),
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            default_secs: default_timeout_secs(),
            unbounded_models: default_unbounded_models(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_backend_name() -> String {
    "nvidia".to_string()
}

fn default_api_key_env() -> String {
    "NVIDIA_API_KEY".to_string()
}

fn default_temperature() -> f64 {
    0.6
}

fn default_max_tokens() -> u64 {
    4096
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_unbounded_models() -> Vec<String> {
    vec![
        "moonshotai/kimi-k2-instruct".to_string(),
        "moonshotai/kimi-k2-instruct-0905".to_string(),
        "z-ai/glm4.7".to_string(),
    ]
}

impl GatewayConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir > built-in defaults
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in &config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Resolve the effective base URL (config override or backend preset default)
    pub fn effective_base_url(&self) -> Result<String> {
        if let Some(ref url) = self.backend.base_url {
            return Ok(url.trim_end_matches('/').to_string());
        }

        let preset = BackendPreset::from_name(&self.backend.name).ok_or_else(|| {
            GatewayError::config(format!(
                "Unknown backend '{}' and no base_url configured. Known backends: {}",
                self.backend.name,
                BackendPreset::all()
                    .iter()
                    .map(|p| p.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        Ok(preset.base_url.to_string())
    }

    /// Resolve the bearer token from the configured environment variable
    pub fn resolve_api_key(&self) -> Result<String> {
        std::env::var(&self.backend.api_key_env).map_err(|_| {
            GatewayError::config(format!(
                "Environment variable '{}' not set. Set it with your backend API key.",
                self.backend.api_key_env
            ))
        })
    }

    /// Point the config at a named preset, keeping an explicit base URL.
    pub fn apply_preset(&mut self, name: &str) {
        self.backend.name = name.to_string();
        if let Some(preset) = BackendPreset::from_name(name) {
            self.backend.api_key_env = preset.default_api_key_env.to_string();
        }
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("chat-gateway.toml"));

    if cfg!(target_os = "macos") {
        if let Some(home) = home_dir() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join("chat-gateway")
                    .join("config.toml"),
            );
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join("chat-gateway").join("config.toml"));
        }
        if let Some(home) = home_dir() {
            paths.push(home.join(".config").join("chat-gateway").join("config.toml"));
        }
    }

    if let Some(home) = home_dir() {
        paths.push(home.join(".chat-gateway.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000

[backend]
name = "nvidia"
api_key_env = "NIM_API_KEY"

[models]
"gpt-4o" = "deepseek-ai/deepseek-v3.1"

[policy]
suppress_reasoning = false
force_streaming = true
framing = "passthrough"

[timeouts]
default_secs = 30
unbounded_models = ["moonshotai/kimi-k2-instruct"]
"#
        )
        .unwrap();

        let config = GatewayConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.backend.api_key_env, "NIM_API_KEY");
        assert_eq!(
            config.models.get("gpt-4o"),
            Some(&"deepseek-ai/deepseek-v3.1".to_string())
        );
        assert!(!config.policy.suppress_reasoning);
        assert!(config.policy.force_streaming);
        assert_eq!(config.policy.framing, FramingMode::Passthrough);
        assert_eq!(config.timeouts.default_secs, 30);
        // untouched sections keep their defaults
        assert_eq!(config.defaults.max_tokens, 4096);
    }

    #[test]
    fn test_empty_file_is_valid() {
        let f = NamedTempFile::new().unwrap();
        let config = GatewayConfig::load(f.path()).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.backend.name, "nvidia");
        assert!(config.policy.suppress_reasoning);
        assert!(!config.policy.force_streaming);
        assert_eq!(config.policy.framing, FramingMode::DataOnly);
        assert_eq!(config.timeouts.default_secs, 180);
        assert!((config.defaults.temperature - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_effective_base_url_from_preset() {
        let config = GatewayConfig::default();
        let url = config.effective_base_url().unwrap();
        assert_eq!(url, "https://integrate.api.nvidia.com/v1");
    }

    #[test]
    fn test_effective_base_url_override() {
        let config = GatewayConfig {
            backend: BackendConfig {
                name: "custom".to_string(),
                base_url: Some("https://my-server.com/v1/".to_string()),
                api_key_env: "MY_KEY".to_string(),
            },
            ..GatewayConfig::default()
        };

        let url = config.effective_base_url().unwrap();
        assert_eq!(url, "https://my-server.com/v1");
    }

    #[test]
    fn test_unknown_backend_without_url_fails() {
        let mut config = GatewayConfig::default();
        config.apply_preset("nonexistent");
        assert!(matches!(
            config.effective_base_url(),
            Err(GatewayError::Config { .. })
        ));
    }

    #[test]
    fn test_apply_preset_switches_key_env() {
        let mut config = GatewayConfig::default();
        config.apply_preset("openrouter");
        assert_eq!(config.backend.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(
            config.effective_base_url().unwrap(),
            "https://openrouter.ai/api/v1"
        );
    }
}
