use devsavvy_files::ProcessorOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the whole workspace.
///
/// This covers the model and server to talk to, how uploaded files are turned
/// into context, chat behaviour, and where things are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub system_prompt: String,
    pub files: ProcessorOptions,
    pub chat: ChatConfig,
    pub storage: StorageConfig,
}

/// Configuration for the AI model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub context_length: usize,
}

/// Chat behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Start conversations with source-only mode enabled.
    pub source_only: bool,
    /// Answer with a demo reply instead of failing when Ollama is unreachable.
    pub demo_fallback: bool,
    /// Number of earlier messages sent along with each query.
    pub max_history: usize,
}

/// Storage locations for everything persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub chat_history_path: String,
    pub canvas_path: String,
    pub socket_path: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2:3b".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.7,
            context_length: 8192,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            source_only: false,
            demo_fallback: true,
            max_history: 20,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            chat_history_path: "./data/history".to_string(),
            canvas_path: "./data/canvas.json".to_string(),
            socket_path: "/tmp/devsavvy.sock".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            system_prompt: "You are DevSavvy, a helpful AI assistant specializing in programming \
                            and development tasks."
                .to_string(),
            files: ProcessorOptions::default(),
            chat: ChatConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("config.yaml").unwrap_or_default()
    }

    /// Write the configuration as YAML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_yaml::to_string(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_config_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.temperature, 0.7);
    }

    #[test]
    fn test_chat_config_defaults() {
        let config = ChatConfig::default();
        assert!(!config.source_only);
        assert!(config.demo_fallback);
        assert_eq!(config.max_history, 20);
    }

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.chat_history_path, "./data/history");
        assert_eq!(config.canvas_path, "./data/canvas.json");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "llm:\n  model: qwen2.5-coder:1.5b\nchat:\n  source_only: true\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "qwen2.5-coder:1.5b");
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert!(config.chat.source_only);
        assert_eq!(config.files.max_file_chars, 20_000);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = Config::default();
        config.llm.model = "mistral".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.llm.model, "mistral");
        assert_eq!(loaded.storage.socket_path, config.storage.socket_path);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/config.yaml");
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }
}
