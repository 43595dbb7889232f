//! Configuration data structures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Logging level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub enum LogLevel {
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "info")]
    #[default]
    Info,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "trace")]
    Trace,
}

/// Retrieval subsystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Directory holding the persisted index and metadata artifacts
    pub artifact_dir: PathBuf,
    /// Number of nearest chunks to retrieve per query
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("data/runbooks"),
            top_k: 5,
        }
    }
}

/// Language-model service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Chat-completions endpoint URL; unset runs the pipeline on
    /// deterministic fallbacks only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Model identifier sent with every request
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Per-call timeout in seconds; calls are not retried
    pub timeout_seconds: u64,
    /// Sampling temperature
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "gpt-4.1-mini".to_string(),
            api_key_env: "TRIAGE_LLM_API_KEY".to_string(),
            timeout_seconds: 60,
            temperature: 0.2,
        }
    }
}

/// Workflow engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Path to the JSON thread store
    pub store_path: PathBuf,
    /// Upper bound on router dispatches per run; guards reviewer/judge loops
    pub max_cycles: u32,
    /// How long the in-process gate waits for an approval before parking
    pub approval_timeout_seconds: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("data/triage-threads.json"),
            max_cycles: 25,
            approval_timeout_seconds: 300,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TriageConfig {
    /// Logging verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
    /// Retrieval subsystem settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Language-model service settings
    #[serde(default)]
    pub llm: LlmConfig,
    /// Workflow engine settings
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

impl TriageConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: TriageConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(TriageConfig::default())
        }
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the XDG config directory path
    pub fn default_config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_dir = dirs::config_dir().ok_or("Could not determine config directory")?;
        Ok(config_dir.join("runbook-triage").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.retrieval.top_k == 0 {
            errors.push("retrieval.top_k must be at least 1".to_string());
        }
        if self.retrieval.top_k > 100 {
            errors.push("retrieval.top_k cannot exceed 100".to_string());
        }

        if self.llm.timeout_seconds == 0 {
            errors.push("llm.timeout_seconds must be at least 1".to_string());
        }
        if self.llm.timeout_seconds > 600 {
            errors.push("llm.timeout_seconds cannot exceed 600 (10 minutes)".to_string());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            errors.push("llm.temperature must be between 0.0 and 2.0".to_string());
        }

        if self.workflow.max_cycles == 0 {
            errors.push("workflow.max_cycles must be at least 1".to_string());
        }
        if self.workflow.max_cycles > 1000 {
            errors.push("workflow.max_cycles cannot exceed 1000".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
