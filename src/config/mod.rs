/// Configuration management for sqlpilot
///
/// Handles server configuration, the queried database, the language model
/// endpoint and session checkpoint policy.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Language model configuration
    pub llm: LlmConfig,
    /// Session checkpoint configuration
    pub sessions: SessionConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file the assistant drafts queries against (opened read-only)
    pub path: String,
    /// Number of sample rows included in each table description
    pub sample_rows: usize,
    /// Optional SQLite file for durable checkpoints.
    /// None keeps suspended sessions in memory only.
    pub checkpoint_path: Option<String>,
}

/// OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL, without the trailing `/chat/completions`
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Suspended session policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds a suspended session stays resumable. 0 disables expiry.
    pub checkpoint_ttl_secs: u64,
    /// Cron schedule (with seconds) for the expired checkpoint sweep
    pub sweep_schedule: String,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("SQLPILOT_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("SQLPILOT_PORT", 3005),
            },
            database: DatabaseConfig {
                path: std::env::var("SQLPILOT_DATABASE")
                    .unwrap_or_else(|_| "chinook.db".to_string()),
                sample_rows: env_or("SQLPILOT_SAMPLE_ROWS", 3),
                checkpoint_path: std::env::var("SQLPILOT_CHECKPOINT_DB")
                    .ok()
                    .filter(|p| !p.is_empty()),
            },
            llm: LlmConfig {
                base_url: std::env::var("SQLPILOT_LLM_BASE_URL").unwrap_or_else(|_| {
                    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
                }),
                model: std::env::var("SQLPILOT_LLM_MODEL")
                    .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
                api_key: std::env::var("SQLPILOT_LLM_API_KEY").ok().filter(|k| !k.is_empty()),
                temperature: env_or("SQLPILOT_LLM_TEMPERATURE", 0.0),
                timeout_secs: env_or("SQLPILOT_LLM_TIMEOUT_SECS", 60),
            },
            sessions: SessionConfig {
                checkpoint_ttl_secs: env_or("SQLPILOT_CHECKPOINT_TTL_SECS", 3600),
                sweep_schedule: std::env::var("SQLPILOT_SWEEP_SCHEDULE")
                    .unwrap_or_else(|_| "0 * * * * *".to_string()),
            },
        }
    }
}

impl SessionConfig {
    /// Checkpoint time-to-live, None when expiry is disabled
    pub fn checkpoint_ttl(&self) -> Option<chrono::Duration> {
        match self.checkpoint_ttl_secs {
            0 => None,
            secs => Some(chrono::Duration::seconds(secs as i64)),
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or invalid
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
