// Copyright 2025 Chatcache Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::Result;
use chatcache_core::{CachePolicy, CONTEXT_KEY, DEFAULT_MAX_CONTEXT_LINES};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Chatcache Server Configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub llm: LLMConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP API listen address (e.g., "127.0.0.1:8000")
    #[serde(default = "default_http_addr")]
    pub listen_addr: String,

    /// Enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(CacheBackend::Redis),
            "memory" => Ok(CacheBackend::Memory),
            other => anyhow::bail!("Unknown cache backend: {}", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Where answers and the conversation transcript live
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackend,

    /// Redis connection URL (used when backend = "redis")
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Lifetime of a cached answer in seconds
    #[serde(default = "default_answer_ttl")]
    pub answer_ttl_secs: u64,

    /// Lifetime of the transcript after its last write, in seconds
    #[serde(default = "default_context_ttl")]
    pub context_ttl_secs: u64,

    /// Key of the shared transcript slot
    #[serde(default = "default_context_key")]
    pub context_key: String,

    /// Transcript lines handed to the model
    #[serde(default = "default_max_context_lines")]
    pub max_context_lines: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LLMConfig {
    /// Ollama base URL (e.g., "http://localhost:11434")
    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,

    /// Model name passed to Ollama
    #[serde(default = "default_model")]
    pub model: String,

    /// Upper bound on a single model call, in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter directives used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Emit JSON lines on the console instead of plain text
    #[serde(default)]
    pub json: bool,

    /// Optional file that receives a copy of every log line
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

// Default values
fn default_http_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_enable_cors() -> bool {
    true
}

fn default_cache_backend() -> CacheBackend {
    CacheBackend::Redis
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_answer_ttl() -> u64 {
    600
}

fn default_context_ttl() -> u64 {
    3600
}

fn default_context_key() -> String {
    CONTEXT_KEY.to_string()
}

fn default_max_context_lines() -> usize {
    DEFAULT_MAX_CONTEXT_LINES
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2:1b".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_log_filter() -> String {
    "chatcache_server=info,chatcache_core=info,tower_http=info".to_string()
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_http_addr(),
            enable_cors: default_enable_cors(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            redis_url: default_redis_url(),
            answer_ttl_secs: default_answer_ttl(),
            context_ttl_secs: default_context_ttl(),
            context_key: default_context_key(),
            max_context_lines: default_max_context_lines(),
        }
    }
}

impl CacheConfig {
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            answer_ttl: Duration::from_secs(self.answer_ttl_secs),
            context_ttl: Duration::from_secs(self.context_ttl_secs),
            context_key: self.context_key.clone(),
            max_context_lines: self.max_context_lines,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: default_ollama_base_url(),
            model: default_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
            log_file: None,
        }
    }
}

/// Where [`ServerConfig::load`] took its base values from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Defaults,
    File(PathBuf),
    MissingFile(PathBuf),
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::Defaults => tracing::info!("No config file given, using defaults"),
            ConfigSource::File(path) => {
                tracing::info!("Loaded configuration from file: {:?}", path)
            }
            ConfigSource::MissingFile(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path)
            }
        }
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: env > file > defaults
    ///
    /// Nothing is logged here since tracing is not installed yet; the
    /// returned [`ConfigSource`] is reported once it is.
    pub fn load(config_file: Option<PathBuf>) -> Result<(Self, ConfigSource)> {
        let (config, source) = match config_file {
            Some(path) if path.exists() => {
                let config = Self::from_file(&path)?;
                (config, ConfigSource::File(path))
            }
            Some(path) => (Self::default(), ConfigSource::MissingFile(path)),
            None => (Self::default(), ConfigSource::Defaults),
        };

        Ok((Self::merge_with_env(config)?, source))
    }

    /// Apply environment overrides on top of `config`
    ///
    /// Supported environment variables:
    /// - CHATCACHE_HTTP_ADDR: HTTP listen address
    /// - CHATCACHE_CACHE_BACKEND: "redis" or "memory"
    /// - CHATCACHE_REDIS_URL: Redis connection URL
    /// - CHATCACHE_ANSWER_TTL: Answer lifetime in seconds
    /// - CHATCACHE_CONTEXT_TTL: Transcript lifetime in seconds
    /// - CHATCACHE_MAX_CONTEXT_LINES: Transcript lines handed to the model
    /// - OLLAMA_BASE_URL: Ollama base URL
    /// - CHATCACHE_MODEL: Model name
    /// - CHATCACHE_LOG_JSON: JSON console logs (true/false)
    /// - CHATCACHE_LOG_FILE: Log file path
    pub fn merge_with_env(mut config: Self) -> Result<Self> {
        if let Ok(addr) = std::env::var("CHATCACHE_HTTP_ADDR") {
            config.server.listen_addr = addr;
        }

        if let Ok(backend) = std::env::var("CHATCACHE_CACHE_BACKEND") {
            config.cache.backend = backend.parse()?;
        }

        if let Ok(url) = std::env::var("CHATCACHE_REDIS_URL") {
            config.cache.redis_url = url;
        }

        if let Ok(ttl) = std::env::var("CHATCACHE_ANSWER_TTL") {
            config.cache.answer_ttl_secs = ttl.parse()?;
        }

        if let Ok(ttl) = std::env::var("CHATCACHE_CONTEXT_TTL") {
            config.cache.context_ttl_secs = ttl.parse()?;
        }

        if let Ok(lines) = std::env::var("CHATCACHE_MAX_CONTEXT_LINES") {
            config.cache.max_context_lines = lines.parse()?;
        }

        if let Ok(base_url) = std::env::var("OLLAMA_BASE_URL") {
            config.llm.ollama_base_url = base_url;
        }

        if let Ok(model) = std::env::var("CHATCACHE_MODEL") {
            config.llm.model = model;
        }

        if let Ok(json) = std::env::var("CHATCACHE_LOG_JSON") {
            config.logging.json = json.parse().unwrap_or(false);
        }

        if let Ok(path) = std::env::var("CHATCACHE_LOG_FILE") {
            config.logging.log_file = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.cache.answer_ttl_secs == 0 || self.cache.context_ttl_secs == 0 {
            anyhow::bail!("Cache TTLs must be at least one second");
        }

        if self.cache.max_context_lines == 0 {
            anyhow::bail!("max_context_lines must be greater than zero");
        }

        if self.cache.context_key.is_empty() {
            anyhow::bail!("context_key must not be empty");
        }

        if self.cache.backend == CacheBackend::Redis && self.cache.redis_url.is_empty() {
            anyhow::bail!("Redis cache backend selected but no redis_url configured");
        }

        url::Url::parse(&self.llm.ollama_base_url)
            .map_err(|e| anyhow::anyhow!("Invalid Ollama base URL '{}': {}", self.llm.ollama_base_url, e))?;

        if self.llm.model.is_empty() {
            anyhow::bail!("No model configured");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1:8000");
        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert_eq!(config.cache.answer_ttl_secs, 600);
        assert_eq!(config.cache.context_ttl_secs, 3600);
        assert_eq!(config.cache.max_context_lines, 10);
        assert_eq!(config.llm.model, "llama3.2:1b");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_from_cache_config() {
        let policy = CacheConfig::default().policy();
        assert_eq!(policy, CachePolicy::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[cache]
backend = "memory"
max_context_lines = 6

[llm]
model = "mistral"
"#
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache.max_context_lines, 6);
        assert_eq!(config.cache.answer_ttl_secs, 600);
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.ollama_base_url, "http://localhost:11434");
    }

    #[test]
    fn test_load_reports_source() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (_, source) = ServerConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(source, ConfigSource::File(file.path().to_path_buf()));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let (config, source) = ServerConfig::load(Some(missing.clone())).unwrap();
        assert_eq!(source, ConfigSource::MissingFile(missing));
        assert_eq!(config.cache.context_key, "context");

        let (_, source) = ServerConfig::load(None).unwrap();
        assert_eq!(source, ConfigSource::Defaults);
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("CHATCACHE_MODEL", "phi3");
        std::env::set_var("CHATCACHE_ANSWER_TTL", "30");

        let config = ServerConfig::merge_with_env(ServerConfig::default()).unwrap();
        assert_eq!(config.llm.model, "phi3");
        assert_eq!(config.cache.answer_ttl_secs, 30);

        std::env::remove_var("CHATCACHE_MODEL");
        std::env::remove_var("CHATCACHE_ANSWER_TTL");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ServerConfig::default();
        config.cache.max_context_lines = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.llm.ollama_base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.server.listen_addr = "localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("Memory".parse::<CacheBackend>().unwrap(), CacheBackend::Memory);
        assert!("memcached".parse::<CacheBackend>().is_err());
    }
}
