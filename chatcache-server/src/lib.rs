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

pub mod api;
pub mod config;
pub mod llm;
pub mod logging;
pub mod metrics;
pub mod redis_store;

use anyhow::Result;
use axum::Router;
use chatcache_core::{AnswerGenerator, CacheStore, ChatService, MemoryStore};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use api::AppState;
use config::{CacheBackend, CacheConfig, ConfigSource, HttpServerConfig, ServerConfig};
use llm::OllamaProvider;
use metrics::ChatMetrics;
use redis_store::RedisStore;

/// Build the full application router around `state`
pub fn build_app(state: AppState, server: &HttpServerConfig) -> Router {
    let cors = if server.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    api::api_router()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Connect the configured cache backend
pub async fn build_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>> {
    let store: Arc<dyn CacheStore> = match config.backend {
        CacheBackend::Redis => {
            tracing::info!("Using Redis cache at {}", config.redis_url);
            Arc::new(RedisStore::open(&config.redis_url)?)
        }
        CacheBackend::Memory => {
            tracing::warn!("Using in-process memory cache; answers and context are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

/// Assemble the chat service and metrics for `config`
pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    let store = build_store(&config.cache).await?;

    let model = Arc::new(OllamaProvider::from_config(&config.llm)?);
    tracing::info!(
        "Using Ollama model '{}' at {}",
        config.llm.model,
        config.llm.ollama_base_url
    );

    let chat = ChatService::new(store, AnswerGenerator::new(model), config.cache.policy());
    let metrics = ChatMetrics::new()?;

    Ok(AppState::new(Arc::new(chat), Arc::new(metrics)))
}

pub async fn run_server(config: ServerConfig, source: ConfigSource) -> Result<()> {
    logging::init_tracing(&config.logging)?;

    tracing::info!("Starting Chatcache Server");
    source.log();
    tracing::info!("Configuration: {:#?}", config);

    config.validate()?;

    let state = build_state(&config).await?;
    let app = build_app(state, &config.server);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_memory_backend_builds() {
        let mut config = ServerConfig::default();
        config.cache.backend = CacheBackend::Memory;

        let state = build_state(&config).await.unwrap();
        assert_eq!(state.chat.store().backend(), "memory");
        assert_eq!(state.chat.model_name(), "llama3.2:1b");
    }

    #[tokio::test]
    async fn test_redis_backend_builds_while_redis_is_down() {
        let mut config = ServerConfig::default();
        config.cache.redis_url = "redis://127.0.0.1:1".to_string();

        let state = build_state(&config).await.unwrap();
        assert_eq!(state.chat.store().backend(), "redis");
    }
}
