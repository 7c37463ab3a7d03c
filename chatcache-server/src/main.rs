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
use chatcache_server::{
    config::{CacheBackend, ServerConfig},
    run_server,
};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, env = "CHATCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config file)
    #[arg(long, env = "CHATCACHE_HTTP_ADDR")]
    http_addr: Option<String>,

    /// Redis connection URL (overrides config file)
    #[arg(long, env = "CHATCACHE_REDIS_URL")]
    redis_url: Option<String>,

    /// Ollama model name (overrides config file)
    #[arg(long, env = "CHATCACHE_MODEL")]
    model: Option<String>,

    /// Keep answers and context in process memory instead of Redis
    #[arg(long)]
    memory_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let (mut config, source) = ServerConfig::load(args.config)?;

    // Apply CLI overrides
    if let Some(addr) = args.http_addr {
        config.server.listen_addr = addr;
    }
    if let Some(url) = args.redis_url {
        config.cache.redis_url = url;
    }
    if let Some(model) = args.model {
        config.llm.model = model;
    }
    if args.memory_cache {
        config.cache.backend = CacheBackend::Memory;
    }

    run_server(config, source).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_fall_back_to_env() {
        std::env::set_var("CHATCACHE_HTTP_ADDR", "0.0.0.0:9000");

        let args = Args::try_parse_from(["chatcache-server", "--memory-cache"]).unwrap();
        assert_eq!(args.http_addr.as_deref(), Some("0.0.0.0:9000"));
        assert!(args.memory_cache);

        let args =
            Args::try_parse_from(["chatcache-server", "--http-addr", "127.0.0.1:1234"]).unwrap();
        assert_eq!(args.http_addr.as_deref(), Some("127.0.0.1:1234"));

        std::env::remove_var("CHATCACHE_HTTP_ADDR");
    }
}
