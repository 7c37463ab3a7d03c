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

//! Redis-backed [`CacheStore`]
//!
//! Uses a multiplexed `ConnectionManager`, which reconnects on its own
//! after a dropped connection. The manager is created on first use, so
//! the server starts while Redis is down and requests fail until it is
//! reachable. Commands are not retried; any Redis error is reported as
//! `ChatError::CacheUnavailable`.

use async_trait::async_trait;
use chatcache_core::{CacheStore, ChatError, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::sync::OnceCell;

pub struct RedisStore {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
}

impl RedisStore {
    /// Prepare a store for `url` (e.g. `redis://127.0.0.1:6379`).
    ///
    /// Only the URL is checked here; no connection is made.
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    /// Shared connection, established on first call.
    ///
    /// A failed attempt leaves the cell empty so the next command retries.
    async fn connection(&self) -> Result<ConnectionManager> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let conn = ConnectionManager::new(self.client.clone()).await?;
                tracing::info!("Connected to Redis");
                Ok::<_, redis::RedisError>(conn)
            })
            .await
            .map_err(unavailable)?;
        Ok(conn.clone())
    }
}

fn unavailable(err: redis::RedisError) -> ChatError {
    ChatError::CacheUnavailable(err.to_string())
}

/// SETEX rejects a zero expiry
fn expiry_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        conn.exists(key).await.map_err(unavailable)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        conn.get(key).await.map_err(unavailable)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, expiry_secs(ttl))
            .await
            .map_err(unavailable)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(unavailable)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
