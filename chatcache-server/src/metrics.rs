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

//! Prometheus request metrics for the chat endpoint
//!
//! The registry belongs to the application state rather than the process
//! default registry, so tests can build independent instances.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};
use std::time::{Duration, Instant};

const DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    CacheHit,
    Generated,
    Failed,
}

pub struct ChatMetrics {
    registry: Registry,
    requests_total: IntCounter,
    errors_total: IntCounter,
    cache_hits_total: IntCounter,
    cache_misses_total: IntCounter,
    active_requests: IntGauge,
    request_latency: Histogram,
    request_duration: Histogram,
}

impl ChatMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_total =
            IntCounter::new("apiserver_request_total", "Total number of requests")?;
        let errors_total =
            IntCounter::new("apiserver_request_errors_total", "Total number of errors")?;
        let cache_hits_total = IntCounter::new(
            "chatcache_cache_hits_total",
            "Questions answered from the cache",
        )?;
        let cache_misses_total = IntCounter::new(
            "chatcache_cache_misses_total",
            "Questions that required a model call",
        )?;
        let active_requests =
            IntGauge::new("apiserver_active_requests", "Number of active requests")?;
        let request_latency = Histogram::with_opts(HistogramOpts::new(
            "apiserver_request_latency_seconds",
            "Latency of requests in seconds",
        ))?;
        let request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "apiserver_request_duration_seconds",
                "Duration of API server requests",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(cache_hits_total.clone()))?;
        registry.register(Box::new(cache_misses_total.clone()))?;
        registry.register(Box::new(active_requests.clone()))?;
        registry.register(Box::new(request_latency.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            errors_total,
            cache_hits_total,
            cache_misses_total,
            active_requests,
            request_latency,
            request_duration,
        })
    }

    /// Count a request as started; the returned guard must be finished
    /// with the outcome. Dropping it unfinished only releases the
    /// active-request slot.
    pub fn start_request(&self) -> RequestGuard<'_> {
        self.requests_total.inc();
        self.active_requests.inc();
        RequestGuard {
            metrics: self,
            start: Instant::now(),
        }
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.get()
    }

    pub fn errors_total(&self) -> u64 {
        self.errors_total.get()
    }

    pub fn active_requests(&self) -> i64 {
        self.active_requests.get()
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits_total.get()
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses_total.get()
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

pub struct RequestGuard<'a> {
    metrics: &'a ChatMetrics,
    start: Instant,
}

impl RequestGuard<'_> {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record latency and outcome; returns the elapsed time
    pub fn finish(self, outcome: RequestOutcome) -> Duration {
        let elapsed = self.elapsed();
        let secs = elapsed.as_secs_f64();

        self.metrics.request_latency.observe(secs);
        self.metrics.request_duration.observe(secs);

        match outcome {
            RequestOutcome::CacheHit => self.metrics.cache_hits_total.inc(),
            RequestOutcome::Generated => self.metrics.cache_misses_total.inc(),
            RequestOutcome::Failed => self.metrics.errors_total.inc(),
        }

        elapsed
    }
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.metrics.active_requests.dec();
    }
}
