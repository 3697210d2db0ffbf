use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default)]
struct MapMetrics {
    total_builds: u64,
    cache_hits: u64,
    failed_queries: u64,
    latencies: VecDeque<u64>, // microseconds
}

struct MetricsState {
    map: MapMetrics,
    max_history: usize,
}

/// Shared counters for similarity-map requests.
#[derive(Clone)]
pub struct MetricsCollector {
    state: Arc<Mutex<MetricsState>>,
}

impl MetricsCollector {
    pub fn new(max_history: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MetricsState {
                map: MapMetrics::default(),
                max_history,
            })),
        }
    }

    // A panic while holding the lock cannot leave the counters half-written.
    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_request(&self, latency_us: u64, is_cache_hit: bool) {
        let mut state = self.lock();
        let max_history = state.max_history;
        let map = &mut state.map;
        map.total_builds += 1;
        if is_cache_hit {
            map.cache_hits += 1;
        }
        map.latencies.push_back(latency_us);
        if map.latencies.len() > max_history {
            map.latencies.pop_front();
        }
    }

    pub fn record_failed_query(&self) {
        self.lock().map.failed_queries += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.lock();
        let m = &state.map;

        let mut sorted_latencies: Vec<u64> = m.latencies.iter().copied().collect();
        sorted_latencies.sort_unstable();

        let hit_rate = if m.total_builds > 0 {
            m.cache_hits as f32 / m.total_builds as f32
        } else {
            0.0
        };

        MetricsSnapshot {
            total_requests: m.total_builds,
            cache_hits: m.cache_hits,
            hit_rate,
            failed_queries: m.failed_queries,
            p50: percentile(&sorted_latencies, 50.0),
            p95: percentile(&sorted_latencies, 95.0),
            p99: percentile(&sorted_latencies, 99.0),
            history_count: m.latencies.len(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(1024)
    }
}

fn percentile(sorted: &[u64], p: f32) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((p / 100.0) * (sorted.len() as f32)).ceil() as usize;
    sorted[idx.saturating_sub(1).min(sorted.len() - 1)]
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub hit_rate: f32,
    pub failed_queries: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub history_count: usize,
}
