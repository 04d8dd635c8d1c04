use arb_types::HealthStatus;

/// Snapshot of one endpoint's health, as returned by
/// [`ConnectionSupervisor::get_health`](crate::supervisor::ConnectionSupervisor::get_health).
#[derive(Debug, Clone)]
pub struct EndpointHealth {
    pub url:            String,
    pub latency_p95_ms:  f64,
    pub success_rate:    f64,
    pub blocks_behind:   u64,
    pub overall_score:   f64
}

impl EndpointHealth {
    pub fn status(&self) -> HealthStatus {
        match self.overall_score {
            s if s >= 80.0 => HealthStatus::Healthy,
            s if s >= 40.0 => HealthStatus::Degraded,
            _ => HealthStatus::Unhealthy
        }
    }
}

/// Rolling per-endpoint stats feeding the health score.
#[derive(Debug, Clone)]
pub struct EndpointStats {
    pub url:              String,
    /// Exponentially weighted p95 latency estimate, milliseconds.
    pub latency_p95_ms:   f64,
    /// Fraction of recent calls that succeeded, in `[0, 1]`.
    pub success_rate:     f64,
    /// How many blocks behind chain tip this endpoint last reported.
    pub blocks_behind:    u64,
    /// Consecutive reconnect attempts since the last sustained-healthy
    /// window.
    pub attempt_count:    u32,
    pub excluded_until_millis: Option<u64>
}

impl EndpointStats {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            latency_p95_ms: 0.0,
            success_rate: 1.0,
            blocks_behind: 0,
            attempt_count: 0,
            excluded_until_millis: None
        }
    }

    pub fn is_excluded(&self, now_millis: u64) -> bool {
        self.excluded_until_millis.is_some_and(|until| now_millis < until)
    }
}

/// Weights latency/reliability/freshness into one score in `[0, 100]`
/// (30% latency / 40% reliability / 30% block-freshness).
#[derive(Debug, Clone, Copy)]
pub struct HealthScorer {
    pub latency_weight:    f64,
    pub reliability_weight: f64,
    pub freshness_weight:  f64,
    /// Latency, in ms, at or above which the latency sub-score bottoms out.
    pub latency_ceiling_ms: f64,
    /// Blocks-behind at or above which the freshness sub-score bottoms out.
    pub blocks_behind_ceiling: u64
}

impl Default for HealthScorer {
    fn default() -> Self {
        Self {
            latency_weight:     0.30,
            reliability_weight: 0.40,
            freshness_weight:   0.30,
            latency_ceiling_ms: 2_000.0,
            blocks_behind_ceiling: 20
        }
    }
}

impl HealthScorer {
    pub fn score(&self, stats: &EndpointStats) -> f64 {
        let latency_score = (1.0 - (stats.latency_p95_ms / self.latency_ceiling_ms).min(1.0)) * 100.0;
        let reliability_score = stats.success_rate.clamp(0.0, 1.0) * 100.0;
        let freshness_score =
            (1.0 - (stats.blocks_behind as f64 / self.blocks_behind_ceiling as f64).min(1.0)) * 100.0;

        self.latency_weight * latency_score
            + self.reliability_weight * reliability_score
            + self.freshness_weight * freshness_score
    }

    pub fn snapshot(&self, stats: &EndpointStats) -> EndpointHealth {
        EndpointHealth {
            url:           stats.url.clone(),
            latency_p95_ms: stats.latency_p95_ms,
            success_rate:   stats.success_rate,
            blocks_behind:  stats.blocks_behind,
            overall_score:  self.score(stats)
        }
    }

    /// Picks the best non-excluded endpoint, breaking ties by url for
    /// determinism.
    pub fn best_available<'a>(
        &self,
        candidates: impl Iterator<Item = &'a EndpointStats>,
        now_millis: u64
    ) -> Option<&'a EndpointStats> {
        candidates
            .filter(|s| !s.is_excluded(now_millis))
            .max_by(|a, b| {
                self.score(a)
                    .partial_cmp(&self.score(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.url.cmp(&a.url))
            })
    }
}
