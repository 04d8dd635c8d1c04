use arb_types::{CorrelationRecord, PoolId};

/// Inputs a Warming Strategy selects from.
#[derive(Debug, Clone)]
pub struct WarmingContext {
    pub source_pair:         PoolId,
    pub candidates:          Vec<CorrelationRecord>,
    pub current_l1_hit_rate: f64,
    pub timestamp_millis:    u64
}

#[derive(Debug, Clone)]
pub struct WarmingSelection {
    pub selected_pairs: Vec<PoolId>,
    pub reason:         &'static str
}

pub trait WarmingStrategy: Send + Sync {
    fn select(&self, ctx: &WarmingContext) -> WarmingSelection;

    /// Feedback hook, called once per completed warming cycle with the
    /// observed L1 hit rate for that cycle. Stateless strategies (TopN,
    /// Threshold, TimeBased) ignore it; Adaptive uses it to grow or shrink
    /// `currentN`.
    fn record_observed_hit_rate(&self, _observed_hit_rate: f64) {}
}

#[derive(Debug, Clone, Copy)]
pub struct TopNStrategy {
    pub top_n:    usize,
    pub min_score: f64
}

impl WarmingStrategy for TopNStrategy {
    fn select(&self, ctx: &WarmingContext) -> WarmingSelection {
        let selected_pairs = ctx
            .candidates
            .iter()
            .filter(|c| c.score >= self.min_score)
            .take(self.top_n)
            .map(|c| c.correlated)
            .collect();
        WarmingSelection { selected_pairs, reason: "top_n" }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThresholdStrategy {
    pub min_score: f64,
    pub max_pairs: usize
}

impl WarmingStrategy for ThresholdStrategy {
    fn select(&self, ctx: &WarmingContext) -> WarmingSelection {
        let selected_pairs = ctx
            .candidates
            .iter()
            .filter(|c| c.score >= self.min_score)
            .take(self.max_pairs)
            .map(|c| c.correlated)
            .collect();
        WarmingSelection { selected_pairs, reason: "threshold" }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TimeBasedStrategy {
    pub corr_weight:      f64,
    pub recency_weight:   f64,
    pub recency_window_millis: u64,
    pub top_n:            usize
}

impl WarmingStrategy for TimeBasedStrategy {
    fn select(&self, ctx: &WarmingContext) -> WarmingSelection {
        let mut scored: Vec<(f64, PoolId)> = ctx
            .candidates
            .iter()
            .map(|c| {
                let age = ctx.timestamp_millis.saturating_sub(c.last_seen_millis) as f64;
                let recency = (1.0 - (age / self.recency_window_millis.max(1) as f64)).clamp(0.0, 1.0);
                let blended = self.corr_weight * c.score + self.recency_weight * recency;
                (blended, c.correlated)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        let selected_pairs = scored.into_iter().take(self.top_n).map(|(_, p)| p).collect();
        WarmingSelection { selected_pairs, reason: "time_based" }
    }
}

/// Maintains `currentN`, adjusted after every warming cycle toward
/// `targetHitRate`.
pub struct AdaptiveStrategy {
    pub min_pairs:         usize,
    pub max_pairs:         usize,
    pub target_hit_rate:   f64,
    pub adjustment_factor: f64,
    current_n:             parking_lot::Mutex<usize>
}

impl AdaptiveStrategy {
    pub fn new(min_pairs: usize, max_pairs: usize, target_hit_rate: f64, adjustment_factor: f64) -> Self {
        Self { min_pairs, max_pairs, target_hit_rate, adjustment_factor, current_n: parking_lot::Mutex::new(min_pairs) }
    }

    pub fn current_n(&self) -> usize {
        *self.current_n.lock()
    }

    /// Called once per completed warming cycle with the observed L1 hit
    /// rate, to grow or shrink `currentN` toward the target.
    pub fn record_observed_hit_rate(&self, observed_hit_rate: f64) {
        let mut current_n = self.current_n.lock();
        *current_n = if observed_hit_rate < self.target_hit_rate {
            ((*current_n as f64 * (1.0 + self.adjustment_factor)).ceil() as usize).min(self.max_pairs)
        } else {
            ((*current_n as f64 * (1.0 - self.adjustment_factor)).floor() as usize).max(self.min_pairs)
        };
    }
}

impl WarmingStrategy for AdaptiveStrategy {
    fn select(&self, ctx: &WarmingContext) -> WarmingSelection {
        let n = self.current_n();
        let selected_pairs = ctx.candidates.iter().take(n).map(|c| c.correlated).collect();
        WarmingSelection { selected_pairs, reason: "adaptive" }
    }

    fn record_observed_hit_rate(&self, observed_hit_rate: f64) {
        AdaptiveStrategy::record_observed_hit_rate(self, observed_hit_rate);
    }
}
