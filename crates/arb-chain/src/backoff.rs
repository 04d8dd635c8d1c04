use rand::Rng;

const BASE_DELAY_MILLIS: u64 = 1_000;
const MAX_DELAY_MILLIS: u64 = 60_000;
const JITTER_FRACTION: f64 = 0.25;

/// `min(base * 2^attempt, 60s) + uniform(0, 25%)` jitter, the
/// reconnection formula.
pub fn reconnect_delay_millis(attempt: u32) -> u64 {
    let exp = BASE_DELAY_MILLIS.saturating_mul(1u64 << attempt.min(20));
    let capped = exp.min(MAX_DELAY_MILLIS);
    let jitter_ceiling = (capped as f64 * JITTER_FRACTION) as u64;
    let jitter = if jitter_ceiling == 0 { 0 } else { rand::thread_rng().gen_range(0..=jitter_ceiling) };
    capped + jitter
}

/// Cooldown schedule applied after a rate-limit classification:
/// 30s -> 60s -> 120s -> 240s, capped at 300s.
pub fn rate_limit_cooldown_millis(consecutive_rate_limits: u32) -> u64 {
    const SCHEDULE_SECS: [u64; 4] = [30, 60, 120, 240];
    let idx = (consecutive_rate_limits.saturating_sub(1) as usize).min(SCHEDULE_SECS.len() - 1);
    let secs = if consecutive_rate_limits == 0 { SCHEDULE_SECS[0] } else { SCHEDULE_SECS[idx] };
    secs.min(300) * 1_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delay_grows_and_caps() {
        assert!(reconnect_delay_millis(0) >= BASE_DELAY_MILLIS);
        assert!(reconnect_delay_millis(0) <= BASE_DELAY_MILLIS + (BASE_DELAY_MILLIS as f64 * JITTER_FRACTION) as u64);
        assert!(reconnect_delay_millis(10) <= MAX_DELAY_MILLIS + (MAX_DELAY_MILLIS as f64 * JITTER_FRACTION) as u64);
        assert!(reconnect_delay_millis(10) >= MAX_DELAY_MILLIS);
    }

    #[test]
    fn rate_limit_cooldown_follows_schedule() {
        assert_eq!(rate_limit_cooldown_millis(1), 30_000);
        assert_eq!(rate_limit_cooldown_millis(2), 60_000);
        assert_eq!(rate_limit_cooldown_millis(3), 120_000);
        assert_eq!(rate_limit_cooldown_millis(4), 240_000);
        assert_eq!(rate_limit_cooldown_millis(5), 300_000);
        assert_eq!(rate_limit_cooldown_millis(50), 300_000);
    }
}
