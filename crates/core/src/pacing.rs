//! Check pacing.

use std::time::Duration;

/// The longest the worker loop ever sleeps between checks, so round
/// freshness and on-demand work are re-examined promptly.
pub const MAX_DELAY: Duration = Duration::from_millis(60_000);

/// Compute the delay before the next check.
///
/// The target cadence spreads the round quota evenly over the round
/// length; the time the last check actually took is credited against
/// it. The result is clamped to `[0, MAX_DELAY]`; a zero quota has no
/// finite cadence and clamps to the ceiling.
pub fn next_delay(
    last_task_duration: Duration,
    round_length: Duration,
    quota_per_round: u32,
) -> Duration {
    if quota_per_round == 0 {
        return MAX_DELAY;
    }

    let cadence_ms =
        round_length.as_millis() as u64 / quota_per_round as u64;
    let delay_ms =
        cadence_ms.saturating_sub(last_task_duration.as_millis() as u64);
    Duration::from_millis(delay_ms).min(MAX_DELAY)
}
