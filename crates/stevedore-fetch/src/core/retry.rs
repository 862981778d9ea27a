use rand::Rng;
use std::time::Duration;

/// Delay before the next fetch attempt.
///
/// With no recorded failures the delay is pure jitter, `[0, jitter_range]`,
/// which spreads out nodes asked for the same package at the same moment.
/// Otherwise the delay is `failure_count * backoff_unit`, capped at
/// `max_interval`, plus the same jitter.
///
/// # Examples
///
/// ```
/// use rand::SeedableRng;
/// use rand::rngs::SmallRng;
/// use std::time::Duration;
/// use stevedore_fetch::retry_delay;
///
/// let mut rng = SmallRng::seed_from_u64(7);
/// let delay = retry_delay(
///     3,
///     Duration::from_secs(10),
///     Duration::from_secs(3600),
///     Duration::ZERO,
///     &mut rng,
/// );
/// assert_eq!(delay, Duration::from_secs(30));
/// ```
pub fn retry_delay<R: Rng + ?Sized>(
    failure_count: u32,
    backoff_unit: Duration,
    max_interval: Duration,
    jitter_range: Duration,
    rng: &mut R,
) -> Duration {
    let jitter = jitter(jitter_range, rng);
    if failure_count == 0 {
        return jitter;
    }

    backoff_unit
        .saturating_mul(failure_count)
        .min(max_interval)
        .saturating_add(jitter)
}

fn jitter<R: Rng + ?Sized>(range: Duration, rng: &mut R) -> Duration {
    let millis = u64::try_from(range.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rng.random_range(0..=millis))
}
