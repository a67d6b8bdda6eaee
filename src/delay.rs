use chrono::{DateTime, Utc};
use log::info;
use rand::Rng;
use tokio::time::Duration;

pub const MAX_DELAY_SECS: u64 = 180;

pub fn pick_delay<R: Rng + ?Sized>(rng: &mut R) -> Duration {
    Duration::from_secs(rng.random_range(0..=MAX_DELAY_SECS))
}

/// Sleep a random 0–180 s before publishing so posts don't land on the exact slot minute.
pub async fn apply_random_delay<R: Rng + ?Sized>(enabled: bool, rng: &mut R) -> Duration {
    if !enabled {
        info!("Delay disabled, proceeding immediately.");
        return Duration::ZERO;
    }

    let delay = pick_delay(rng);
    info!("Delaying execution by {} seconds", delay.as_secs());
    println!("Delaying execution by {} seconds for human-like variability...", delay.as_secs());
    tokio::time::sleep(delay).await;
    delay
}

/// Apply the delay, then read `clock`, so the returned time is when publishing actually starts.
pub async fn delay_then_now<R, C>(enabled: bool, rng: &mut R, clock: C) -> DateTime<Utc>
where
    R: Rng + ?Sized,
    C: Fn() -> DateTime<Utc>,
{
    apply_random_delay(enabled, rng).await;
    clock()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn delay_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..500 {
            assert!(pick_delay(&mut rng).as_secs() <= MAX_DELAY_SECS);
        }
    }

    #[tokio::test]
    async fn disabled_delay_returns_immediately() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(apply_random_delay(false, &mut rng).await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn time_is_read_after_the_delay() {
        use chrono::TimeZone;

        let base = Utc.with_ymd_and_hms(2026, 10, 15, 13, 12, 0).unwrap();
        let started = tokio::time::Instant::now();
        let clock = || base + chrono::Duration::from_std(started.elapsed()).unwrap();

        let expected = pick_delay(&mut StdRng::seed_from_u64(9));
        let at = delay_then_now(true, &mut StdRng::seed_from_u64(9), clock).await;

        let waited = (at - base).to_std().unwrap();
        assert!(waited >= expected);
        assert!(waited < expected + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn enabled_delay_sleeps_for_the_picked_duration() {
        let expected = pick_delay(&mut StdRng::seed_from_u64(4));

        let started = tokio::time::Instant::now();
        let slept = apply_random_delay(true, &mut StdRng::seed_from_u64(4)).await;

        assert_eq!(slept, expected);
        assert!(started.elapsed() >= expected);
    }
}
