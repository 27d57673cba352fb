use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Politeness delay between outbound requests of one kind.
///
/// The first call never waits. Later calls wait until `interval` has elapsed
/// since the previous call returned, so a slow call still gets its pause.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until the pause after the previous call has run out
    pub async fn wait(&mut self) {
        if let Some(last) = self.last {
            sleep_until(last + self.interval).await;
        }
    }

    /// Record that a call just returned
    pub fn done(&mut self) {
        self.last = Some(Instant::now());
    }

    /// Wait for the pause, drive `call` to completion, then start the next pause
    pub async fn run<F: Future>(&mut self, call: F) -> F::Output {
        self.wait().await;
        let output = call.await;
        self.done();
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let mut throttle = Throttle::new(Duration::from_secs(2));
        let start = Instant::now();
        throttle.run(async {}).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instant_calls_are_spaced() {
        let mut throttle = Throttle::new(Duration::from_secs(1));
        let start = Instant::now();
        throttle.run(async {}).await;
        throttle.run(async {}).await;
        throttle.run(async {}).await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_still_gets_full_pause() {
        let mut throttle = Throttle::new(Duration::from_secs(1));
        throttle.run(sleep(Duration::from_millis(1500))).await;
        let call_returned = Instant::now();

        let started = throttle.run(async { Instant::now() }).await;
        assert_eq!(started - call_returned, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_between_calls_counts_toward_pause() {
        let mut throttle = Throttle::new(Duration::from_secs(1));
        throttle.run(async {}).await;
        sleep(Duration::from_secs(5)).await;
        let before = Instant::now();
        throttle.run(async {}).await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }
}
