//! Periodic cycle trigger.

use crate::state::AppState;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Spawns the timer that runs a cycle every `period`.
///
/// Returns `None` when `period` is zero. Ticks missed while a cycle is still
/// running are skipped, so one timer never stacks cycles.
pub fn spawn(state: AppState, period: Duration, run_on_startup: bool) -> Option<JoinHandle<()>> {
    if period.is_zero() {
        tracing::info!("cycle timer disabled");
        return None;
    }

    let start = if run_on_startup {
        Instant::now()
    } else {
        Instant::now() + period
    };

    tracing::info!(period_secs = period.as_secs(), run_on_startup, "cycle timer started");
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let report = state.run_cycle().await;
            tracing::debug!(cycle = %report.id, "scheduled cycle done");
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use phnix_issuer::{CycleReport, CycleRunner};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingRunner {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl CycleRunner for CountingRunner {
        async fn run_cycle(&self) -> CycleReport {
            self.runs.fetch_add(1, Ordering::SeqCst);
            CycleReport::start().finish()
        }
    }

    fn state() -> (Arc<CountingRunner>, AppState) {
        let runner = Arc::new(CountingRunner::default());
        (
            Arc::clone(&runner),
            AppState::new(runner as Arc<dyn CycleRunner>),
        )
    }

    #[tokio::test]
    async fn zero_period_disables_the_timer() {
        let (_, state) = state();
        assert!(spawn(state, Duration::ZERO, true).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn runs_every_period() {
        let (runner, state) = state();
        let handle = spawn(state.clone(), Duration::from_secs(120), false).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(240)).await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 3);
        assert!(state.last_report().is_some());

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn run_on_startup_fires_immediately() {
        let (runner, state) = state();
        let handle = spawn(state, Duration::from_secs(120), true).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);

        handle.abort();
    }
}
