use parking_lot::RwLock;
use phnix_issuer::{CycleReport, CycleRunner};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

#[derive(Clone)]
pub struct AppState {
    runner: Arc<dyn CycleRunner>,
    last_report: Arc<RwLock<Option<CycleReport>>>,
}

impl AppState {
    pub fn new(runner: Arc<dyn CycleRunner>) -> Self {
        Self {
            runner,
            last_report: Arc::new(RwLock::new(None)),
        }
    }

    /// Runs a cycle and keeps its report as the latest one.
    pub async fn run_cycle(&self) -> CycleReport {
        let report = self.runner.run_cycle().await;
        *self.last_report.write() = Some(report.clone());
        report
    }

    /// Starts a cycle in the background. Overlapping cycles are allowed.
    pub fn spawn_cycle(&self) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(
            async move {
                state.run_cycle().await;
            }
            .in_current_span(),
        )
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().clone()
    }
}
