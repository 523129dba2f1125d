//! Runs participants on a bounded pool of blocking workers

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::app::ParticipantInteractor;
use crate::domain::model::ParticipantReport;
use crate::resolver::{AnalysisLayout, SourceCatalog};

pub struct BatchRunner {
    interactor: Arc<ParticipantInteractor>,
    layout: Arc<AnalysisLayout>,
    catalog: Arc<SourceCatalog>,
    jobs: usize,
}

impl BatchRunner {
    /// `jobs == 0` means one worker per CPU
    pub fn new(
        interactor: Arc<ParticipantInteractor>,
        layout: AnalysisLayout,
        catalog: SourceCatalog,
        jobs: usize,
    ) -> Self {
        Self {
            interactor,
            layout: Arc::new(layout),
            catalog: Arc::new(catalog),
            jobs: Self::effective_jobs(jobs),
        }
    }

    pub fn effective_jobs(jobs: usize) -> usize {
        if jobs == 0 {
            num_cpus::get().max(1)
        } else {
            jobs
        }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Process every participant, returning reports in input order.
    ///
    /// With one job participants run strictly one after another.
    pub async fn run(&self, participants: &[u32]) -> Vec<ParticipantReport> {
        info!(
            participants = participants.len(),
            jobs = self.jobs,
            "Starting batch"
        );
        let permits = Arc::new(Semaphore::new(self.jobs));
        let mut handles = Vec::with_capacity(participants.len());

        for &participant_id in participants {
            let permits = Arc::clone(&permits);
            let interactor = Arc::clone(&self.interactor);
            let layout = Arc::clone(&self.layout);
            let catalog = Arc::clone(&self.catalog);

            handles.push((
                participant_id,
                tokio::spawn(async move {
                    // The semaphore is never closed, so acquiring only waits
                    let _permit = permits.acquire_owned().await.ok();
                    tokio::task::spawn_blocking(move || {
                        interactor.run(&layout, &catalog, participant_id)
                    })
                    .await
                }),
            ));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (participant_id, handle) in handles {
            let report = match handle.await {
                Ok(Ok(report)) => report,
                Ok(Err(e)) | Err(e) => {
                    error!(participant = participant_id, "Worker failed: {}", e);
                    let mut report = ParticipantReport::new(participant_id);
                    report.finish(Some(format!("worker failed: {}", e)));
                    report
                }
            };
            reports.push(report);
        }

        let halted = reports.iter().filter(|r| r.is_halted()).count();
        info!(
            participants = reports.len(),
            halted,
            "Batch finished"
        );
        reports
    }
}
