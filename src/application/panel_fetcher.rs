// Panel fetch pipeline - renders every panel of a dashboard to disk
//
// A fixed number of workers drain a shared job queue. Every job runs to
// completion; failures are collected and reported together once all workers
// have finished, so images that did render stay on disk.
use crate::application::grafana_client::GrafanaClient;
use crate::domain::dashboard::{Dashboard, Panel};
use crate::domain::time_range::TimeRange;
use crate::domain::variables::Variables;
use anyhow::{anyhow, Context};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

pub const DEFAULT_WORKERS: usize = 5;

/// One panel to render, with everything the client needs to request it.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub panel: Panel,
    pub dashboard_id: Arc<str>,
    pub time_range: TimeRange,
    pub variables: Arc<Variables>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RemoteFetch,
    LocalIo,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::RemoteFetch => f.write_str("fetching image"),
            FailureKind::LocalIo => f.write_str("writing image"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("panel {panel_id}: {kind}: {cause:#}")]
pub struct PanelFailure {
    pub panel_id: i64,
    pub kind: FailureKind,
    pub cause: anyhow::Error,
}

/// Every panel failure of one pipeline run, ordered by panel id.
#[derive(Debug, thiserror::Error)]
#[error("{} of {total} panel images failed: {}", .failures.len(), join_failures(.failures))]
pub struct FetchError {
    pub total: usize,
    pub failures: Vec<PanelFailure>,
}

impl FetchError {
    pub fn failed_panels(&self) -> Vec<i64> {
        self.failures.iter().map(|f| f.panel_id).collect()
    }
}

fn join_failures(failures: &[PanelFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type FetchResult = Result<PathBuf, PanelFailure>;

#[derive(Clone)]
pub struct PanelFetcher {
    client: Arc<dyn GrafanaClient>,
    workers: usize,
}

impl PanelFetcher {
    pub fn new(client: Arc<dyn GrafanaClient>, workers: usize) -> Self {
        Self {
            client,
            workers: workers.max(1),
        }
    }

    /// Render every panel of `dashboard` into `image_dir` as `image<id>.png`.
    pub async fn fetch(
        &self,
        dashboard: &Dashboard,
        dashboard_id: &str,
        time_range: &TimeRange,
        image_dir: &Path,
    ) -> Result<(), FetchError> {
        let total = dashboard.panels.len();
        if total == 0 {
            return Ok(());
        }

        let worker_count = self.workers.min(total);
        let (job_tx, job_rx) = mpsc::channel::<FetchJob>(worker_count);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (failure_tx, mut failure_rx) = mpsc::unbounded_channel::<PanelFailure>();

        tracing::debug!(dashboard_id, panels = total, workers = worker_count, "Fetching panel images");

        let handles: Vec<_> = (0..worker_count)
            .map(|worker| {
                let jobs = job_rx.clone();
                let failures = failure_tx.clone();
                let client = self.client.clone();
                let image_dir = image_dir.to_path_buf();

                tokio::spawn(async move {
                    loop {
                        let job = jobs.lock().await.recv().await;
                        let Some(job) = job else { break };

                        match fetch_panel(client.as_ref(), &job, &image_dir).await {
                            Ok(path) => {
                                tracing::debug!(worker, panel_id = job.panel.id, path = %path.display(), "Panel image written");
                            }
                            Err(failure) => {
                                tracing::warn!(worker, panel_id = job.panel.id, "Error creating image for panel: {failure}");
                                let _ = failures.send(failure);
                            }
                        }
                    }
                })
            })
            .collect();
        drop(failure_tx);

        let dashboard_id: Arc<str> = Arc::from(dashboard_id);
        let variables = Arc::new(dashboard.variables.clone());
        for panel in &dashboard.panels {
            let job = FetchJob {
                panel: panel.clone(),
                dashboard_id: dashboard_id.clone(),
                time_range: time_range.clone(),
                variables: variables.clone(),
            };
            if job_tx.send(job).await.is_err() {
                break;
            }
        }
        drop(job_tx);

        for handle in futures::future::join_all(handles).await {
            if let Err(err) = handle {
                if err.is_panic() {
                    std::panic::resume_unwind(err.into_panic());
                }
            }
        }

        let mut failures = Vec::new();
        while let Some(failure) = failure_rx.recv().await {
            failures.push(failure);
        }

        if failures.is_empty() {
            return Ok(());
        }
        failures.sort_by_key(|f| f.panel_id);
        Err(FetchError { total, failures })
    }
}

async fn fetch_panel(client: &dyn GrafanaClient, job: &FetchJob, image_dir: &Path) -> FetchResult {
    let panel_id = job.panel.id;
    let remote = |cause| PanelFailure {
        panel_id,
        kind: FailureKind::RemoteFetch,
        cause,
    };
    let local = |cause| PanelFailure {
        panel_id,
        kind: FailureKind::LocalIo,
        cause,
    };

    let image = client.get_panel_png(job).await.map_err(remote)?;

    tokio::fs::create_dir_all(image_dir)
        .await
        .with_context(|| format!("creating image directory {}", image_dir.display()))
        .map_err(local)?;

    let path = image_dir.join(job.panel.image_file_name());
    tokio::fs::write(&path, &image)
        .await
        .map_err(|e| local(anyhow!(e).context(format!("writing {}", path.display()))))?;

    Ok(path)
}
