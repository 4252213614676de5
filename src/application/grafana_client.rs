// Client trait for the Grafana HTTP API
use crate::application::panel_fetcher::FetchJob;
use crate::domain::dashboard::Dashboard;
use crate::domain::variables::Variables;
use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait GrafanaClient: Send + Sync {
    /// Fetch and decode a dashboard definition.
    async fn get_dashboard(&self, dashboard_id: &str, variables: &Variables)
        -> anyhow::Result<Dashboard>;

    /// Render one panel as a PNG. Retries, if any, happen in here.
    async fn get_panel_png(&self, job: &FetchJob) -> anyhow::Result<Bytes>;
}
