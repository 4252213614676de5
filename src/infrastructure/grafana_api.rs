// Grafana HTTP API client
use crate::application::grafana_client::GrafanaClient;
use crate::application::panel_fetcher::FetchJob;
use crate::domain::dashboard::{Dashboard, DashboardDecodeError, Panel};
use crate::domain::variables::Variables;
use crate::infrastructure::retry::{is_retryable_status, retry_async, RetryPolicy};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, redirect, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Pixels per grid unit when rendering grid layouts.
const GRID_UNIT_PX: u32 = 40;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    /// Dashboards addressed by slug (Grafana 4 and older)
    V4,
    /// Dashboards addressed by uid (Grafana 5+)
    #[default]
    V5,
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub api_token: Option<String>,
    pub api_version: ApiVersion,
    pub ssl_check: bool,
    pub grid_layout: bool,
    /// Upper bound for one request, connect to last body byte.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, thiserror::Error)]
pub enum GrafanaError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("{url} redirected to {location}; is the API token valid?")]
    Redirected { url: String, location: String },

    #[error("dashboard from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: DashboardDecodeError,
    },
}

impl GrafanaError {
    fn is_retryable(&self) -> bool {
        match self {
            GrafanaError::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            GrafanaError::Status { status, .. } => is_retryable_status(status.as_u16()),
            GrafanaError::Redirected { .. } | GrafanaError::Decode { .. } => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GrafanaApi {
    http: reqwest::Client,
    settings: ClientSettings,
}

impl GrafanaApi {
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .danger_accept_invalid_certs(!settings.ssl_check)
            .timeout(settings.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let settings = ClientSettings {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            ..settings
        };
        Ok(Self { http, settings })
    }

    fn dashboard_url(&self, dashboard_id: &str, variables: &Variables) -> String {
        let id = urlencoding::encode(dashboard_id);
        match self.settings.api_version {
            ApiVersion::V4 => {
                let url = format!("{}/api/dashboards/db/{}", self.settings.base_url, id);
                if variables.is_empty() {
                    url
                } else {
                    format!("{}?{}", url, variables.to_query_string())
                }
            }
            ApiVersion::V5 => format!("{}/api/dashboards/uid/{}", self.settings.base_url, id),
        }
    }

    fn panel_url(&self, job: &FetchJob) -> String {
        let id = urlencoding::encode(&job.dashboard_id);
        let path = match self.settings.api_version {
            ApiVersion::V4 => format!("render/dashboard-solo/db/{}", id),
            ApiVersion::V5 => format!("render/d-solo/{}/_", id),
        };

        let (width, height) = self.panel_size(&job.panel);
        let mut query = vec![
            ("theme".to_string(), "light".to_string()),
            ("panelId".to_string(), job.panel.id.to_string()),
            ("from".to_string(), job.time_range.from().to_string()),
            ("to".to_string(), job.time_range.to().to_string()),
            ("width".to_string(), width.to_string()),
            ("height".to_string(), height.to_string()),
        ];
        query.extend(job.variables.pairs().map(|(k, v)| (k.to_string(), v.to_string())));

        let query = query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}/{}?{}", self.settings.base_url, path, query)
    }

    fn panel_size(&self, panel: &Panel) -> (u32, u32) {
        if self.settings.grid_layout {
            if let Some(grid) = panel.grid_pos {
                return (grid.w * GRID_UNIT_PX, grid.h * GRID_UNIT_PX);
            }
        }
        if panel.is_single_stat() {
            (300, 150)
        } else if panel.is_text() {
            (1000, 100)
        } else {
            (1000, 500)
        }
    }

    async fn get(&self, url: &str) -> Result<Bytes, GrafanaError> {
        let mut request = self.http.get(url);
        if let Some(token) = &self.settings.api_token {
            request = request.bearer_auth(token);
        }

        let transport = |source| GrafanaError::Transport {
            url: url.to_string(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            return Err(GrafanaError::Redirected {
                url: url.to_string(),
                location,
            });
        }
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(GrafanaError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }

        response.bytes().await.map_err(transport)
    }
}

#[async_trait]
impl GrafanaClient for GrafanaApi {
    async fn get_dashboard(&self, dashboard_id: &str, variables: &Variables) -> Result<Dashboard> {
        let url = self.dashboard_url(dashboard_id, variables);
        tracing::info!(dashboard_id, "Connecting to dashboard at {}", url);

        let body = self.get(&url).await?;
        let dashboard = Dashboard::from_json(&body, variables.clone())
            .map_err(|source| GrafanaError::Decode { url, source })?;

        tracing::debug!(
            dashboard_id,
            title = %dashboard.title,
            panels = dashboard.panels.len(),
            "Populated dashboard"
        );
        Ok(dashboard)
    }

    async fn get_panel_png(&self, job: &FetchJob) -> Result<Bytes> {
        let url = self.panel_url(job);
        tracing::debug!(panel_id = job.panel.id, "Downloading image {}", url);

        let operation = format!("render of panel {}", job.panel.id);
        let png = retry_async(
            &self.settings.retry,
            &operation,
            GrafanaError::is_retryable,
            || self.get(&url),
        )
        .await?;
        Ok(png)
    }
}
