use crate::application::panel_fetcher::DEFAULT_WORKERS;
use crate::infrastructure::grafana_api::{ApiVersion, ClientSettings};
use crate::infrastructure::pdflatex::DEFAULT_PROGRAM;
use crate::infrastructure::retry::RetryPolicy;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/reporter";
const ENV_PREFIX: &str = "REPORTER";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub grafana: GrafanaSettings,
    pub server: ServerSettings,
    pub report: ReportSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GrafanaSettings {
    pub url: String,
    pub api_version: ApiVersion,
    pub ssl_check: bool,
    pub grid_layout: bool,
    pub api_token: Option<String>,
    /// Per-request limit in seconds, at least 1.
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for GrafanaSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
            api_version: ApiVersion::default(),
            ssl_check: true,
            grid_layout: false,
            api_token: None,
            timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

impl GrafanaSettings {
    /// Client settings for one request. A request token wins over the
    /// configured one.
    pub fn client_settings(&self, api_version: ApiVersion, api_token: Option<String>) -> ClientSettings {
        ClientSettings {
            base_url: self.url.clone(),
            api_token: api_token.or_else(|| self.api_token.clone()),
            api_version,
            ssl_check: self.ssl_check,
            grid_layout: self.grid_layout,
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            retry: self.retry.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub listen: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8686)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReportSettings {
    pub templates_dir: PathBuf,
    pub workspace_root: PathBuf,
    pub fetch_workers: usize,
    pub latex_program: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            workspace_root: PathBuf::from("tmp"),
            fetch_workers: DEFAULT_WORKERS,
            latex_program: DEFAULT_PROGRAM.to_string(),
        }
    }
}

/// Load settings from an optional file at `path` (any extension the config
/// crate understands) overlaid with `REPORTER__SECTION__KEY` variables.
pub fn load_config(path: &str) -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut config: AppConfig = settings.try_deserialize()?;
    config.report.fetch_workers = config.report.fetch_workers.max(1);
    Ok(config)
}
