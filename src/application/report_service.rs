// Report service - orchestrates one report run from request to PDF
use crate::application::document::assemble;
use crate::application::document_compiler::DocumentCompiler;
use crate::application::grafana_client::GrafanaClient;
use crate::application::panel_fetcher::PanelFetcher;
use crate::application::report_error::ReportError;
use crate::application::templates;
use crate::domain::time_range::TimeRange;
use crate::domain::variables::Variables;
use crate::infrastructure::config::{GrafanaSettings, ReportSettings};
use crate::infrastructure::grafana_api::{ApiVersion, ClientSettings};
use crate::infrastructure::workspace::{Workspace, DOCUMENT_FILE};
use chrono::Utc;
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builds a Grafana client for one request's settings.
pub type ClientFactory =
    Arc<dyn Fn(ClientSettings) -> anyhow::Result<Arc<dyn GrafanaClient>> + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub dashboard_id: String,
    pub time_range: TimeRange,
    /// Name of a template in the templates directory, without `.tex`.
    pub template: Option<String>,
    pub variables: Variables,
    pub api_token: Option<String>,
    /// IANA zone name relative times are resolved in; UTC when absent.
    pub timezone: Option<String>,
}

#[derive(Clone)]
pub struct ReportService {
    client_factory: ClientFactory,
    compiler: Arc<dyn DocumentCompiler>,
    grafana: GrafanaSettings,
    report: ReportSettings,
}

impl ReportService {
    pub fn new(
        client_factory: ClientFactory,
        compiler: Arc<dyn DocumentCompiler>,
        grafana: GrafanaSettings,
        report: ReportSettings,
    ) -> Self {
        Self {
            client_factory,
            compiler,
            grafana,
            report,
        }
    }

    /// Set up a report run: client, template and a fresh workspace. Nothing
    /// is fetched until [`Report::generate`].
    pub async fn new_report(
        &self,
        request: ReportRequest,
        api_version: ApiVersion,
    ) -> Result<Report, ReportError> {
        let timezone = parse_timezone(request.timezone.as_deref())?;
        let settings = self
            .grafana
            .client_settings(api_version, request.api_token.clone());
        let client = (self.client_factory)(settings).map_err(ReportError::Client)?;

        let template = load_template(
            &self.report.templates_dir,
            request.template.as_deref(),
            self.grafana.grid_layout,
        )
        .await;

        let workspace = Workspace::create(&self.report.workspace_root)
            .await
            .map_err(|source| ReportError::Workspace {
                path: self.report.workspace_root.clone(),
                source,
            })?;

        Ok(Report {
            client,
            compiler: self.compiler.clone(),
            workers: self.report.fetch_workers,
            dashboard_id: request.dashboard_id,
            time_range: request.time_range,
            timezone,
            variables: request.variables,
            template,
            workspace,
            title: String::new(),
        })
    }
}

/// One report run. Owns its workspace exclusively; call [`Report::clean`]
/// (or hand the workspace on) once done with the PDF.
pub struct Report {
    client: Arc<dyn GrafanaClient>,
    compiler: Arc<dyn DocumentCompiler>,
    workers: usize,
    dashboard_id: String,
    time_range: TimeRange,
    timezone: Tz,
    variables: Variables,
    template: String,
    workspace: Workspace,
    title: String,
}

impl Report {
    /// Fetch the dashboard and its panels, assemble the document and compile
    /// it. Returns the path of the PDF inside the workspace.
    pub async fn generate(&mut self) -> Result<PathBuf, ReportError> {
        let range = self.time_range.resolve(&Utc::now().with_timezone(&self.timezone))?;
        tracing::info!(
            dashboard_id = %self.dashboard_id,
            time_range = %self.time_range,
            timezone = %self.timezone,
            "Generating report"
        );

        let dashboard = self
            .client
            .get_dashboard(&self.dashboard_id, &self.variables)
            .await
            .map_err(|cause| ReportError::Dashboard {
                dashboard_id: self.dashboard_id.clone(),
                cause,
            })?;
        self.title = dashboard.title.clone();

        PanelFetcher::new(self.client.clone(), self.workers)
            .fetch(&dashboard, &self.dashboard_id, &self.time_range, &self.workspace.image_dir())
            .await?;

        let document = assemble(&dashboard, &range, &self.template)?;
        let document_path = self.workspace.document_path();
        tokio::fs::write(&document_path, document.as_str())
            .await
            .map_err(|source| ReportError::Workspace {
                path: document_path,
                source,
            })?;

        let pdf = self.compiler.compile(self.workspace.path(), DOCUMENT_FILE).await?;
        tracing::info!(dashboard_id = %self.dashboard_id, title = %self.title, "Report generated");
        Ok(pdf)
    }

    /// Dashboard title, known once [`Report::generate`] fetched it.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn into_workspace(self) -> Workspace {
        self.workspace
    }

    pub async fn clean(&self) {
        if let Err(e) = self.workspace.clean().await {
            tracing::warn!(path = %self.workspace.path().display(), "Error cleaning up workspace: {}", e);
        }
    }
}

fn parse_timezone(name: Option<&str>) -> Result<Tz, ReportError> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        None => Ok(Tz::UTC),
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| ReportError::UnknownTimezone(name.to_string())),
    }
}

/// Text of the named template, or the built-in one when no usable name is
/// given or the file can't be read.
async fn load_template(templates_dir: &Path, name: Option<&str>, grid_layout: bool) -> String {
    let builtin = || templates::builtin(grid_layout).to_string();

    let Some(name) = name.filter(|n| !n.is_empty()) else {
        return builtin();
    };
    if name.contains(['/', '\\']) || name.contains("..") {
        tracing::warn!(template = name, "Ignoring template name outside the templates directory");
        return builtin();
    }

    let path = templates_dir.join(format!("{name}.tex"));
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => {
            tracing::info!(path = %path.display(), "Using template");
            text
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "Error reading template file: {}", e);
            builtin()
        }
    }
}
