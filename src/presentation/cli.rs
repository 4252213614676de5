// One-shot report generation from the command line
use crate::application::report_service::{ReportRequest, ReportService};
use crate::domain::time_range::TimeRange;
use crate::domain::variables::{Variables, VARIABLE_PREFIX};
use crate::infrastructure::grafana_api::ApiVersion;
use anyhow::Context;
use std::path::PathBuf;

#[derive(Debug, clap::Args)]
pub struct GenerateArgs {
    /// Dashboard slug (v4) or uid (v5)
    #[arg(long, short = 'd')]
    pub dashboard: String,

    /// Start of the time range, e.g. `now-1d/d`
    #[arg(long, default_value = "")]
    pub from: String,

    /// End of the time range, e.g. `now`
    #[arg(long, default_value = "")]
    pub to: String,

    /// Time zone relative times are resolved in, e.g. `Europe/Berlin`
    #[arg(long)]
    pub timezone: Option<String>,

    /// Template name, read from `<templates_dir>/<name>.tex`
    #[arg(long)]
    pub template: Option<String>,

    /// Dashboard variable as `name=value`; repeatable
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_variable)]
    pub variables: Vec<(String, String)>,

    #[arg(long)]
    pub api_token: Option<String>,

    #[arg(long, value_enum)]
    pub api_version: Option<ApiVersion>,

    /// Overrides `grafana.url`
    #[arg(long)]
    pub grafana_url: Option<String>,

    /// Lay panels out using their dashboard grid positions
    #[arg(long)]
    pub grid_layout: bool,

    /// Where to write the PDF
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}

impl GenerateArgs {
    pub fn request(&self) -> ReportRequest {
        ReportRequest {
            dashboard_id: self.dashboard.clone(),
            time_range: TimeRange::new(self.from.as_str(), self.to.as_str()),
            template: self.template.clone(),
            variables: Variables::from_query(self.variables.iter().cloned()),
            api_token: self.api_token.clone(),
            timezone: self.timezone.clone(),
        }
    }
}

/// `name=value`, with the `var-` prefix added when missing.
fn parse_variable(arg: &str) -> Result<(String, String), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {arg:?}"))?;
    if name.is_empty() {
        return Err(format!("variable name missing in {arg:?}"));
    }
    let name = if name.starts_with(VARIABLE_PREFIX) {
        name.to_string()
    } else {
        format!("{VARIABLE_PREFIX}{name}")
    };
    Ok((name, value.to_string()))
}

/// Generate one report into `args.output`. The workspace is removed whether
/// or not generation succeeds.
pub async fn run(service: &ReportService, args: &GenerateArgs, api_version: ApiVersion) -> anyhow::Result<()> {
    let mut report = service.new_report(args.request(), api_version).await?;

    let result = async {
        let pdf = report.generate().await?;
        tokio::fs::copy(&pdf, &args.output)
            .await
            .with_context(|| format!("copying report to {}", args.output.display()))?;
        anyhow::Ok(())
    }
    .await;
    report.clean().await;
    result?;

    tracing::info!(output = %args.output.display(), title = report.title(), "Report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::document_compiler::{CompileError, DocumentCompiler};
    use crate::application::grafana_client::GrafanaClient;
    use crate::application::panel_fetcher::FetchJob;
    use crate::application::report_service::ClientFactory;
    use crate::domain::dashboard::Dashboard;
    use crate::infrastructure::config::{GrafanaSettings, ReportSettings};
    use crate::infrastructure::grafana_api::ClientSettings;
    use async_trait::async_trait;
    use bytes::Bytes;
    use clap::Parser;
    use std::path::Path;
    use std::sync::Arc;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: GenerateArgs,
    }

    struct EmptyDashboard;

    #[async_trait]
    impl GrafanaClient for EmptyDashboard {
        async fn get_dashboard(&self, _: &str, variables: &Variables) -> anyhow::Result<Dashboard> {
            Ok(Dashboard::new("Empty".into(), String::new(), Vec::new(), variables.clone()))
        }

        async fn get_panel_png(&self, _: &FetchJob) -> anyhow::Result<Bytes> {
            anyhow::bail!("no panels to render")
        }
    }

    struct CopyDocument;

    #[async_trait]
    impl DocumentCompiler for CopyDocument {
        async fn compile(&self, workspace: &Path, document: &str) -> Result<PathBuf, CompileError> {
            let pdf = workspace.join("report.pdf");
            std::fs::copy(workspace.join(document), &pdf).unwrap();
            Ok(pdf)
        }
    }

    #[test]
    fn test_parse_variable() {
        assert_eq!(parse_variable("host=web01"), Ok(("var-host".into(), "web01".into())));
        assert_eq!(parse_variable("var-host=a=b"), Ok(("var-host".into(), "a=b".into())));
        assert!(parse_variable("host").is_err());
        assert!(parse_variable("=x").is_err());
    }

    #[test]
    fn test_arguments_build_a_request() {
        let cli = TestCli::try_parse_from([
            "generate",
            "--dashboard",
            "testDash",
            "--from",
            "now-7d/d",
            "--var",
            "host=web01",
            "--var",
            "host=web02",
            "--api-version",
            "v4",
            "--timezone",
            "America/New_York",
            "-o",
            "out.pdf",
        ])
        .unwrap();

        assert_eq!(cli.args.api_version, Some(ApiVersion::V4));
        let request = cli.args.request();
        assert_eq!(request.dashboard_id, "testDash");
        assert_eq!(request.time_range, TimeRange::new("now-7d/d", "now"));
        assert_eq!(request.variables.summary(), "web01, web02");
        assert_eq!(request.template, None);
        assert_eq!(request.timezone.as_deref(), Some("America/New_York"));
    }

    fn service(tmp: &tempfile::TempDir) -> ReportService {
        let factory: ClientFactory =
            Arc::new(|_: ClientSettings| -> anyhow::Result<Arc<dyn GrafanaClient>> { Ok(Arc::new(EmptyDashboard)) });
        let report = ReportSettings {
            workspace_root: tmp.path().join("work"),
            ..ReportSettings::default()
        };
        ReportService::new(factory, Arc::new(CopyDocument), GrafanaSettings::default(), report)
    }

    #[tokio::test]
    async fn test_run_rejects_unknown_timezone() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("out.pdf");
        let cli = TestCli::try_parse_from([
            "generate",
            "-d",
            "testDash",
            "--timezone",
            "Nowhere/Special",
            "-o",
            output.to_str().unwrap(),
        ])
        .unwrap();

        let err = run(&service(&tmp), &cli.args, ApiVersion::V5).await.unwrap_err();
        assert!(err.to_string().contains("Nowhere/Special"), "{err}");
        assert!(!output.exists());
        assert!(!tmp.path().join("work").exists());
    }

    #[tokio::test]
    async fn test_run_writes_output_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(&tmp);

        let cli = TestCli::try_parse_from([
            "generate",
            "-d",
            "testDash",
            "-o",
            tmp.path().join("out.pdf").to_str().unwrap(),
        ])
        .unwrap();
        run(&service, &cli.args, ApiVersion::V5).await.unwrap();

        let written = std::fs::read_to_string(tmp.path().join("out.pdf")).unwrap();
        assert!(written.contains("Empty"));
        assert_eq!(std::fs::read_dir(tmp.path().join("work")).unwrap().count(), 0);
    }
}
