// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::grafana_client::GrafanaClient;
use crate::application::report_service::{ClientFactory, ReportService};
use crate::infrastructure::config::{load_config, AppConfig, DEFAULT_CONFIG_PATH};
use crate::infrastructure::grafana_api::{ClientSettings, GrafanaApi};
use crate::infrastructure::pdflatex::LatexCompiler;
use crate::presentation::app_state::AppState;
use crate::presentation::cli::{self, GenerateArgs};
use crate::presentation::handlers::router;

/// Renders Grafana dashboards into PDF reports.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Configuration file, extension optional
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve reports over HTTP.
    Serve {
        /// Overrides `server.listen`
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Generate a single report to a file and exit.
    Generate(GenerateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("grafana_reporter=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;

    match cli.command {
        Commands::Serve { listen } => {
            if let Some(listen) = listen {
                config.server.listen = listen;
            }
            serve(config).await
        }
        Commands::Generate(args) => {
            if let Some(url) = &args.grafana_url {
                config.grafana.url = url.clone();
            }
            config.grafana.grid_layout |= args.grid_layout;
            let api_version = args.api_version.unwrap_or(config.grafana.api_version);

            let service = report_service(&config);
            cli::run(&service, &args, api_version).await
        }
    }
}

fn report_service(config: &AppConfig) -> ReportService {
    let factory: ClientFactory =
        Arc::new(|settings: ClientSettings| -> anyhow::Result<Arc<dyn GrafanaClient>> {
            Ok(Arc::new(GrafanaApi::new(settings)?))
        });
    let compiler = Arc::new(LatexCompiler::new(config.report.latex_program.clone()));

    ReportService::new(factory, compiler, config.grafana.clone(), config.report.clone())
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        report_service: report_service(&config),
    });
    let app = router(state).layer(TraceLayer::new_for_http());

    let addr = config.server.listen;
    tracing::info!("Serving at {} and using grafana at {}", addr, config.grafana.url);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
