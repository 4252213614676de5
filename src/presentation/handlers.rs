// HTTP request handlers
use crate::application::report_error::ReportError;
use crate::application::report_service::ReportRequest;
use crate::domain::time_range::TimeRange;
use crate::domain::variables::Variables;
use crate::infrastructure::grafana_api::ApiVersion;
use crate::infrastructure::http_response::pdf_response;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;

const BANNER: &str = "This is grafana-reporter.\n\
The API endpoints are:\n\
  GET /api/report/:dashId     (Grafana v4 and older, dashboard slug)\n\
  GET /api/v5/report/:dashId  (Grafana v5+, dashboard uid)\n\
Query parameters: from, to, timezone, apitoken, template, var-<name>\n";

/// Two report routes so both Grafana v4 and v5 APIs are served.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(health_check))
        .route("/api/report/:dash_id", get(report_v4))
        .route("/api/v5/report/:dash_id", get(report_v5))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn index() -> &'static str {
    BANNER
}

pub async fn report_v4(
    Path(dash_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    State(state): State<Arc<AppState>>,
) -> Response {
    serve_report(&state, dash_id, params, ApiVersion::V4).await
}

pub async fn report_v5(
    Path(dash_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    State(state): State<Arc<AppState>>,
) -> Response {
    serve_report(&state, dash_id, params, ApiVersion::V5).await
}

async fn serve_report(
    state: &AppState,
    dash_id: String,
    params: Vec<(String, String)>,
    api_version: ApiVersion,
) -> Response {
    let request = report_request(dash_id, params);
    tracing::info!(
        dashboard_id = %request.dashboard_id,
        time_range = %request.time_range,
        timezone = request.timezone.as_deref().unwrap_or("UTC"),
        ?api_version,
        variables = request.variables.pairs().count(),
        "Reporter called"
    );

    let mut report = match state.report_service.new_report(request, api_version).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Error preparing report: {}", e);
            return error_response(&e);
        }
    };

    match report.generate().await {
        Ok(pdf) => {
            let title = report.title().to_string();
            pdf_response(&title, pdf, report.into_workspace())
        }
        Err(e) => {
            tracing::error!("Error generating report: {}", e);
            report.clean().await;
            error_response(&e)
        }
    }
}

fn error_response(e: &ReportError) -> Response {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, e.to_string()).into_response()
}

fn report_request(dashboard_id: String, params: Vec<(String, String)>) -> ReportRequest {
    let single = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
    };

    ReportRequest {
        time_range: TimeRange::new(
            single("from").unwrap_or_default(),
            single("to").unwrap_or_default(),
        ),
        template: single("template"),
        api_token: single("apitoken"),
        timezone: single("timezone"),
        variables: Variables::from_query(params.iter().cloned()),
        dashboard_id,
    }
}
