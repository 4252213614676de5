// Top-level error of a report run
use crate::application::document_compiler::CompileError;
use crate::application::panel_fetcher::FetchError;
use crate::application::template::TemplateError;
use crate::domain::time_range::TimeSpecError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    MalformedTime(#[from] TimeSpecError),

    #[error("unknown time zone \"{0}\"")]
    UnknownTimezone(String),

    #[error("error getting dashboard {dashboard_id}: {cause:#}")]
    Dashboard {
        dashboard_id: String,
        cause: anyhow::Error,
    },

    #[error("error getting panels: {0}")]
    Fetch(#[from] FetchError),

    #[error("error parsing template: {0}")]
    Template(#[from] TemplateError),

    #[error("error compiling report: {0}")]
    Compilation(#[from] CompileError),

    #[error("workspace {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not create Grafana client: {0:#}")]
    Client(anyhow::Error),
}

impl ReportError {
    /// True when the request itself was at fault rather than a collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ReportError::MalformedTime(_) | ReportError::UnknownTimezone(_))
    }
}
