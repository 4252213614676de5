// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod grafana_api;
pub mod http_response;
pub mod pdflatex;
pub mod retry;
pub mod workspace;
