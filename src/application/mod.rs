// Application layer - report pipeline and the traits it drives
pub mod document;
pub mod document_compiler;
pub mod grafana_client;
pub mod panel_fetcher;
pub mod report_error;
pub mod report_service;
pub mod template;
pub mod templates;
