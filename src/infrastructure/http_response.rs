// HTTP response utilities for streaming finished reports
use crate::infrastructure::workspace::Workspace;
use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode},
    response::IntoResponse,
};
use bytes::BytesMut;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// `inline` disposition naming the download after the dashboard title.
/// HTTP headers should be ASCII, so everything else is escaped.
pub fn content_disposition(title: &str) -> String {
    format!("inline; filename=\"{}.pdf\"", title.escape_default())
}

/// Stream the PDF at `pdf` and remove `workspace` once the body is done,
/// whether it was sent in full or the client went away.
pub fn pdf_response(title: &str, pdf: PathBuf, workspace: Workspace) -> Response<Body> {
    let disposition = content_disposition(title);
    tracing::debug!(%disposition, "Extracted filename from dashboard title");

    let mut guard = CleanupOnDrop(Some(workspace));
    let stream = async_stream::stream! {
        match tokio::fs::File::open(&pdf).await {
            Ok(mut file) => loop {
                let mut chunk = BytesMut::with_capacity(CHUNK_SIZE);
                match file.read_buf(&mut chunk).await {
                    Ok(0) => break,
                    Ok(_) => yield Ok(chunk.freeze()),
                    Err(e) => {
                        tracing::error!("Error copying report to response: {}", e);
                        yield Err(e);
                        break;
                    }
                }
            },
            Err(e) => {
                tracing::error!(path = %pdf.display(), "Error opening report: {}", e);
                yield Err(e);
            }
        }

        if let Some(workspace) = guard.0.take() {
            clean(workspace).await;
        }
    };

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf");
    let response = match HeaderValue::from_str(&disposition) {
        Ok(value) => response.header(header::CONTENT_DISPOSITION, value),
        Err(_) => response,
    };

    response
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn clean(workspace: Workspace) {
    match workspace.clean().await {
        Ok(()) => tracing::debug!(path = %workspace.path().display(), "Removed workspace"),
        Err(e) => tracing::warn!(path = %workspace.path().display(), "Error removing workspace: {}", e),
    }
}

struct CleanupOnDrop(Option<Workspace>);

impl Drop for CleanupOnDrop {
    fn drop(&mut self) {
        let Some(workspace) = self.0.take() else { return };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(clean(workspace));
        }
    }
}
