// Per-report scratch directory
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const IMAGE_DIR: &str = "images";
pub const DOCUMENT_FILE: &str = "report.tex";
pub const PDF_FILE: &str = "report.pdf";

/// A uniquely named directory owned by a single report run. Unrelated runs
/// never share one, so nothing inside needs locking.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub async fn create(parent: &Path) -> io::Result<Self> {
        let root = parent.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&root).await?;
        tracing::debug!(path = %root.display(), "Created workspace");
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn image_dir(&self) -> PathBuf {
        self.root.join(IMAGE_DIR)
    }

    pub fn document_path(&self) -> PathBuf {
        self.root.join(DOCUMENT_FILE)
    }

    pub fn pdf_path(&self) -> PathBuf {
        self.root.join(PDF_FILE)
    }

    /// Remove the directory and everything in it. Already gone is fine.
    pub async fn clean(&self) -> io::Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
