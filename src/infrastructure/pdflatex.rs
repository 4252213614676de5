// pdflatex subprocess driver
use crate::application::document_compiler::{CompileError, DocumentCompiler, Pass};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub const DEFAULT_PROGRAM: &str = "pdflatex";

#[derive(Debug, Clone)]
pub struct LatexCompiler {
    program: String,
}

impl LatexCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run_pass(&self, workspace: &Path, document: &str, pass: Pass) -> Result<(), CompileError> {
        let mut command = Command::new(&self.program);
        command.arg("-halt-on-error");
        if pass == Pass::Draft {
            command.arg("-draftmode");
        }
        command.arg(document).current_dir(workspace).kill_on_drop(true);

        tracing::debug!(pass = %pass, program = %self.program, "Running LaTeX pass");
        let output = command.output().await.map_err(|source| CompileError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(CompileError::Failed {
                pass,
                status: output.status.to_string(),
                output: combined,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentCompiler for LatexCompiler {
    async fn compile(&self, workspace: &Path, document: &str) -> Result<PathBuf, CompileError> {
        self.run_pass(workspace, document, Pass::Draft).await?;
        self.run_pass(workspace, document, Pass::Final).await?;

        let stem = Path::new(document).file_stem().unwrap_or_default();
        let pdf = workspace.join(stem).with_extension("pdf");
        if !tokio::fs::try_exists(&pdf).await.unwrap_or(false) {
            return Err(CompileError::MissingOutput { path: pdf });
        }

        tracing::info!(path = %pdf.display(), "Compiled PDF");
        Ok(pdf)
    }
}
