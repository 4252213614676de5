// Compiler trait turning an assembled document into a PDF
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Draft,
    Final,
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pass::Draft => f.write_str("preprocessing"),
            Pass::Final => f.write_str("final"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("LaTeX {pass} pass failed ({status}) with output: {output}")]
    Failed {
        pass: Pass,
        status: String,
        output: String,
    },

    #[error("LaTeX finished but produced no PDF at {}", path.display())]
    MissingOutput { path: PathBuf },
}

#[async_trait]
pub trait DocumentCompiler: Send + Sync {
    /// Compile `document` (a file name inside `workspace`) and return the
    /// path of the produced PDF.
    async fn compile(&self, workspace: &Path, document: &str) -> Result<PathBuf, CompileError>;
}
