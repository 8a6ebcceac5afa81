use std::path::PathBuf;
use std::sync::Arc;

use crate::core::traits::module::Module;

/// Backend-facing configuration derived from a build request.
#[derive(Clone, Debug, PartialEq)]
pub struct CompilerParameters {
    pub output: OutputTarget,
    pub include_debug_information: bool,
    pub warning_level: u8,
    pub treat_warnings_as_errors: bool,
    pub optimize: bool,
    pub referenced_dependencies: Vec<String>,
    pub embedded_resources: Vec<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OutputTarget {
    InMemory,
    Library(PathBuf),
    Executable(PathBuf),
}

impl OutputTarget {
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            OutputTarget::InMemory => None,
            OutputTarget::Library(path) | OutputTarget::Executable(path) => Some(path),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SourceInput {
    Text(String),
    File(PathBuf),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendError {
    pub severity: Severity,
    pub line: u32,
    pub column: u32,
    pub code: String,
    pub message: String,
}

/// What the backend handed back for a compilation it managed to attempt.
///
/// `module` is only meaningful when `errors` holds no error-severity entry.
#[derive(Clone, Debug)]
pub struct BackendOutput {
    pub errors: Vec<BackendError>,
    pub module: Option<Arc<dyn Module>>,
}

/// The backend could not even attempt the compilation.
#[derive(Clone, Debug, thiserror::Error)]
pub enum BackendFault {
    #[error("failed to launch compiler: {msg}")]
    Launch { msg: String },
    #[error("{msg}")]
    Io { msg: String },
    #[error("compiler failed without source diagnostics: {msg}")]
    Toolchain { msg: String },
    #[error("failed to load compiled artifact: {msg}")]
    Load { msg: String },
    #[error("compilation timed out after {ms} ms")]
    TimedOut { ms: u128 },
}

#[mockall::automock]
#[async_trait::async_trait]
pub trait Backend: std::fmt::Debug + Send + Sync {
    async fn compile(
        &self,
        params: &CompilerParameters,
        source: &SourceInput,
    ) -> Result<BackendOutput, BackendFault>;
}
