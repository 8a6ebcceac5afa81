use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    config::Config,
    constants::WARNING_LEVEL,
    core::{
        domain::{ArtifactHandle, BuildRequest, CompileResult, Diagnostic, OutputMode},
        traits::backend::{
            Backend, BackendError, BackendFault, BackendOutput, CompilerParameters, OutputTarget,
            Severity, SourceInput,
        },
    },
};

/// The request cannot be handed to a backend at all.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("No source to compile: source file {file:?} does not exist and no source text was given")]
    NoSource { file: Option<PathBuf> },
    #[error("Output path for {mode:?} is empty")]
    EmptyOutputPath { mode: OutputMode },
}

/// Turns build requests into backend calls and normalizes what comes back.
///
/// Holds no per-compile state. The only thing shared between calls is the
/// table of per-path locks that serializes compiles writing the same file.
#[derive(Debug)]
pub struct Orchestrator {
    backend: Arc<dyn Backend>,
    compile_timeout: Option<Duration>,
    output_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            compile_timeout: None,
            output_locks: DashMap::new(),
        }
    }

    pub fn with_config(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self::new(backend).with_timeout(config.compile_timeout)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.compile_timeout = timeout;
        self
    }

    #[tracing::instrument(skip(self))]
    pub async fn compile(&self, request: &BuildRequest) -> CompileResult {
        let params = match compiler_parameters(request) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!("Rejected build request: {}", e);
                return CompileResult::aborted(e.to_string());
            }
        };
        let source = match select_source(request).await {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("Rejected build request: {}", e);
                return CompileResult::aborted(e.to_string());
            }
        };

        let lock_key = params.output.path().map(|path| output_lock_key(path));
        let guard = match &lock_key {
            Some(key) => Some(self.lock_output(key).await),
            None => None,
        };

        tracing::debug!("Start compiling: params={:?}, source={:?}", params, source);
        let compilation_result = self.run_backend(&params, &source).await;
        tracing::debug!("Compilation result: {:?}", compilation_result);

        drop(guard);
        if let Some(key) = &lock_key {
            self.release_output(key);
        }

        match compilation_result {
            Ok(output) => into_compile_result(request.output_mode(), &params.output, output),
            Err(e) => {
                tracing::error!("Backend fault during compilation: {}", e);
                CompileResult::aborted(e.to_string())
            }
        }
    }

    async fn run_backend(
        &self,
        params: &CompilerParameters,
        source: &SourceInput,
    ) -> Result<BackendOutput, BackendFault> {
        let compile_future = self.backend.compile(params, source);
        match self.compile_timeout {
            Some(limit) => match tokio::time::timeout(limit, compile_future).await {
                Ok(result) => result,
                Err(_) => Err(BackendFault::TimedOut {
                    ms: limit.as_millis(),
                }),
            },
            None => compile_future.await,
        }
    }

    async fn lock_output(&self, path: &Path) -> OwnedMutexGuard<()> {
        let lock = self
            .output_locks
            .entry(path.to_path_buf())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Drops the lock entry once nobody holds or waits on it.
    fn release_output(&self, key: &Path) {
        self.output_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// `out.so` and `./out.so` must share one lock.
fn output_lock_key(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn compiler_parameters(request: &BuildRequest) -> Result<CompilerParameters, RequestError> {
    let mode = request.output_mode();
    let output = match (mode, request.output_path()) {
        (OutputMode::InMemoryLibrary, _) => OutputTarget::InMemory,
        (_, Some(path)) if path.as_os_str().is_empty() => {
            return Err(RequestError::EmptyOutputPath { mode });
        }
        (OutputMode::OnDiskLibrary, Some(path)) => OutputTarget::Library(path.into()),
        (OutputMode::OnDiskExecutable, Some(path)) => OutputTarget::Executable(path.into()),
        (_, None) => return Err(RequestError::EmptyOutputPath { mode }),
    };

    Ok(CompilerParameters {
        output,
        include_debug_information: true,
        warning_level: WARNING_LEVEL,
        treat_warnings_as_errors: false,
        optimize: true,
        referenced_dependencies: request.referenced_dependencies.clone(),
        embedded_resources: request.embedded_resources.clone(),
    })
}

/// The file wins only if it exists right now. The backend reads it later,
/// so the check and the read are not atomic.
async fn select_source(request: &BuildRequest) -> Result<SourceInput, RequestError> {
    if let Some(file) = &request.source_file {
        if tokio::fs::try_exists(file).await.unwrap_or(false) {
            return Ok(SourceInput::File(file.clone()));
        }
        tracing::debug!("Source file {} does not exist, using source text", file.display());
    }

    match &request.source_text {
        Some(text) if !text.is_empty() => Ok(SourceInput::Text(text.clone())),
        _ => Err(RequestError::NoSource {
            file: request.source_file.clone(),
        }),
    }
}

fn into_compile_result(
    mode: OutputMode,
    output: &OutputTarget,
    backend_output: BackendOutput,
) -> CompileResult {
    let diagnostics: Vec<Diagnostic> = backend_output
        .errors
        .into_iter()
        .filter(|e| e.severity == Severity::Error)
        .map(Into::into)
        .collect();

    if !diagnostics.is_empty() {
        return CompileResult::failed(diagnostics);
    }

    match backend_output.module {
        Some(module) => {
            CompileResult::succeeded(ArtifactHandle::new(mode, output.path().cloned(), module))
        }
        None => CompileResult::aborted("Backend reported no errors but produced no artifact"),
    }
}

impl From<BackendError> for Diagnostic {
    fn from(error: BackendError) -> Self {
        Self {
            line: error.line,
            column: error.column,
            code: error.code,
            message: error.message,
        }
    }
}
