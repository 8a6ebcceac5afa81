use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use itertools::Itertools;
use tokio::{fs, process::Command};
use uuid::Uuid;

use crate::{
    config::Config,
    constants::RESOURCES_TABLE,
    core::traits::{
        backend::{
            Backend, BackendFault, BackendOutput, CompilerParameters, OutputTarget, SourceInput,
        },
        module::Module,
    },
    native::{
        diagnostics,
        library::{ExecutableModule, LibraryModule},
    },
};

/// Backend that drives `rustc` as a child process.
///
/// Libraries are built as `cdylib` and loaded into this process,
/// executables as `bin`. Everything written to the work directory is left
/// there after the build.
#[derive(Clone, Debug)]
pub struct RustcBackend {
    rustc_path: PathBuf,
    work_dir: PathBuf,
    edition: String,
}

impl RustcBackend {
    pub fn new(config: &Config) -> Self {
        Self {
            rustc_path: config.rustc_path.clone(),
            work_dir: config.work_dir.clone(),
            edition: config.edition.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Backend for RustcBackend {
    #[tracing::instrument(skip(self))]
    async fn compile(
        &self,
        params: &CompilerParameters,
        source: &SourceInput,
    ) -> Result<BackendOutput, BackendFault> {
        let build_id = Uuid::new_v4();
        fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| io_fault("Failed to create work directory", e))?;

        let source_path = self
            .materialize_source(build_id, source, &params.embedded_resources)
            .await?;
        let (output_path, crate_name) = self.output_layout(build_id, &params.output).await?;

        let mut cmd = Command::new(&self.rustc_path);
        cmd.arg(&source_path)
            .arg("--error-format=json")
            .arg("--edition")
            .arg(&self.edition)
            .arg("--crate-name")
            .arg(&crate_name)
            .arg("--crate-type")
            .arg(crate_type(&params.output))
            .args(lint_flags(params))
            .arg("-o")
            .arg(&output_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if params.include_debug_information {
            cmd.arg("-g");
        }
        if params.optimize {
            cmd.arg("-O");
        }
        for dependency in &params.referenced_dependencies {
            cmd.arg("--extern").arg(dependency);
        }

        tracing::debug!("Running {:?}", cmd);
        let out = cmd.output().await.map_err(|e| BackendFault::Launch {
            msg: format!("{}: {}", self.rustc_path.display(), e),
        })?;

        let stderr = String::from_utf8_lossy(&out.stderr);
        let parsed = diagnostics::parse(&stderr);

        if parsed.has_source_errors() {
            return Ok(BackendOutput {
                errors: parsed.entries,
                module: None,
            });
        }

        if !out.status.success() {
            let unlocated = parsed.errors().map(|e| e.message.as_str()).join("; ");
            let msg = if unlocated.is_empty() {
                format!("rustc exited with {}: {}", out.status, stderr.trim())
            } else {
                unlocated
            };
            return Err(BackendFault::Toolchain { msg });
        }

        let module = self.load_module(build_id, &params.output, &output_path).await?;

        Ok(BackendOutput {
            errors: parsed.entries,
            module: Some(module),
        })
    }
}

impl RustcBackend {
    /// Returns the file handed to rustc. A source file without resources is
    /// compiled in place, so diagnostics point at the caller's file.
    async fn materialize_source(
        &self,
        build_id: Uuid,
        source: &SourceInput,
        resources: &[PathBuf],
    ) -> Result<PathBuf, BackendFault> {
        let text = match (source, resources.is_empty()) {
            (SourceInput::File(path), true) => return Ok(path.clone()),
            (SourceInput::File(path), false) => fs::read_to_string(path)
                .await
                .map_err(|e| io_fault(&format!("Failed to read {}", path.display()), e))?,
            (SourceInput::Text(text), _) => text.clone(),
        };

        let mut contents = text;
        if !resources.is_empty() {
            contents.push_str(&resources_table(resources));
        }

        let source_path = self.work_dir.join(format!("{}.rs", build_id));
        fs::write(&source_path, contents)
            .await
            .map_err(|e| io_fault("Failed to write source file", e))?;

        Ok(source_path)
    }

    async fn output_layout(
        &self,
        build_id: Uuid,
        output: &OutputTarget,
    ) -> Result<(PathBuf, String), BackendFault> {
        match output {
            OutputTarget::InMemory => {
                let crate_name = format!("dyncode_{}", build_id.simple());
                let dir = self.work_dir.join(build_id.to_string());
                fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| io_fault("Failed to create output directory", e))?;
                let file_name = format!(
                    "{}{}{}",
                    std::env::consts::DLL_PREFIX,
                    crate_name,
                    std::env::consts::DLL_SUFFIX
                );
                Ok((dir.join(file_name), crate_name))
            }
            OutputTarget::Library(path) | OutputTarget::Executable(path) => {
                Ok((path.clone(), crate_name_for(path)))
            }
        }
    }

    async fn load_module(
        &self,
        build_id: Uuid,
        output: &OutputTarget,
        output_path: &Path,
    ) -> Result<Arc<dyn Module>, BackendFault> {
        let load_path = match output {
            OutputTarget::Executable(path) => {
                mark_executable(path).await?;
                return Ok(Arc::new(ExecutableModule::new(path)));
            }
            OutputTarget::InMemory => output_path.to_path_buf(),
            OutputTarget::Library(_) => self.private_copy(build_id, output_path).await?,
        };

        let module = tokio::task::spawn_blocking(move || LibraryModule::load(&load_path))
            .await
            .map_err(|e| BackendFault::Load { msg: e.to_string() })?
            .map_err(|e| BackendFault::Load { msg: e.to_string() })?;
        Ok(Arc::new(module))
    }

    /// The dynamic loader hands back an already mapped object for a path it
    /// has seen, so a rebuilt library is loaded from a copy under a fresh name.
    async fn private_copy(&self, build_id: Uuid, library: &Path) -> Result<PathBuf, BackendFault> {
        let dir = self.work_dir.join(build_id.to_string());
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_fault("Failed to create load directory", e))?;

        let file_name = format!(
            "{}dyncode_{}{}",
            std::env::consts::DLL_PREFIX,
            build_id.simple(),
            std::env::consts::DLL_SUFFIX
        );
        let copy = dir.join(file_name);
        fs::copy(library, &copy)
            .await
            .map_err(|e| io_fault(&format!("Failed to copy {}", library.display()), e))?;

        Ok(copy)
    }
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> Result<(), BackendFault> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)
        .await
        .map_err(|e| io_fault("Failed to stat executable", e))?
        .permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions)
        .await
        .map_err(|e| io_fault("Failed to mark executable", e))
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> Result<(), BackendFault> {
    Ok(())
}

fn crate_type(output: &OutputTarget) -> &'static str {
    match output {
        OutputTarget::Executable(_) => "bin",
        OutputTarget::InMemory | OutputTarget::Library(_) => "cdylib",
    }
}

fn lint_flags(params: &CompilerParameters) -> Vec<&'static str> {
    if params.treat_warnings_as_errors {
        vec!["-D", "warnings"]
    } else if params.warning_level == 0 {
        vec!["-A", "warnings"]
    } else {
        vec!["--cap-lints", "warn"]
    }
}

fn crate_name_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = stem.strip_prefix("lib").unwrap_or(&stem);
    let name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    match name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => name,
        _ => format!("dyncode_{}", name),
    }
}

/// Appended after the caller's source so its line numbers stay put.
fn resources_table(resources: &[PathBuf]) -> String {
    let entries = resources
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let absolute = std::path::absolute(path).unwrap_or_else(|_| path.clone());
            format!(
                "    ({:?}, include_bytes!({:?})),\n",
                name,
                absolute.to_string_lossy()
            )
        })
        .collect::<String>();

    format!(
        "\n#[allow(dead_code)]\npub static {}: &[(&str, &[u8])] = &[\n{}];\n",
        RESOURCES_TABLE, entries
    )
}

fn io_fault(context: &str, e: std::io::Error) -> BackendFault {
    BackendFault::Io {
        msg: format!("{}: {}", context, e),
    }
}
