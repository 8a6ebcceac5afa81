use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::traits::module::Module;

/// Immutable input of a single compilation.
///
/// Built with [`BuildRequest::builder`] and discarded after the compile call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildRequest {
    pub source_text: Option<String>,
    pub source_file: Option<PathBuf>,
    pub executable_path: Option<PathBuf>,
    pub library_path: Option<PathBuf>,
    pub embedded_resources: Vec<PathBuf>,
    pub referenced_dependencies: Vec<String>,
}

impl BuildRequest {
    pub fn builder() -> BuildRequestBuilder {
        BuildRequestBuilder::default()
    }

    /// An executable path takes priority over a library path.
    pub fn output_mode(&self) -> OutputMode {
        if self.executable_path.is_some() {
            OutputMode::OnDiskExecutable
        } else if self.library_path.is_some() {
            OutputMode::OnDiskLibrary
        } else {
            OutputMode::InMemoryLibrary
        }
    }

    pub fn output_path(&self) -> Option<&Path> {
        match self.output_mode() {
            OutputMode::OnDiskExecutable => self.executable_path.as_deref(),
            OutputMode::OnDiskLibrary => self.library_path.as_deref(),
            OutputMode::InMemoryLibrary => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BuildRequestBuilder {
    request: BuildRequest,
}

impl BuildRequestBuilder {
    pub fn source_text(mut self, text: impl Into<String>) -> Self {
        self.request.source_text = Some(text.into());
        self
    }

    pub fn source_file(mut self, path: impl AsRef<Path>) -> Self {
        self.request.source_file = Some(path.as_ref().into());
        self
    }

    pub fn executable_path(mut self, path: impl AsRef<Path>) -> Self {
        self.request.executable_path = Some(path.as_ref().into());
        self
    }

    pub fn library_path(mut self, path: impl AsRef<Path>) -> Self {
        self.request.library_path = Some(path.as_ref().into());
        self
    }

    pub fn embedded_resource(mut self, path: impl AsRef<Path>) -> Self {
        self.request.embedded_resources.push(path.as_ref().into());
        self
    }

    pub fn referenced_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.request.referenced_dependencies.push(dependency.into());
        self
    }

    pub fn build(self) -> BuildRequest {
        self.request
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputMode {
    InMemoryLibrary,
    OnDiskLibrary,
    OnDiskExecutable,
}

/// One error-level problem reported by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: u32,
    pub column: u32,
    pub code: String,
    pub message: String,
}

/// Outcome of one compilation.
///
/// Build it through [`CompileResult::succeeded`], [`CompileResult::failed`]
/// or [`CompileResult::aborted`] so the four fields never disagree.
#[derive(Debug)]
pub struct CompileResult {
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub artifact: Option<ArtifactHandle>,
    pub failure_message: Option<String>,
}

impl CompileResult {
    pub fn succeeded(artifact: ArtifactHandle) -> Self {
        Self {
            success: true,
            diagnostics: Vec::new(),
            artifact: Some(artifact),
            failure_message: None,
        }
    }

    /// `diagnostics` must not be empty.
    pub fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        debug_assert!(!diagnostics.is_empty());
        Self {
            success: false,
            diagnostics,
            artifact: None,
            failure_message: None,
        }
    }

    pub fn aborted(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostics: Vec::new(),
            artifact: None,
            failure_message: Some(msg.into()),
        }
    }
}

/// Loadable reference to compiled code.
///
/// Intentionally not `Clone`: the result that produced it owns it.
#[derive(Debug)]
pub struct ArtifactHandle {
    pub id: Uuid,
    pub mode: OutputMode,
    pub path: Option<PathBuf>,
    pub compiled_at: chrono::DateTime<chrono::Utc>,
    module: Arc<dyn Module>,
}

impl ArtifactHandle {
    pub fn new(mode: OutputMode, path: Option<PathBuf>, module: Arc<dyn Module>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            path,
            compiled_at: chrono::Utc::now(),
            module,
        }
    }

    pub fn module(&self) -> &dyn Module {
        self.module.as_ref()
    }
}

/// Dynamically typed value passed to and returned from invoked members.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Object(ObjectValue),
}

impl Value {
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Value::Object(object) => Some(&object.type_name),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<ObjectValue> for Value {
    fn from(value: ObjectValue) -> Self {
        Value::Object(value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectValue {
    pub type_name: String,
    pub fields: BTreeMap<String, Value>,
}

impl ObjectValue {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InvocationRequest {
    pub type_name: String,
    pub member_name: String,
    pub is_static: bool,
    pub arguments: Vec<Value>,
    /// Receiver of an instance member, ignored for static ones.
    pub target: Option<Value>,
}

impl InvocationRequest {
    pub fn new_static(type_name: impl Into<String>, member_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            member_name: member_name.into(),
            is_static: true,
            arguments: Vec::new(),
            target: None,
        }
    }

    pub fn new_instance(
        type_name: impl Into<String>,
        member_name: impl Into<String>,
        target: Value,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            member_name: member_name.into(),
            is_static: false,
            arguments: Vec::new(),
            target: Some(target),
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    TypeNotFound,
    MemberNotFound,
    ArityMismatch,
    InvocationThrew,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InvocationResult {
    pub success: bool,
    pub value: Option<Value>,
    pub failure_kind: Option<FailureKind>,
    pub failure_detail: Option<String>,
}

impl InvocationResult {
    pub fn returned(value: Option<Value>) -> Self {
        Self {
            success: true,
            value,
            failure_kind: None,
            failure_detail: None,
        }
    }

    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            value: None,
            failure_kind: Some(kind),
            failure_detail: Some(detail.into()),
        }
    }
}
