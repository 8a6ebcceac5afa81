//! In-process loading of compiled libraries.
//!
//! A library makes itself reflectable by exporting three C symbols:
//!
//! * `dyncode_manifest() -> *const c_char` returns a NUL-terminated JSON
//!   manifest: `{"types":[{"name":"Bar","members":[{"name":"MyFoo",
//!   "kind":"property","is_static":true}]}]}`. Methods carry
//!   `"kind":"method","arity":N`, non-public members
//!   `"visibility":"non_public"`.
//! * `dyncode_invoke(request: *const c_char) -> *mut c_char` receives
//!   `{"type_name":..,"member":..,"target":<value|null>,"arguments":[..]}`
//!   and answers `{"ok":<value|null>}`, `{"mismatch":"..."}` or
//!   `{"fault":"..."}`. Values use the adjacently tagged form of
//!   [`Value`], e.g. `{"kind":"int","value":42}`.
//! * `dyncode_free(response: *mut c_char)` releases a response. Optional,
//!   responses leak without it.
//!
//! A library without a manifest loads fine and exposes no types. Panics
//! must not cross `dyncode_invoke`, they abort the host.

use std::ffi::{CStr, CString, c_char};
use std::path::{Path, PathBuf};

use libloading::Library;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{FREE_SYMBOL, INVOKE_SYMBOL, MANIFEST_SYMBOL},
    core::{
        domain::Value,
        traits::module::{InvokeError, MemberInfo, Module, TypeInfo},
    },
};

type ManifestFn = unsafe extern "C" fn() -> *const c_char;
type InvokeFn = unsafe extern "C" fn(*const c_char) -> *mut c_char;
type FreeFn = unsafe extern "C" fn(*mut c_char);

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot open {path}: {msg}")]
    Open { path: PathBuf, msg: String },
    #[error("malformed manifest in {path}: {msg}")]
    Manifest { path: PathBuf, msg: String },
}

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    types: Vec<ManifestType>,
}

#[derive(Debug, Deserialize)]
struct ManifestType {
    name: String,
    #[serde(default)]
    members: Vec<MemberInfo>,
}

#[derive(Debug, Serialize)]
struct DispatchRequest<'a> {
    type_name: &'a str,
    member: &'a str,
    target: Option<&'a Value>,
    arguments: &'a [Value],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum DispatchResponse {
    Ok(Option<Value>),
    Mismatch(String),
    Fault(String),
}

/// A compiled library mapped into this process.
///
/// The mapping is never released, so the symbols stay valid for the rest
/// of the process.
#[derive(Debug)]
pub struct LibraryModule {
    path: PathBuf,
    manifest: Manifest,
    invoke_fn: Option<InvokeFn>,
    free_fn: Option<FreeFn>,
}

impl LibraryModule {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let library = unsafe { Library::new(path) }.map_err(|e| LoadError::Open {
            path: path.into(),
            msg: e.to_string(),
        })?;
        let library: &'static Library = Box::leak(Box::new(library));

        let manifest = match unsafe { library.get::<ManifestFn>(MANIFEST_SYMBOL) } {
            Ok(manifest_fn) => read_manifest(path, unsafe { manifest_fn() })?,
            Err(_) => {
                tracing::debug!("{} exports no manifest", path.display());
                Manifest::default()
            }
        };
        let invoke_fn = unsafe { library.get::<InvokeFn>(INVOKE_SYMBOL) }
            .ok()
            .map(|symbol| *symbol);
        let free_fn = unsafe { library.get::<FreeFn>(FREE_SYMBOL) }
            .ok()
            .map(|symbol| *symbol);

        tracing::debug!(
            "Loaded {} with {} type(s)",
            path.display(),
            manifest.types.len()
        );

        Ok(Self {
            path: path.into(),
            manifest,
            invoke_fn,
            free_fn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_manifest(path: &Path, raw: *const c_char) -> Result<Manifest, LoadError> {
    if raw.is_null() {
        return Ok(Manifest::default());
    }
    let text = unsafe { CStr::from_ptr(raw) }.to_string_lossy();
    serde_json::from_str(&text).map_err(|e| LoadError::Manifest {
        path: path.into(),
        msg: e.to_string(),
    })
}

impl Module for LibraryModule {
    fn types(&self) -> Vec<TypeInfo> {
        self.manifest
            .types
            .iter()
            .map(|t| TypeInfo {
                name: t.name.clone(),
            })
            .collect()
    }

    fn members(&self, type_name: &str) -> Vec<MemberInfo> {
        self.manifest
            .types
            .iter()
            .find(|t| t.name == type_name)
            .map(|t| t.members.clone())
            .unwrap_or_default()
    }

    #[tracing::instrument(skip(self), fields(library = %self.path.display()))]
    fn invoke(
        &self,
        type_name: &str,
        member: &MemberInfo,
        target: Option<&Value>,
        arguments: &[Value],
    ) -> Result<Option<Value>, InvokeError> {
        let invoke_fn = self.invoke_fn.ok_or_else(|| InvokeError::Threw {
            msg: format!("{} does not export dyncode_invoke", self.path.display()),
        })?;

        let request = serde_json::to_string(&DispatchRequest {
            type_name,
            member: &member.name,
            target,
            arguments,
        })
        .map_err(|e| InvokeError::ArgumentMismatch { msg: e.to_string() })?;
        let request = CString::new(request)
            .map_err(|e| InvokeError::ArgumentMismatch { msg: e.to_string() })?;

        let raw = unsafe { invoke_fn(request.as_ptr()) };
        if raw.is_null() {
            return Err(InvokeError::Threw {
                msg: format!("{}::{} returned no response", type_name, member.name),
            });
        }
        let response = unsafe { CStr::from_ptr(raw) }
            .to_string_lossy()
            .into_owned();
        if let Some(free_fn) = self.free_fn {
            unsafe { free_fn(raw) };
        }

        match serde_json::from_str::<DispatchResponse>(&response) {
            Ok(DispatchResponse::Ok(value)) => Ok(value),
            Ok(DispatchResponse::Mismatch(msg)) => Err(InvokeError::ArgumentMismatch { msg }),
            Ok(DispatchResponse::Fault(msg)) => Err(InvokeError::Threw { msg }),
            Err(e) => Err(InvokeError::Threw {
                msg: format!("malformed response {:?}: {}", response, e),
            }),
        }
    }
}

/// Executables are not loaded into the host and expose nothing to reflect on.
#[derive(Debug)]
pub struct ExecutableModule {
    path: PathBuf,
}

impl ExecutableModule {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().into(),
        }
    }
}

impl Module for ExecutableModule {
    fn types(&self) -> Vec<TypeInfo> {
        Vec::new()
    }

    fn members(&self, _type_name: &str) -> Vec<MemberInfo> {
        Vec::new()
    }

    fn invoke(
        &self,
        type_name: &str,
        member: &MemberInfo,
        _target: Option<&Value>,
        _arguments: &[Value],
    ) -> Result<Option<Value>, InvokeError> {
        Err(InvokeError::ArgumentMismatch {
            msg: format!(
                "{} is an executable, {}::{} cannot be invoked in-process",
                self.path.display(),
                type_name,
                member.name
            ),
        })
    }
}
