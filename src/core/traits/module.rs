use serde::{Deserialize, Serialize};

use crate::core::domain::Value;

/// Reflection capability over a compiled artifact.
///
/// Lookup is by exact name. Implementations expose every member they
/// contain, whatever its declared visibility.
pub trait Module: std::fmt::Debug + Send + Sync {
    fn types(&self) -> Vec<TypeInfo>;

    fn members(&self, type_name: &str) -> Vec<MemberInfo>;

    /// Calls a member previously returned by [`Module::members`].
    ///
    /// `target` is the receiver for instance members.
    fn invoke(
        &self,
        type_name: &str,
        member: &MemberInfo,
        target: Option<&Value>,
        arguments: &[Value],
    ) -> Result<Option<Value>, InvokeError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub name: String,
    #[serde(flatten)]
    pub kind: MemberKind,
    pub is_static: bool,
    #[serde(default)]
    pub visibility: Visibility,
}

impl MemberInfo {
    pub fn method(name: impl Into<String>, arity: usize, is_static: bool) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Method { arity },
            is_static,
            visibility: Visibility::Public,
        }
    }

    pub fn property(name: impl Into<String>, is_static: bool) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Property,
            is_static,
            visibility: Visibility::Public,
        }
    }

    pub fn non_public(mut self) -> Self {
        self.visibility = Visibility::NonPublic;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemberKind {
    Method { arity: usize },
    Property,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    NonPublic,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum InvokeError {
    /// Arguments or receiver do not fit the member's signature.
    #[error("argument mismatch: {msg}")]
    ArgumentMismatch { msg: String },
    /// The invoked code itself failed.
    #[error("{msg}")]
    Threw { msg: String },
}
