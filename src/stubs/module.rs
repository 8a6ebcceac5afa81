use std::sync::Arc;

use crate::core::{
    domain::Value,
    traits::module::{InvokeError, MemberInfo, Module, TypeInfo},
};

type MemberBody =
    Arc<dyn Fn(Option<&Value>, &[Value]) -> Result<Option<Value>, InvokeError> + Send + Sync>;

/// In-memory module whose members are plain Rust closures.
///
/// Lets host-side code sit behind the same resolver as compiled artifacts.
#[derive(Clone)]
pub struct ModuleStub {
    classes: Vec<ClassStub>,
}

impl std::fmt::Debug for ModuleStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleStub")
            .field(
                "types",
                &self.classes.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ModuleStub {
    pub fn builder() -> ModuleStubBuilder {
        ModuleStubBuilder::default()
    }

    fn class(&self, type_name: &str) -> Option<&ClassStub> {
        self.classes.iter().find(|c| c.name == type_name)
    }
}

impl Module for ModuleStub {
    fn types(&self) -> Vec<TypeInfo> {
        self.classes
            .iter()
            .map(|c| TypeInfo {
                name: c.name.clone(),
            })
            .collect()
    }

    fn members(&self, type_name: &str) -> Vec<MemberInfo> {
        self.class(type_name)
            .map(|c| c.members.iter().map(|(info, _)| info.clone()).collect())
            .unwrap_or_default()
    }

    #[tracing::instrument(skip(self))]
    fn invoke(
        &self,
        type_name: &str,
        member: &MemberInfo,
        target: Option<&Value>,
        arguments: &[Value],
    ) -> Result<Option<Value>, InvokeError> {
        let body = self
            .class(type_name)
            .and_then(|c| c.members.iter().find(|(info, _)| info == member))
            .map(|(_, body)| body.clone())
            .ok_or_else(|| InvokeError::ArgumentMismatch {
                msg: format!("'{}' is not a member of '{}'", member.name, type_name),
            })?;

        if !member.is_static && target.is_none() {
            return Err(InvokeError::ArgumentMismatch {
                msg: format!("'{}' needs a target", member.name),
            });
        }

        body(target, arguments)
    }
}

#[derive(Debug, Default)]
pub struct ModuleStubBuilder {
    classes: Vec<ClassStub>,
}

impl ModuleStubBuilder {
    pub fn class<F>(mut self, name: impl Into<String>, define: F) -> Self
    where
        F: FnOnce(ClassStub) -> ClassStub,
    {
        self.classes.push(define(ClassStub {
            name: name.into(),
            members: Vec::new(),
        }));
        self
    }

    pub fn build(self) -> ModuleStub {
        ModuleStub {
            classes: self.classes,
        }
    }
}

#[derive(Clone)]
pub struct ClassStub {
    name: String,
    members: Vec<(MemberInfo, MemberBody)>,
}

impl std::fmt::Debug for ClassStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassStub")
            .field("name", &self.name)
            .field(
                "members",
                &self.members.iter().map(|(info, _)| info).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ClassStub {
    pub fn member<F>(mut self, info: MemberInfo, body: F) -> Self
    where
        F: Fn(Option<&Value>, &[Value]) -> Result<Option<Value>, InvokeError>
            + Send
            + Sync
            + 'static,
    {
        self.members.push((info, Arc::new(body)));
        self
    }

    pub fn static_method<F>(self, name: impl Into<String>, arity: usize, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Option<Value>, InvokeError> + Send + Sync + 'static,
    {
        self.member(MemberInfo::method(name, arity, true), move |_, args| {
            body(args)
        })
    }

    pub fn instance_method<F>(self, name: impl Into<String>, arity: usize, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Option<Value>, InvokeError> + Send + Sync + 'static,
    {
        self.member(
            MemberInfo::method(name, arity, false),
            move |target, args| match target {
                Some(target) => body(target, args),
                None => Err(InvokeError::ArgumentMismatch {
                    msg: "missing target".to_string(),
                }),
            },
        )
    }

    pub fn static_property<F>(self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn() -> Result<Option<Value>, InvokeError> + Send + Sync + 'static,
    {
        self.member(MemberInfo::property(name, true), move |_, _| getter())
    }

    pub fn private_static_property<F>(self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn() -> Result<Option<Value>, InvokeError> + Send + Sync + 'static,
    {
        self.member(MemberInfo::property(name, true).non_public(), move |_, _| {
            getter()
        })
    }

    pub fn instance_property<F>(self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Value) -> Result<Option<Value>, InvokeError> + Send + Sync + 'static,
    {
        self.member(MemberInfo::property(name, false), move |target, _| {
            match target {
                Some(target) => getter(target),
                None => Err(InvokeError::ArgumentMismatch {
                    msg: "missing target".to_string(),
                }),
            }
        })
    }
}
