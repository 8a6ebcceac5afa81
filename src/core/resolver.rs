use std::panic::{self, AssertUnwindSafe};

use itertools::Itertools;

use crate::core::{
    domain::{ArtifactHandle, FailureKind, InvocationRequest, InvocationResult, Value},
    traits::module::{InvokeError, MemberInfo, MemberKind, Module},
};

/// Resolves `request` against the artifact's exported surface and calls the
/// member it names.
///
/// Every failure comes back as an [`InvocationResult`]. Panics raised by the
/// invoked code are caught and reported as [`FailureKind::InvocationThrew`].
/// Nothing bounds how long the invoked code runs.
#[tracing::instrument(skip(artifact), fields(artifact = %artifact.id))]
pub fn invoke(artifact: &ArtifactHandle, request: &InvocationRequest) -> InvocationResult {
    let result = resolve_and_call(artifact.module(), request);
    tracing::debug!("Invocation result: {:?}", result);
    result
}

fn resolve_and_call(module: &dyn Module, request: &InvocationRequest) -> InvocationResult {
    let type_name = request.type_name.as_str();
    if !module.types().iter().any(|t| t.name == type_name) {
        return InvocationResult::failure(
            FailureKind::TypeNotFound,
            format!("Type '{}' not found", type_name),
        );
    }

    let candidates = module
        .members(type_name)
        .into_iter()
        .filter(|m| m.name == request.member_name && m.is_static == request.is_static)
        .collect_vec();
    if candidates.is_empty() {
        return InvocationResult::failure(
            FailureKind::MemberNotFound,
            format!(
                "{} member '{}' not found on '{}'",
                if request.is_static { "Static" } else { "Instance" },
                request.member_name,
                type_name
            ),
        );
    }

    let (member, arguments) = match select_member(&candidates, &request.arguments) {
        Ok(selected) => selected,
        Err(detail) => return InvocationResult::failure(FailureKind::ArityMismatch, detail),
    };

    let target = if member.is_static {
        None
    } else {
        match check_target(type_name, request.target.as_ref()) {
            Ok(target) => Some(target),
            Err(detail) => return InvocationResult::failure(FailureKind::ArityMismatch, detail),
        }
    };

    tracing::debug!(
        "Invoking {}::{} with {} argument(s)",
        type_name,
        member.name,
        arguments.len()
    );
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        module.invoke(type_name, member, target, arguments)
    }));

    match outcome {
        Ok(Ok(value)) => InvocationResult::returned(value),
        Ok(Err(InvokeError::ArgumentMismatch { msg })) => {
            InvocationResult::failure(FailureKind::ArityMismatch, msg)
        }
        Ok(Err(InvokeError::Threw { msg })) => {
            tracing::warn!("Invoked code failed: {}", msg);
            InvocationResult::failure(FailureKind::InvocationThrew, non_empty(msg))
        }
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            tracing::warn!("Invoked code panicked: {}", msg);
            InvocationResult::failure(FailureKind::InvocationThrew, non_empty(msg))
        }
    }
}

/// Properties win outright and get no arguments. Methods are matched on
/// arity so overloads resolve to the one that fits.
fn select_member<'a, 'b>(
    candidates: &'a [MemberInfo],
    arguments: &'b [Value],
) -> Result<(&'a MemberInfo, &'b [Value]), String> {
    if let Some(property) = candidates
        .iter()
        .find(|m| matches!(m.kind, MemberKind::Property))
    {
        let no_arguments: &'b [Value] = &[];
        return Ok((property, no_arguments));
    }

    candidates
        .iter()
        .find(|m| matches!(m.kind, MemberKind::Method { arity } if arity == arguments.len()))
        .map(|m| (m, arguments))
        .ok_or_else(|| {
            let arities = candidates
                .iter()
                .filter_map(|m| match m.kind {
                    MemberKind::Method { arity } => Some(arity),
                    MemberKind::Property => None,
                })
                .join(", ");
            format!(
                "'{}' takes {} argument(s), {} supplied",
                candidates[0].name,
                arities,
                arguments.len()
            )
        })
}

fn check_target<'a>(type_name: &str, target: Option<&'a Value>) -> Result<&'a Value, String> {
    let target = target.ok_or_else(|| {
        format!("Instance member of '{}' invoked without a target", type_name)
    })?;

    match target.type_name() {
        Some(actual) if actual != type_name => Err(format!(
            "Target is an instance of '{}', expected '{}'",
            actual, type_name
        )),
        _ => Ok(target),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        String::new()
    }
}

fn non_empty(msg: String) -> String {
    if msg.trim().is_empty() {
        "invoked code failed without a message".to_string()
    } else {
        msg
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        core::domain::{ObjectValue, OutputMode},
        stubs::module::ModuleStub,
    };

    fn artifact(module: ModuleStub) -> ArtifactHandle {
        ArtifactHandle::new(OutputMode::InMemoryLibrary, None, Arc::new(module))
    }

    fn calculator() -> ArtifactHandle {
        artifact(
            ModuleStub::builder()
                .class("Calc", |class| {
                    class
                        .static_method("Add", 2, |args| match args {
                            [Value::Int(a), Value::Int(b)] => Ok(Some(Value::Int(a + b))),
                            _ => Err(InvokeError::ArgumentMismatch {
                                msg: "Add expects two integers".to_string(),
                            }),
                        })
                        .static_method("Add", 3, |args| match args {
                            [Value::Int(a), Value::Int(b), Value::Int(c)] => {
                                Ok(Some(Value::Int(a + b + c)))
                            }
                            _ => Err(InvokeError::ArgumentMismatch {
                                msg: "Add expects three integers".to_string(),
                            }),
                        })
                        .static_method("Reset", 0, |_| Ok(None))
                        .static_method("Divide", 2, |args| match args {
                            [Value::Int(_), Value::Int(0)] => Err(InvokeError::Threw {
                                msg: "attempt to divide by zero".to_string(),
                            }),
                            [Value::Int(a), Value::Int(b)] => Ok(Some(Value::Int(a / b))),
                            _ => Err(InvokeError::ArgumentMismatch {
                                msg: "Divide expects two integers".to_string(),
                            }),
                        })
                        .static_method("Explode", 0, |_| panic!("calculator exploded"))
                        .static_property("Version", || Ok(Some(Value::from("1.0"))))
                        .private_static_property("Secret", || Ok(Some(Value::Int(7))))
                        .instance_method("Describe", 0, |target, _| {
                            Ok(Some(Value::from(format!("{:?}", target.type_name()))))
                        })
                })
                .build(),
        )
    }

    #[test]
    fn test_unknown_type() {
        let artifact = calculator();

        for type_name in ["Calculator", "calc", ""] {
            let result = invoke(&artifact, &InvocationRequest::new_static(type_name, "Add"));

            assert!(!result.success);
            assert_eq!(result.failure_kind, Some(FailureKind::TypeNotFound));
            assert!(result.value.is_none());
        }
    }

    #[test]
    fn test_unknown_member() {
        let artifact = calculator();

        let result = invoke(&artifact, &InvocationRequest::new_static("Calc", "Multiply"));

        assert_eq!(result.failure_kind, Some(FailureKind::MemberNotFound));
        assert!(result.failure_detail.unwrap().contains("Multiply"));
    }

    #[test]
    fn test_static_filter() {
        let artifact = calculator();

        let instance_lookup = InvocationRequest::new_instance(
            "Calc",
            "Version",
            Value::Object(ObjectValue::new("Calc")),
        );
        assert_eq!(
            invoke(&artifact, &instance_lookup).failure_kind,
            Some(FailureKind::MemberNotFound)
        );

        let static_lookup = InvocationRequest::new_static("Calc", "Describe");
        assert_eq!(
            invoke(&artifact, &static_lookup).failure_kind,
            Some(FailureKind::MemberNotFound)
        );
    }

    #[test]
    fn test_overloads_resolve_by_arity() {
        let artifact = calculator();

        let two = InvocationRequest::new_static("Calc", "Add")
            .with_arguments(vec![Value::Int(2), Value::Int(3)]);
        let three = InvocationRequest::new_static("Calc", "Add")
            .with_arguments(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);

        assert_eq!(invoke(&artifact, &two).value, Some(Value::Int(5)));
        assert_eq!(invoke(&artifact, &three).value, Some(Value::Int(6)));
    }

    #[test]
    fn test_arity_mismatch() {
        let artifact = calculator();

        let request =
            InvocationRequest::new_static("Calc", "Add").with_arguments(vec![Value::Int(1)]);
        let result = invoke(&artifact, &request);

        assert!(!result.success);
        assert_eq!(result.failure_kind, Some(FailureKind::ArityMismatch));
        assert!(result.failure_detail.unwrap().contains("2, 3"));
    }

    #[test]
    fn test_argument_type_mismatch() {
        let artifact = calculator();

        let request = InvocationRequest::new_static("Calc", "Add")
            .with_arguments(vec![Value::Int(1), Value::from("two")]);
        let result = invoke(&artifact, &request);

        assert_eq!(result.failure_kind, Some(FailureKind::ArityMismatch));
    }

    #[test]
    fn test_void_method_returns_no_value() {
        let artifact = calculator();

        let result = invoke(&artifact, &InvocationRequest::new_static("Calc", "Reset"));

        assert!(result.success);
        assert_eq!(result.value, None);
        assert_eq!(result.failure_kind, None);
    }

    #[test]
    fn test_property_ignores_arguments() {
        let artifact = calculator();

        let request = InvocationRequest::new_static("Calc", "Version")
            .with_arguments(vec![Value::Int(1), Value::Null, Value::from("extra")]);
        let result = invoke(&artifact, &request);

        assert!(result.success);
        assert_eq!(result.value, Some(Value::from("1.0")));
    }

    #[test]
    fn test_non_public_members_are_visible() {
        let artifact = calculator();

        let result = invoke(&artifact, &InvocationRequest::new_static("Calc", "Secret"));

        assert_eq!(result.value, Some(Value::Int(7)));
    }

    #[test]
    fn test_thrown_error_is_captured() {
        let artifact = calculator();

        let request = InvocationRequest::new_static("Calc", "Divide")
            .with_arguments(vec![Value::Int(1), Value::Int(0)]);
        let result = invoke(&artifact, &request);

        assert!(!result.success);
        assert_eq!(result.failure_kind, Some(FailureKind::InvocationThrew));
        assert_eq!(
            result.failure_detail.as_deref(),
            Some("attempt to divide by zero")
        );
    }

    #[test]
    fn test_panic_is_captured_and_resolver_stays_usable() {
        let artifact = calculator();

        let result = invoke(&artifact, &InvocationRequest::new_static("Calc", "Explode"));

        assert_eq!(result.failure_kind, Some(FailureKind::InvocationThrew));
        assert!(result.failure_detail.unwrap().contains("calculator exploded"));

        let request = InvocationRequest::new_static("Calc", "Add")
            .with_arguments(vec![Value::Int(20), Value::Int(22)]);
        assert_eq!(invoke(&artifact, &request).value, Some(Value::Int(42)));
    }

    #[test]
    fn test_instance_member_needs_matching_target() {
        let artifact = calculator();

        let mut missing = InvocationRequest::new_instance("Calc", "Describe", Value::Null);
        missing.target = None;
        assert_eq!(
            invoke(&artifact, &missing).failure_kind,
            Some(FailureKind::ArityMismatch)
        );

        let wrong = InvocationRequest::new_instance(
            "Calc",
            "Describe",
            Value::Object(ObjectValue::new("Other")),
        );
        assert_eq!(
            invoke(&artifact, &wrong).failure_kind,
            Some(FailureKind::ArityMismatch)
        );

        let right = InvocationRequest::new_instance(
            "Calc",
            "Describe",
            Value::Object(ObjectValue::new("Calc")),
        );
        assert_eq!(
            invoke(&artifact, &right).value,
            Some(Value::from("Some(\"Calc\")"))
        );
    }
}
