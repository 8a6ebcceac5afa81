use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    core::{
        domain::{BuildRequest, FailureKind, InvocationRequest, OutputMode, Value},
        orchestrator::Orchestrator,
        resolver,
        traits::backend::BackendOutput,
    },
    native::backend::RustcBackend,
    stubs::{backend::BackendStub, module::ModuleStub},
};

const PROGRAM: &str = include_str!("../demos/samples/program.rs");
const FOO_BAR: &str = include_str!("../demos/samples/foo_bar.rs");

fn rustc_orchestrator(work_dir: &Path) -> Orchestrator {
    let mut config = Config::from_env().expect("Failed to read config");
    config.work_dir = work_dir.to_path_buf();
    Orchestrator::with_config(Arc::new(RustcBackend::new(&config)), &config)
}

#[tokio::test]
async fn test_main_with_null_argument_on_stub_backend() {
    let module = ModuleStub::builder()
        .class("Test.Program", |class| {
            class.static_method("Main", 1, |args| match args {
                [Value::Null] => Ok(None),
                _ => Ok(Some(Value::from("unexpected arguments"))),
            })
        })
        .build();
    let backend = BackendStub::new(
        Ok(BackendOutput {
            errors: vec![],
            module: Some(Arc::new(module)),
        }),
        Duration::from_millis(10),
    );
    let orchestrator = Orchestrator::new(Arc::new(backend));

    let result = orchestrator
        .compile(&BuildRequest::builder().source_text(PROGRAM).build())
        .await;

    assert!(result.success);
    assert!(result.diagnostics.is_empty());
    let artifact = result.artifact.expect("artifact on success");
    assert_eq!(artifact.mode, OutputMode::InMemoryLibrary);

    let invocation = resolver::invoke(
        &artifact,
        &InvocationRequest::new_static("Test.Program", "Main").with_arguments(vec![Value::Null]),
    );
    assert!(invocation.success);
    assert_eq!(invocation.value, None);
}

#[tokio::test]
async fn test_main_with_null_argument() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = rustc_orchestrator(dir.path());

    let result = orchestrator
        .compile(&BuildRequest::builder().source_text(PROGRAM).build())
        .await;

    assert!(result.success, "{:?}", result);
    let artifact = result.artifact.expect("artifact on success");

    let invocation = resolver::invoke(
        &artifact,
        &InvocationRequest::new_static("Test.Program", "Main").with_arguments(vec![Value::Null]),
    );
    assert!(invocation.success, "{:?}", invocation);
    assert_eq!(invocation.value, None);
    assert_eq!(invocation.failure_kind, None);
}

#[tokio::test]
async fn test_syntax_error_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = rustc_orchestrator(dir.path());

    let source = r#"
pub fn broken() -> i64 {
    let x = 1
    x
}
"#;
    let result = orchestrator
        .compile(&BuildRequest::builder().source_text(source).build())
        .await;

    assert!(!result.success);
    assert!(result.artifact.is_none());
    assert!(result.failure_message.is_none());
    assert!(!result.diagnostics.is_empty());
    assert!(result.diagnostics.iter().all(|d| d.line > 0));
    assert!(!result.diagnostics[0].message.is_empty());
}

#[tokio::test]
async fn test_static_property_returns_object() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = rustc_orchestrator(dir.path());

    let result = orchestrator
        .compile(&BuildRequest::builder().source_text(FOO_BAR).build())
        .await;
    assert!(result.success, "{:?}", result);
    let artifact = result.artifact.expect("artifact on success");

    let my_foo = resolver::invoke(&artifact, &InvocationRequest::new_static("Bar", "MyFoo"));
    assert!(my_foo.success, "{:?}", my_foo);
    let foo = my_foo.value.expect("MyFoo returns a value");
    assert_eq!(foo.type_name(), Some("Foo"));

    let my_property = resolver::invoke(
        &artifact,
        &InvocationRequest::new_instance("Foo", "MyProperty", foo),
    );
    assert!(my_property.success, "{:?}", my_property);
    assert_eq!(my_property.value, Some(Value::Int(42)));
}

#[tokio::test]
async fn test_library_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = rustc_orchestrator(dir.path());
    let library = dir.path().join(format!(
        "{}foo_bar{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    ));

    let result = orchestrator
        .compile(
            &BuildRequest::builder()
                .source_text(FOO_BAR)
                .library_path(&library)
                .build(),
        )
        .await;

    assert!(result.success, "{:?}", result);
    assert!(library.exists());
    let artifact = result.artifact.expect("artifact on success");
    assert_eq!(artifact.mode, OutputMode::OnDiskLibrary);
    assert_eq!(artifact.path.as_deref(), Some(library.as_path()));
}

#[tokio::test]
async fn test_unwritable_executable_path() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = rustc_orchestrator(dir.path());

    let result = orchestrator
        .compile(
            &BuildRequest::builder()
                .source_text("fn main() {}")
                // /proc is readonly dir
                .executable_path("/proc/dyncode_unwritable/app")
                .build(),
        )
        .await;

    assert!(!result.success);
    assert!(result.artifact.is_none());
    assert!(result.diagnostics.is_empty());
    assert!(!result.failure_message.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_missing_member() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = rustc_orchestrator(dir.path());

    let result = orchestrator
        .compile(&BuildRequest::builder().source_text(FOO_BAR).build())
        .await;
    let artifact = result.artifact.expect("artifact on success");

    let invocation = resolver::invoke(&artifact, &InvocationRequest::new_static("Bar", "Nope"));

    assert!(!invocation.success);
    assert_eq!(invocation.failure_kind, Some(FailureKind::MemberNotFound));
    assert!(invocation.value.is_none());
    assert!(!invocation.failure_detail.unwrap_or_default().is_empty());

    let missing_type = resolver::invoke(&artifact, &InvocationRequest::new_static("Baz", "MyFoo"));
    assert_eq!(missing_type.failure_kind, Some(FailureKind::TypeNotFound));
}

#[tokio::test]
async fn test_warnings_do_not_fail_compilation() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = rustc_orchestrator(dir.path());

    let source = format!("{}\nfn unused() {{ let x = 1; }}\n", FOO_BAR);
    let result = orchestrator
        .compile(&BuildRequest::builder().source_text(source).build())
        .await;

    assert!(result.success, "{:?}", result);
    assert!(result.diagnostics.is_empty());
}

#[tokio::test]
async fn test_source_file_takes_priority() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = rustc_orchestrator(dir.path());
    let source_file = dir.path().join("foo_bar.rs");
    std::fs::write(&source_file, FOO_BAR).unwrap();

    let result = orchestrator
        .compile(
            &BuildRequest::builder()
                .source_file(&source_file)
                .source_text("this is not rust")
                .build(),
        )
        .await;

    assert!(result.success, "{:?}", result);
}

#[tokio::test]
async fn test_recompiling_same_library_path_gives_new_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = rustc_orchestrator(dir.path());
    let library = dir.path().join(format!(
        "{}shared{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    ));

    let first = orchestrator
        .compile(
            &BuildRequest::builder()
                .source_text(FOO_BAR)
                .library_path(&library)
                .build(),
        )
        .await;
    let second = orchestrator
        .compile(
            &BuildRequest::builder()
                .source_text(PROGRAM)
                .library_path(&library)
                .build(),
        )
        .await;

    let first = first.artifact.expect("artifact on success");
    let second = second.artifact.expect("artifact on success");
    assert_ne!(first.id, second.id);

    let main = resolver::invoke(
        &second,
        &InvocationRequest::new_static("Test.Program", "Main").with_arguments(vec![Value::Null]),
    );
    assert!(main.success, "{:?}", main);
    let stale = resolver::invoke(&second, &InvocationRequest::new_static("Bar", "MyFoo"));
    assert_eq!(stale.failure_kind, Some(FailureKind::TypeNotFound));

    let my_foo = resolver::invoke(&first, &InvocationRequest::new_static("Bar", "MyFoo"));
    assert!(my_foo.success, "{:?}", my_foo);
}
