//! Compiles the bundled samples with the local `rustc` and calls into them.
//!
//! Run with `RUST_LOG=debug` to watch the orchestrator and resolver at work.

use std::sync::Arc;

use dyncode::{
    BuildRequest, Config, InvocationRequest, Orchestrator, RustcBackend, Value, init_tracing,
    resolver,
};

const FOO_BAR: &str = include_str!("samples/foo_bar.rs");
const BROKEN: &str = "pub fn broken() -> i64 {\n    let x = 1\n    x\n}\n";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::from_env()?;
    let orchestrator = Orchestrator::with_config(Arc::new(RustcBackend::new(&config)), &config);

    let broken = orchestrator
        .compile(&BuildRequest::builder().source_text(BROKEN).build())
        .await;
    for diagnostic in &broken.diagnostics {
        println!(
            "{}:{} {} {}",
            diagnostic.line, diagnostic.column, diagnostic.code, diagnostic.message
        );
    }

    let compiled = orchestrator
        .compile(&BuildRequest::builder().source_text(FOO_BAR).build())
        .await;
    let Some(artifact) = compiled.artifact else {
        return Err(compiled
            .failure_message
            .unwrap_or_else(|| "compilation failed".to_string())
            .into());
    };

    let my_foo = resolver::invoke(&artifact, &InvocationRequest::new_static("Bar", "MyFoo"));
    println!("Bar.MyFoo = {:?}", my_foo.value);

    if let Some(foo) = my_foo.value {
        let my_property = resolver::invoke(
            &artifact,
            &InvocationRequest::new_instance("Foo", "MyProperty", foo),
        );
        println!("Foo.MyProperty = {:?}", my_property.value);
    }

    let missing = resolver::invoke(
        &artifact,
        &InvocationRequest::new_static("Bar", "Nope").with_arguments(vec![Value::Null]),
    );
    println!("{:?}: {:?}", missing.failure_kind, missing.failure_detail);

    Ok(())
}
