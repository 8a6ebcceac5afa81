//! Compile Rust source at runtime and call into the result.
//!
//! [`Orchestrator`] turns a [`BuildRequest`] into a [`CompileResult`],
//! [`resolver::invoke`] calls a member of the produced artifact by name.

use std::panic;

use tracing_subscriber::EnvFilter;

pub mod config;
pub mod constants;
pub mod core;
pub mod native;
pub mod stubs;

#[cfg(test)]
mod integration_test;

pub use crate::config::Config;
pub use crate::core::domain::{
    ArtifactHandle, BuildRequest, CompileResult, Diagnostic, FailureKind, InvocationRequest,
    InvocationResult, ObjectValue, OutputMode, Value,
};
pub use crate::core::orchestrator::Orchestrator;
pub use crate::core::resolver;
pub use crate::native::backend::RustcBackend;

/// Installs a `fmt` subscriber filtered by `RUST_LOG` and routes panics
/// through it. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
    set_panic_hook();
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}
