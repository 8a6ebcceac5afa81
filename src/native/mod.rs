/// Native module contains the backend that drives a local `rustc`
/// and the loader that maps its output into this process.
pub mod backend;
pub mod diagnostics;
pub mod library;
