pub mod backend;
pub mod module;
