pub mod domain;
pub mod orchestrator;
pub mod resolver;
pub mod traits;
