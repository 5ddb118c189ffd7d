//! Python environment preparation.
//!
//! Provides:
//! - `VirtualEnv` - Activation of a `venv` directory into an env overlay
//! - `ExecutableResolver` - Interpreter lookup against the child's `PATH`

pub mod shell;
pub mod venv;

pub use shell::{ExecutableResolver, merge_paths};
pub use venv::VirtualEnv;
