//! AgentForge Tool Chain Scheduler
//!
//! Executes a declared graph of tool steps in dependency-ordered parallel
//! waves, threading published results between steps through `$var`
//! references.

pub mod definition;
pub mod scheduler;
pub mod variables;

pub use definition::{load_chain, parse_chain, validate_chain, ChainFormat, ChainReport};
pub use scheduler::{ToolChainScheduler, CANCELLED_REASON, DEPENDENCY_NOT_MET};
pub use variables::{referenced_variables, resolve_arguments};
