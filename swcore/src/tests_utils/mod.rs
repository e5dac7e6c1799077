//! Test support: an interpreter for woven modules, the reactive runtime it
//! runs against, fixture models and collecting log sinks.

pub mod log;
pub mod machine;
pub mod models;
pub mod runtime;
