//! Stack-machine intermediate representation of a compiled module.
//!
//! The crate models what a rewriting pass needs to see of a compiled module:
//! type, method, field and property definitions ([`modules::definitions`]),
//! symbol references ([`types`]) and method bodies made of stack
//! instructions ([`modules::instructions`]). Bodies can be verified for
//! evaluation-stack discipline after rewriting.

pub mod modules;
pub mod types;
pub mod utils;
