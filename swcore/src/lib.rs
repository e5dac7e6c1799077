//! Static handle-tracking instrumentation for compiled modules.
//!
//! The engine walks a [`swinstr::modules::Module`], finds the types that
//! carry the track-handles or release-commands markers and rewrites them so
//! every handle produced by a recognized call is registered into a
//! per-instance tracking container, which is released together with marked
//! command properties when the instance is torn down.
//!
//! Entry point is [`weaver::ModuleWeaver`]. The building blocks (hierarchy
//! queries, the call-pattern matcher, the synthesizers) are public so hosts
//! can drive them one at a time.

pub mod config;
pub mod deps;
pub mod ext;
pub mod hierarchy;
pub mod magic;
pub mod markers;
pub mod matcher;
pub mod passes;
pub mod report;
pub mod selector;
pub mod synth;
#[cfg(any(test, feature = "test-utils"))]
pub mod tests_utils;
pub mod utils;
pub mod weaver;

#[cfg(test)]
mod tests;

pub extern crate log;
pub extern crate swinstr;
