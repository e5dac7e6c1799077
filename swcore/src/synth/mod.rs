//! Structural code synthesis
//!
//! - `field`: the per-instance tracking field and the constructor prologue
//!   that initializes it
//! - `callsite`: registration of matched handles into the tracking field
//! - `teardown`: locating or synthesizing the teardown method and appending
//!   release code to it
//!
//! Every synthesizer works on a `&mut Module` and leaves each body it
//! touches stack-balanced when it was before.

pub mod callsite;
pub mod field;
pub mod teardown;
