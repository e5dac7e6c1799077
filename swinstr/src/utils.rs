use strum::{EnumIs, EnumTryAs};
use thiserror::Error;

use crate::modules::body::InstrId;

#[derive(Debug, PartialEq, Eq, Hash, EnumIs, EnumTryAs, Error)]
pub enum Error {
    /// An instruction handle does not belong to the body it was used with.
    #[error("Instruction handle `{0:?}` does not belong to this method body.")]
    UnknownInstruction(InstrId),

    /// A branch points at an instruction that was removed or never inserted.
    #[error(
        "Branch at position {position} targets `{target:?}`, which is not an instruction of this method body."
    )]
    UndefinedBranchTarget { position: usize, target: InstrId },

    /// An instruction pops more values than the evaluation stack holds.
    #[error(
        "Evaluation stack underflow at position {position}: `{instruction}` needs {needed} value(s) but only {available} are available."
    )]
    StackUnderflow {
        position: usize,
        instruction: String,
        needed: usize,
        available: usize,
    },

    /// Two control-flow paths reach the same instruction with different depths.
    #[error(
        "Inconsistent evaluation stack at position {position}: reached with depth {first} and with depth {second}."
    )]
    InconsistentStackDepth {
        position: usize,
        first: usize,
        second: usize,
    },

    /// A `ret` leaves the wrong number of values on the stack.
    #[error(
        "Unbalanced return at position {position}: expected {expected} value(s) on the stack, found {found}."
    )]
    UnbalancedReturn {
        position: usize,
        expected: usize,
        found: usize,
    },

    /// Execution can run past the last instruction.
    #[error("Control flow falls through past the last instruction of the method body.")]
    FallsThroughEnd,

    /// A type with the same definition name is already part of the module.
    #[error("A type named `{0}` is already defined in the module.")]
    DuplicateType(String),

    /// A member with the same name already exists on the type.
    #[error("Type `{type_name}` already declares a member named `{member}`.")]
    DuplicateMember { type_name: String, member: String },
}
