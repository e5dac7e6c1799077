use strum::{EnumDiscriminants, EnumIs, EnumIter, EnumTryAs};

use crate::{
    modules::body::InstrId,
    types::{FieldRef, MethodRef},
};

/// Discriminated union covering every instruction of the stack IR.
///
/// Instructions communicate through an evaluation stack: operands are pushed
/// by loads and calls and consumed by stores, calls and branches. The
/// generated [`OpCode`] discriminant (via `strum`) is handy for fast
/// classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs, EnumTryAs, EnumDiscriminants)]
#[strum_discriminants(name(OpCode))]
#[strum_discriminants(derive(Hash, EnumIter))]
pub enum Instr {
    Nop,

    // Arguments and locals. Argument 0 is `this` in instance methods.
    LoadArg(u16),
    LoadLocal(u16),
    StoreLocal(u16),

    // Constants
    LoadInt(i64),
    LoadStr(String),
    LoadNull,

    // Object model
    LoadField(FieldRef),
    StoreField(FieldRef),
    NewObj(MethodRef),

    // Invocations
    Call(MethodRef),
    CallVirt(MethodRef),

    // Stack shuffling
    Dup,
    Pop,

    // Control flow
    Br(InstrId),
    BrTrue(InstrId),
    BrFalse(InstrId),
    Ret,
    Throw,
}

impl Instr {
    /// `ldarg 0`, the receiver of an instance method.
    pub fn load_this() -> Self {
        Instr::LoadArg(0)
    }

    pub fn op(&self) -> OpCode {
        self.into()
    }

    /// `true` for `call` and `callvirt`.
    pub fn is_invoke(&self) -> bool {
        matches!(self, Instr::Call(_) | Instr::CallVirt(_))
    }

    /// The method operand of an invoke instruction.
    pub fn invoked_method(&self) -> Option<&MethodRef> {
        match self {
            Instr::Call(method) | Instr::CallVirt(method) => Some(method),
            _ => None,
        }
    }

    pub fn branch_target(&self) -> Option<InstrId> {
        match self {
            Instr::Br(target) | Instr::BrTrue(target) | Instr::BrFalse(target) => Some(*target),
            _ => None,
        }
    }

    pub fn branch_target_mut(&mut self) -> Option<&mut InstrId> {
        match self {
            Instr::Br(target) | Instr::BrTrue(target) | Instr::BrFalse(target) => Some(target),
            _ => None,
        }
    }

    /// Whether execution may continue with the next instruction in order.
    pub fn falls_through(&self) -> bool {
        !matches!(self, Instr::Br(_) | Instr::Ret | Instr::Throw)
    }

    /// Number of values popped from the evaluation stack. `ret` pops the
    /// return value only when the enclosing method has one.
    pub fn pops(&self, method_returns_value: bool) -> usize {
        match self {
            Instr::Nop
            | Instr::LoadArg(_)
            | Instr::LoadLocal(_)
            | Instr::LoadInt(_)
            | Instr::LoadStr(_)
            | Instr::LoadNull
            | Instr::Br(_) => 0,
            Instr::StoreLocal(_)
            | Instr::LoadField(_)
            | Instr::Dup
            | Instr::Pop
            | Instr::BrTrue(_)
            | Instr::BrFalse(_)
            | Instr::Throw => 1,
            Instr::StoreField(_) => 2,
            Instr::NewObj(ctor) => ctor.params.len(),
            Instr::Call(method) | Instr::CallVirt(method) => method.arity(),
            Instr::Ret => usize::from(method_returns_value),
        }
    }

    /// Number of values pushed onto the evaluation stack.
    pub fn pushes(&self) -> usize {
        match self {
            Instr::LoadArg(_)
            | Instr::LoadLocal(_)
            | Instr::LoadInt(_)
            | Instr::LoadStr(_)
            | Instr::LoadNull
            | Instr::LoadField(_)
            | Instr::NewObj(_) => 1,
            Instr::Dup => 2,
            Instr::Call(method) | Instr::CallVirt(method) => {
                usize::from(method.return_type.is_some())
            }
            Instr::Nop
            | Instr::StoreLocal(_)
            | Instr::StoreField(_)
            | Instr::Pop
            | Instr::Br(_)
            | Instr::BrTrue(_)
            | Instr::BrFalse(_)
            | Instr::Ret
            | Instr::Throw => 0,
        }
    }
}

impl OpCode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Nop => "nop",
            OpCode::LoadArg => "ldarg",
            OpCode::LoadLocal => "ldloc",
            OpCode::StoreLocal => "stloc",
            OpCode::LoadInt => "ldc.i8",
            OpCode::LoadStr => "ldstr",
            OpCode::LoadNull => "ldnull",
            OpCode::LoadField => "ldfld",
            OpCode::StoreField => "stfld",
            OpCode::NewObj => "newobj",
            OpCode::Call => "call",
            OpCode::CallVirt => "callvirt",
            OpCode::Dup => "dup",
            OpCode::Pop => "pop",
            OpCode::Br => "br",
            OpCode::BrTrue => "brtrue",
            OpCode::BrFalse => "brfalse",
            OpCode::Ret => "ret",
            OpCode::Throw => "throw",
        }
    }
}
