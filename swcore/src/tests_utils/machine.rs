//! A small interpreter for woven modules.
//!
//! The machine executes method bodies of a [`Module`] against a heap of
//! objects. Methods of referenced assemblies have no body in the IR; they
//! are provided as native intrinsics keyed by `Declaring.Type::Name`.
//! Virtual calls dispatch on the runtime class of the receiver, walking its
//! base chain until a body or an intrinsic is found.
use std::collections::{BTreeMap, HashMap};

use slotmap::{SlotMap, new_key_type};
use strum::{EnumIs, EnumTryAs};
use swinstr::{
    modules::{MethodKey, Module, definitions::MethodDefinition, instructions::Instr},
    types::{CONSTRUCTOR_NAME, MethodRef},
};
use thiserror::Error;

new_key_type! {
    pub struct ObjectId;
}

#[derive(Debug, Clone, PartialEq, Eq, EnumIs, EnumTryAs)]
pub enum Value {
    Null,
    Int(i64),
    Str(String),
    Object(ObjectId),
}

impl Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(value) => *value != 0,
            Value::Str(_) | Value::Object(_) => true,
        }
    }
}

/// Runtime state of objects implemented natively.
#[derive(Debug, Clone, Default, PartialEq, Eq, EnumIs)]
pub enum Native {
    #[default]
    Plain,
    /// A tracking container. Entries are kept after release so tests can
    /// inspect what was released.
    Composite { entries: Vec<Value>, disposed: bool },
    /// A handle produced by a subscription.
    Handle { disposed: bool },
}

#[derive(Debug, Clone)]
pub struct Object {
    /// Definition name of the runtime class.
    pub class: String,
    pub fields: BTreeMap<String, Value>,
    pub native: Native,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("No body or intrinsic for `{0}`")]
    UnresolvedMethod(String),

    #[error("Null reference while executing `{0}`")]
    NullReference(String),

    #[error("Value `{0}` is not an object")]
    NotAnObject(String),

    #[error("Object handle is dangling")]
    DanglingObject,

    #[error("Evaluation stack underflow while executing `{0}`")]
    StackUnderflow(String),

    #[error("Argument {0} is out of range")]
    BadArgument(u16),

    #[error("Local {0} is out of range")]
    BadLocal(u16),

    #[error("Branch to an instruction outside of the body")]
    BadBranch,

    #[error("Execution fell off the end of `{0}`")]
    FellOffEnd(String),

    #[error("Step limit of {0} instructions exceeded")]
    StepLimitExceeded(usize),

    #[error("Exception thrown: {0:?}")]
    Thrown(Value),
}

pub type ExecResult<T> = Result<T, ExecError>;

/// Native implementation of a method. `args[0]` is the receiver of
/// instance methods.
pub type Intrinsic = fn(&mut Machine<'_>, Vec<Value>) -> ExecResult<Option<Value>>;

pub const DEFAULT_STEP_LIMIT: usize = 100_000;

#[derive(Clone, Copy)]
enum Callee {
    Native(Intrinsic),
    Body(MethodKey),
}

pub struct Machine<'m> {
    module: &'m Module,
    heap: SlotMap<ObjectId, Object>,
    intrinsics: HashMap<String, Intrinsic>,
    step_limit: usize,
    steps: usize,
}

impl<'m> Machine<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            heap: SlotMap::with_key(),
            intrinsics: HashMap::new(),
            step_limit: DEFAULT_STEP_LIMIT,
            steps: 0,
        }
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn module(&self) -> &'m Module {
        self.module
    }

    /// Total number of instructions executed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn register(&mut self, key: impl Into<String>, intrinsic: Intrinsic) {
        self.intrinsics.insert(key.into(), intrinsic);
    }

    pub fn alloc(&mut self, class: impl Into<String>, native: Native) -> ObjectId {
        self.heap.insert(Object {
            class: class.into(),
            fields: BTreeMap::new(),
            native,
        })
    }

    pub fn object(&self, value: &Value) -> ExecResult<&Object> {
        match value {
            Value::Object(id) => self.heap.get(*id).ok_or(ExecError::DanglingObject),
            Value::Null => Err(ExecError::NullReference("object access".into())),
            other => Err(ExecError::NotAnObject(format!("{other:?}"))),
        }
    }

    pub fn object_mut(&mut self, value: &Value) -> ExecResult<&mut Object> {
        match value {
            Value::Object(id) => self.heap.get_mut(*id).ok_or(ExecError::DanglingObject),
            Value::Null => Err(ExecError::NullReference("object access".into())),
            other => Err(ExecError::NotAnObject(format!("{other:?}"))),
        }
    }

    /// Read a field by name; unset fields read as `Null`.
    pub fn field(&self, value: &Value, name: &str) -> ExecResult<Value> {
        Ok(self
            .object(value)?
            .fields
            .get(name)
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// `new Class(args)`, running the constructor taking `args.len()`
    /// parameters.
    pub fn construct(&mut self, class: &str, args: Vec<Value>) -> ExecResult<Value> {
        let this = Value::Object(self.alloc(class, Native::Plain));
        let mut call_args = Vec::with_capacity(args.len() + 1);
        call_args.push(this.clone());
        call_args.extend(args);

        let callee = self
            .lookup(class, CONSTRUCTOR_NAME, call_args.len() - 1)
            .ok_or_else(|| ExecError::UnresolvedMethod(format!("{class}::{CONSTRUCTOR_NAME}")))?;
        self.run(callee, call_args)?;
        Ok(this)
    }

    /// Virtual call of `name` on `receiver`.
    pub fn call(&mut self, receiver: &Value, name: &str, args: Vec<Value>) -> ExecResult<Option<Value>> {
        let class = self.object(receiver)?.class.clone();
        let callee = self
            .lookup(&class, name, args.len())
            .ok_or_else(|| ExecError::UnresolvedMethod(format!("{class}::{name}")))?;

        let mut call_args = Vec::with_capacity(args.len() + 1);
        call_args.push(receiver.clone());
        call_args.extend(args);
        self.run(callee, call_args)
    }

    /// Invoke `method` the way `call` (`virtual_ == false`) or `callvirt`
    /// would.
    pub fn invoke(&mut self, method: &MethodRef, args: Vec<Value>, virtual_: bool) -> ExecResult<Option<Value>> {
        let declaring = method.declaring_type.definition_name();
        let arity = method.params.len();

        let dispatch = virtual_ && method.has_this && self.is_virtual_target(&declaring, &method.name, arity);
        let start = if dispatch {
            let receiver = args
                .first()
                .ok_or_else(|| ExecError::StackUnderflow(method.to_string()))?;
            if receiver.is_null() {
                return Err(ExecError::NullReference(method.to_string()));
            }
            self.object(receiver)?.class.clone()
        } else {
            declaring
        };

        let callee = self
            .lookup(&start, &method.name, arity)
            .ok_or_else(|| ExecError::UnresolvedMethod(method.to_string()))?;
        self.run(callee, args)
    }

    /// First definition of `name/arity` from `declaring` upward decides; an
    /// unknown target (interfaces, foreign methods) is treated as virtual.
    fn is_virtual_target(&self, declaring: &str, name: &str, arity: usize) -> bool {
        let mut class = Some(declaring.to_string());
        for _ in 0..=self.module.type_count() {
            let Some(current) = class.take() else { break };
            let Some(ty) = self.module.find_type(&current) else { break };
            if self.module[ty].is_interface() {
                return true;
            }
            if let Some((_, def)) = self
                .module
                .methods_of(ty)
                .find(|(_, def)| def.name == name && def.params.len() == arity)
            {
                return def.is_virtual();
            }
            class = self.module.base_of(ty).map(|base| self.module[base].definition_name());
        }
        true
    }

    /// Walk from `class` up the base chain looking for an intrinsic or a
    /// method with a body.
    fn lookup(&self, class: &str, name: &str, arity: usize) -> Option<Callee> {
        let mut current = class.to_string();
        for _ in 0..=self.module.type_count() {
            if let Some(intrinsic) = self.intrinsics.get(&format!("{current}::{name}")) {
                return Some(Callee::Native(*intrinsic));
            }

            let ty = self.module.find_type(&current)?;
            let found = self.module.methods_of(ty).find(|(_, def)| {
                def.name == name && def.params.len() == arity && def.has_body()
            });
            if let Some((key, _)) = found {
                return Some(Callee::Body(key));
            }

            let base = self.module.base_of(ty)?;
            current = self.module[base].definition_name();
        }
        None
    }

    fn run(&mut self, callee: Callee, args: Vec<Value>) -> ExecResult<Option<Value>> {
        match callee {
            Callee::Native(intrinsic) => intrinsic(self, args),
            Callee::Body(key) => {
                let module = self.module;
                self.execute(&module[key], args)
            }
        }
    }

    fn execute(&mut self, method: &'m MethodDefinition, args: Vec<Value>) -> ExecResult<Option<Value>> {
        let Some(body) = method.body.as_ref() else {
            return Err(ExecError::UnresolvedMethod(method.name.clone()));
        };

        let order: Vec<_> = body.ids().collect();
        let positions: HashMap<_, _> = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut locals = vec![Value::Null; body.locals.len()];
        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0usize;

        loop {
            let Some(&id) = order.get(pc) else {
                return Err(ExecError::FellOffEnd(method.name.clone()));
            };
            let Some(instr) = body.get(id) else {
                return Err(ExecError::BadBranch);
            };

            self.steps += 1;
            if self.steps > self.step_limit {
                return Err(ExecError::StepLimitExceeded(self.step_limit));
            }

            let underflow = || ExecError::StackUnderflow(instr.to_string());
            let mut next = pc + 1;

            match instr {
                Instr::Nop => {}
                Instr::LoadArg(index) => {
                    let value = args
                        .get(usize::from(*index))
                        .cloned()
                        .ok_or(ExecError::BadArgument(*index))?;
                    stack.push(value);
                }
                Instr::LoadLocal(index) => {
                    let value = locals
                        .get(usize::from(*index))
                        .cloned()
                        .ok_or(ExecError::BadLocal(*index))?;
                    stack.push(value);
                }
                Instr::StoreLocal(index) => {
                    let value = stack.pop().ok_or_else(underflow)?;
                    let slot = locals
                        .get_mut(usize::from(*index))
                        .ok_or(ExecError::BadLocal(*index))?;
                    *slot = value;
                }
                Instr::LoadInt(value) => stack.push(Value::Int(*value)),
                Instr::LoadStr(value) => stack.push(Value::Str(value.clone())),
                Instr::LoadNull => stack.push(Value::Null),
                Instr::LoadField(field) => {
                    let target = stack.pop().ok_or_else(underflow)?;
                    if target.is_null() {
                        return Err(ExecError::NullReference(instr.to_string()));
                    }
                    stack.push(self.field(&target, &field.name)?);
                }
                Instr::StoreField(field) => {
                    let value = stack.pop().ok_or_else(underflow)?;
                    let target = stack.pop().ok_or_else(underflow)?;
                    if target.is_null() {
                        return Err(ExecError::NullReference(instr.to_string()));
                    }
                    self.object_mut(&target)?.fields.insert(field.name.clone(), value);
                }
                Instr::NewObj(ctor) => {
                    let call_args = pop_n(&mut stack, ctor.params.len()).ok_or_else(underflow)?;
                    let value = self.construct(&ctor.declaring_type.definition_name(), call_args)?;
                    stack.push(value);
                }
                Instr::Call(target) | Instr::CallVirt(target) => {
                    let call_args = pop_n(&mut stack, target.arity()).ok_or_else(underflow)?;
                    let result = self.invoke(target, call_args, instr.is_call_virt())?;
                    if target.return_type.is_some() {
                        stack.push(result.unwrap_or(Value::Null));
                    }
                }
                Instr::Dup => {
                    let top = stack.last().cloned().ok_or_else(underflow)?;
                    stack.push(top);
                }
                Instr::Pop => {
                    stack.pop().ok_or_else(underflow)?;
                }
                Instr::Br(target) => {
                    next = *positions.get(target).ok_or(ExecError::BadBranch)?;
                }
                Instr::BrTrue(target) | Instr::BrFalse(target) => {
                    let condition = stack.pop().ok_or_else(underflow)?;
                    if condition.is_truthy() == instr.is_br_true() {
                        next = *positions.get(target).ok_or(ExecError::BadBranch)?;
                    }
                }
                Instr::Ret => {
                    return if method.return_type.is_some() {
                        stack.pop().map(Some).ok_or_else(underflow)
                    } else {
                        Ok(None)
                    };
                }
                Instr::Throw => {
                    let value = stack.pop().ok_or_else(underflow)?;
                    return Err(ExecError::Thrown(value));
                }
            }

            pc = next;
        }
    }
}

fn pop_n(stack: &mut Vec<Value>, count: usize) -> Option<Vec<Value>> {
    let start = stack.len().checked_sub(count)?;
    Some(stack.split_off(start))
}
