//! Reactive runtime backing the imported metadata of the fixtures.
//!
//! Intrinsics implement the tracking container (`CompositeDisposable`), the
//! registration helper, a never-completing observable source and the
//! subscriptions it hands out.
use swinstr::types::{MethodRef, TypeRef};

use crate::tests_utils::{
    machine::{ExecError, ExecResult, Machine, Native, Value},
    models,
};

pub const SUBSCRIPTION_CLASS: &str = "Sweep.Testing.Subscription";
pub const OBSERVABLE_CLASS: &str = "Sweep.Testing.NeverObservable";

/// A machine over `module` with every runtime intrinsic installed.
pub fn machine(module: &swinstr::modules::Module) -> Machine<'_> {
    let mut machine = Machine::new(module);
    install(&mut machine);
    machine
}

pub fn install(machine: &mut Machine<'_>) {
    let container = models::container().definition_name();

    machine.register("System.Object::.ctor", object_ctor);
    machine.register(format!("{container}::.ctor"), container_ctor);
    machine.register(format!("{container}::Add"), container_add);
    machine.register(format!("{container}::Dispose"), container_dispose);
    machine.register("System.ObservableExtensions::Subscribe", subscribe);
    machine.register("Sweep.Testing.Signals::Never", never);
    machine.register("Sweep.Core.TrackingExtensions::TrackWith", track_with);
    machine.register(format!("{SUBSCRIPTION_CLASS}::Dispose"), subscription_dispose);
}

/// Release `value` through the disposal contract.
pub fn dispose(machine: &mut Machine<'_>, value: &Value) -> ExecResult<()> {
    let release = MethodRef::new(TypeRef::from_full_name("System.IDisposable"), "Dispose");
    machine.invoke(&release, vec![value.clone()], true)?;
    Ok(())
}

/// Entries registered into a tracking container, released or not.
pub fn entries(machine: &Machine<'_>, container: &Value) -> ExecResult<Vec<Value>> {
    match &machine.object(container)?.native {
        Native::Composite { entries, .. } => Ok(entries.clone()),
        _ => Err(ExecError::NotAnObject(format!("{container:?} is not a container"))),
    }
}

/// Release state of a container, a subscription, or any object exposing an
/// `IsDisposed` flag.
pub fn is_disposed(machine: &Machine<'_>, value: &Value) -> ExecResult<bool> {
    let object = machine.object(value)?;
    Ok(match &object.native {
        Native::Composite { disposed, .. } | Native::Handle { disposed } => *disposed,
        Native::Plain => object
            .fields
            .get("IsDisposed")
            .is_some_and(|flag| *flag == Value::Int(1)),
    })
}

/// `(released, live)` counts over the entries of `container`.
pub fn release_counts(machine: &Machine<'_>, container: &Value) -> ExecResult<(usize, usize)> {
    let mut released = 0;
    let mut live = 0;
    for entry in entries(machine, container)? {
        if is_disposed(machine, &entry)? {
            released += 1;
        } else {
            live += 1;
        }
    }
    Ok((released, live))
}

fn this(args: &[Value]) -> ExecResult<&Value> {
    args.first()
        .ok_or_else(|| ExecError::StackUnderflow("missing receiver".into()))
}

fn object_ctor(_: &mut Machine<'_>, _: Vec<Value>) -> ExecResult<Option<Value>> {
    Ok(None)
}

fn container_ctor(machine: &mut Machine<'_>, args: Vec<Value>) -> ExecResult<Option<Value>> {
    machine.object_mut(this(&args)?)?.native = Native::Composite {
        entries: Vec::new(),
        disposed: false,
    };
    Ok(None)
}

fn container_add(machine: &mut Machine<'_>, args: Vec<Value>) -> ExecResult<Option<Value>> {
    let item = args
        .get(1)
        .cloned()
        .ok_or_else(|| ExecError::StackUnderflow("CompositeDisposable::Add".into()))?;

    let already_disposed = match &mut machine.object_mut(this(&args)?)?.native {
        Native::Composite { entries, disposed } => {
            entries.push(item.clone());
            *disposed
        }
        _ => return Err(ExecError::NotAnObject("CompositeDisposable::Add receiver".into())),
    };

    // A released container releases late additions right away.
    if already_disposed {
        dispose(machine, &item)?;
    }
    Ok(None)
}

fn container_dispose(machine: &mut Machine<'_>, args: Vec<Value>) -> ExecResult<Option<Value>> {
    let pending = match &mut machine.object_mut(this(&args)?)?.native {
        Native::Composite { entries, disposed } if !*disposed => {
            *disposed = true;
            entries.clone()
        }
        Native::Composite { .. } => Vec::new(),
        _ => return Err(ExecError::NotAnObject("CompositeDisposable::Dispose receiver".into())),
    };

    for entry in &pending {
        dispose(machine, entry)?;
    }
    Ok(None)
}

fn subscription_dispose(machine: &mut Machine<'_>, args: Vec<Value>) -> ExecResult<Option<Value>> {
    if let Native::Handle { disposed } = &mut machine.object_mut(this(&args)?)?.native {
        *disposed = true;
    }
    Ok(None)
}

fn never(machine: &mut Machine<'_>, _: Vec<Value>) -> ExecResult<Option<Value>> {
    Ok(Some(Value::Object(machine.alloc(OBSERVABLE_CLASS, Native::Plain))))
}

fn subscribe(machine: &mut Machine<'_>, args: Vec<Value>) -> ExecResult<Option<Value>> {
    let source = this(&args)?;
    if source.is_null() {
        return Err(ExecError::NullReference("ObservableExtensions::Subscribe".into()));
    }
    let handle = machine.alloc(SUBSCRIPTION_CLASS, Native::Handle { disposed: false });
    Ok(Some(Value::Object(handle)))
}

fn track_with(machine: &mut Machine<'_>, args: Vec<Value>) -> ExecResult<Option<Value>> {
    let [handle, container] = <[Value; 2]>::try_from(args)
        .map_err(|_| ExecError::StackUnderflow("TrackingExtensions::TrackWith".into()))?;
    container_add(machine, vec![container, handle.clone()])?;
    Ok(Some(handle))
}
