//! Fixture modules
//!
//! [`runtime_module`] holds the imported metadata of the collaborators
//! (`mscorlib`, the reactive core, the tracking helpers, the command
//! library). [`Fixture`] adds the local model hierarchy the scenarios build
//! on:
//!
//! - `TestModelBase`: disposable root owning a `Probe` container. Models add
//!   every handle they produce to the probe, which is never released, so
//!   tests can observe which handles the woven teardown released.
//! - `BaseModel`: empty intermediate base.
//! - `CommandDecorator<T>`: a command recording its own release.
//!
//! Each scenario model is added by a dedicated `Fixture` method.
use semver::Version;
use swinstr::{
    modules::{
        FieldKey, MethodKey, Module, PropertyKey, TypeKey,
        body::MethodBody,
        definitions::{
            FieldDefinition, MethodDefinition, MethodFlags, PropertyDefinition, TypeDefinition,
            TypeFlags, Visibility,
        },
        instructions::Instr,
    },
    types::{AssemblyRef, FieldRef, MethodRef, TypeRef},
};

use crate::{
    ext::swlog::LogSinks,
    magic::{RELEASE_COMMANDS_MARKER, TRACK_HANDLES_MARKER},
    report::WeaveReport,
    utils::error::WeaveResult,
    weaver::ModuleWeaver,
};

pub const MODELS_NAMESPACE: &str = "Sweep.Tests.Models";

pub fn object() -> TypeRef {
    TypeRef::from_full_name("System.Object")
}

pub fn string() -> TypeRef {
    TypeRef::from_full_name("System.String")
}

pub fn int64() -> TypeRef {
    TypeRef::from_full_name("System.Int64")
}

pub fn boolean() -> TypeRef {
    TypeRef::from_full_name("System.Boolean")
}

pub fn disposable() -> TypeRef {
    TypeRef::from_full_name("System.IDisposable")
}

pub fn container() -> TypeRef {
    TypeRef::from_full_name("System.Reactive.Disposables.CompositeDisposable")
}

pub fn observable_of(arg: TypeRef) -> TypeRef {
    TypeRef::from_full_name("System.IObservable`1").with_generic_args([arg])
}

pub fn command_capability() -> TypeRef {
    TypeRef::from_full_name("ReactiveUI.IReactiveCommand")
}

pub fn model(name: &str) -> TypeRef {
    TypeRef::new(MODELS_NAMESPACE, name)
}

pub fn command_decorator_of(arg: TypeRef) -> TypeRef {
    model("CommandDecorator`1").with_generic_args([arg])
}

pub fn track_handles_marker() -> TypeRef {
    TypeRef::from_full_name(TRACK_HANDLES_MARKER)
}

pub fn release_commands_marker() -> TypeRef {
    TypeRef::from_full_name(RELEASE_COMMANDS_MARKER)
}

pub fn ctor_of(ty: TypeRef, params: &[TypeRef]) -> MethodRef {
    params
        .iter()
        .cloned()
        .fold(MethodRef::new(ty, ".ctor"), MethodRef::param)
}

pub fn object_ctor() -> MethodRef {
    ctor_of(object(), &[])
}

pub fn container_ctor() -> MethodRef {
    ctor_of(container(), &[])
}

pub fn container_add() -> MethodRef {
    MethodRef::new(container(), "Add").param(disposable())
}

pub fn container_dispose() -> MethodRef {
    MethodRef::new(container(), "Dispose")
}

pub fn disposable_dispose() -> MethodRef {
    MethodRef::new(disposable(), "Dispose")
}

/// `Sweep.Testing.Signals::Never()`, a source that never completes.
pub fn never() -> MethodRef {
    MethodRef::new(TypeRef::from_full_name("Sweep.Testing.Signals"), "Never")
        .static_()
        .returns(observable_of(string()))
}

/// The handle-producing call: `ObservableExtensions::Subscribe(source)`.
pub fn subscribe() -> MethodRef {
    MethodRef::new(TypeRef::from_full_name("System.ObservableExtensions"), "Subscribe")
        .static_()
        .returns(disposable())
        .param(observable_of(string()))
}

pub fn track_with() -> MethodRef {
    MethodRef::new(TypeRef::from_full_name("Sweep.Core.TrackingExtensions"), "TrackWith")
        .static_()
        .returns(disposable())
        .param(disposable())
        .param(container())
}

/// The container every model adds its handles to.
pub fn probe() -> FieldRef {
    FieldRef::new(model("TestModelBase"), "Probe", container())
}

/// Name of the tracking field the default configuration gives `type_name`.
pub fn tracker_name(type_name: &str) -> String {
    format!("{}{}", crate::magic::DEFAULT_FIELD_PREFIX, type_name)
}

/// `Probe.Add(Signals.Never().Subscribe())`
pub fn subscribe_into_probe() -> Vec<Instr> {
    vec![
        Instr::load_this(),
        Instr::LoadField(probe()),
        Instr::Call(never()),
        Instr::Call(subscribe()),
        Instr::CallVirt(container_add()),
    ]
}

/// `Probe.Add(source.Subscribe())` for the observable in argument `arg`.
pub fn subscribe_arg_into_probe(arg: u16) -> Vec<Instr> {
    vec![
        Instr::load_this(),
        Instr::LoadField(probe()),
        Instr::LoadArg(arg),
        Instr::Call(subscribe()),
        Instr::CallVirt(container_add()),
    ]
}

/// `var handle = Signals.Never().Subscribe(); Probe.Add(handle); return handle;`
/// Uses local 0.
pub fn subscribe_and_return() -> Vec<Instr> {
    vec![
        Instr::Call(never()),
        Instr::Call(subscribe()),
        Instr::StoreLocal(0),
        Instr::load_this(),
        Instr::LoadField(probe()),
        Instr::LoadLocal(0),
        Instr::CallVirt(container_add()),
        Instr::LoadLocal(0),
        Instr::Ret,
    ]
}

fn imported(module: &mut Module, full_name: &str, assembly: &str) -> TypeKey {
    let reference = TypeRef::from_full_name(full_name);
    module
        .add_type(TypeDefinition::imported(
            reference.namespace,
            reference.name,
            assembly,
        ))
        .expect("runtime metadata is unique")
}

/// Module with the referenced assemblies and the imported metadata of every
/// collaborator, and no local type.
pub fn runtime_module() -> Module {
    let mut module = Module::new("Sweep.Tests");
    for (name, version) in [
        ("mscorlib", Version::new(4, 0, 0)),
        ("System.Reactive.Core", Version::new(2, 2, 5)),
        ("System.Reactive.Core", Version::new(3, 0, 0)),
        ("Sweep.Core", Version::new(1, 0, 0)),
        ("ReactiveUI", Version::new(6, 5, 0)),
        ("Sweep.Testing", Version::new(0, 1, 0)),
    ] {
        module.add_assembly_ref(AssemblyRef::new(name, version));
    }

    let object_ty = imported(&mut module, "System.Object", "mscorlib");
    module.add_method(object_ty, MethodDefinition::constructor());
    for primitive in ["System.String", "System.Int64", "System.Boolean"] {
        imported(&mut module, primitive, "mscorlib");
    }

    let disposable_ty = imported(&mut module, "System.IDisposable", "mscorlib");
    module[disposable_ty].flags |= TypeFlags::INTERFACE | TypeFlags::ABSTRACT;
    module.add_method(
        disposable_ty,
        MethodDefinition::new("Dispose")
            .with_flags(MethodFlags::VIRTUAL | MethodFlags::ABSTRACT | MethodFlags::NEW_SLOT),
    );

    let observable_ty = imported(&mut module, "System.IObservable`1", "mscorlib");
    module[observable_ty].flags |= TypeFlags::INTERFACE | TypeFlags::ABSTRACT;
    module[observable_ty].generic_params.push("T".into());

    let container_ty = imported(&mut module, &container().definition_name(), "System.Reactive.Core");
    module[container_ty].base_type = Some(object());
    module[container_ty].interfaces.push(disposable());
    module.add_method(container_ty, MethodDefinition::constructor());
    module.add_method(
        container_ty,
        MethodDefinition::new("Add").param("item", disposable()),
    );
    module.add_method(
        container_ty,
        MethodDefinition::new("Dispose").with_flags(MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT),
    );

    let extensions_ty = imported(&mut module, "System.ObservableExtensions", "System.Reactive.Core");
    module.add_method(
        extensions_ty,
        MethodDefinition::new("Subscribe")
            .with_flags(MethodFlags::STATIC)
            .returns(disposable())
            .param("source", observable_of(TypeRef::generic_parameter("T"))),
    );

    let helper_ty = imported(&mut module, "Sweep.Core.TrackingExtensions", "Sweep.Core");
    module.add_method(
        helper_ty,
        MethodDefinition::new("TrackWith")
            .with_flags(MethodFlags::STATIC)
            .returns(disposable())
            .param("handle", disposable())
            .param("container", container()),
    );
    module.add_method(
        helper_ty,
        MethodDefinition::new("Forget")
            .with_flags(MethodFlags::STATIC)
            .param("handle", disposable()),
    );
    imported(&mut module, TRACK_HANDLES_MARKER, "Sweep.Core");
    imported(&mut module, RELEASE_COMMANDS_MARKER, "Sweep.Core");

    let command_ty = imported(&mut module, "ReactiveUI.IReactiveCommand", "ReactiveUI");
    module[command_ty].flags |= TypeFlags::INTERFACE | TypeFlags::ABSTRACT;
    module[command_ty].interfaces.push(disposable());

    let signals_ty = imported(&mut module, "Sweep.Testing.Signals", "Sweep.Testing");
    module.add_method(
        signals_ty,
        MethodDefinition::new("Never")
            .with_flags(MethodFlags::STATIC)
            .returns(observable_of(string())),
    );

    module
}

/// A local model type under construction.
pub struct ModelBuilder<'a> {
    module: &'a mut Module,
    ty: TypeKey,
    base_ctor: MethodRef,
}

impl ModelBuilder<'_> {
    pub fn key(&self) -> TypeKey {
        self.ty
    }

    pub fn self_ref(&self) -> TypeRef {
        self.module[self.ty].self_instance()
    }

    pub fn marked(self, marker: TypeRef) -> Self {
        self.module[self.ty].attributes.push(marker);
        self
    }

    pub fn generic(self, param: &str) -> Self {
        self.module[self.ty].generic_params.push(param.to_string());
        self
    }

    pub fn field(&mut self, name: &str, ty: TypeRef) -> FieldRef {
        let key: FieldKey = self
            .module
            .add_field(self.ty, FieldDefinition::new(name, ty).with_visibility(Visibility::Public))
            .expect("fixture fields are unique");
        self.module.field_ref(key)
    }

    /// Instance constructor: `base::.ctor(); code; ret`.
    pub fn ctor(
        &mut self,
        params: &[TypeRef],
        code: impl IntoIterator<Item = Instr>,
        markers: &[TypeRef],
    ) -> MethodKey {
        self.ctor_calling(self.base_ctor.clone(), params, code, markers)
    }

    /// Instance constructor delegating to `base_ctor`, forwarding the
    /// leading arguments it takes.
    pub fn ctor_calling(
        &mut self,
        base_ctor: MethodRef,
        params: &[TypeRef],
        code: impl IntoIterator<Item = Instr>,
        markers: &[TypeRef],
    ) -> MethodKey {
        let mut body = MethodBody::new();
        body.push(Instr::load_this());
        for index in 1..=base_ctor.params.len() {
            body.push(Instr::LoadArg(index as u16));
        }
        body.push(Instr::Call(base_ctor));
        for instr in code {
            body.push(instr);
        }
        body.push(Instr::Ret);

        let mut def = MethodDefinition::constructor().with_body(body);
        for (index, ty) in params.iter().enumerate() {
            def = def.param(format!("arg{index}"), ty.clone());
        }
        def.attributes.extend(markers.iter().cloned());
        self.module.add_method(self.ty, def)
    }

    /// Instance method whose body is exactly `code`.
    pub fn method(&mut self, def: MethodDefinition, code: impl IntoIterator<Item = Instr>) -> MethodKey {
        self.method_with_locals(def, code, [])
    }

    pub fn method_with_locals(
        &mut self,
        def: MethodDefinition,
        code: impl IntoIterator<Item = Instr>,
        locals: impl IntoIterator<Item = TypeRef>,
    ) -> MethodKey {
        let body = MethodBody::from_instrs(code).with_locals(locals);
        self.module.add_method(self.ty, def.with_body(body))
    }

    /// Void method: `code; ret`.
    pub fn void_method(
        &mut self,
        name: &str,
        code: impl IntoIterator<Item = Instr>,
        markers: &[TypeRef],
    ) -> MethodKey {
        let mut def = MethodDefinition::new(name);
        def.attributes.extend(markers.iter().cloned());
        self.method(def, code.into_iter().chain([Instr::Ret]))
    }

    /// Overriding teardown with body `code; ret`.
    pub fn teardown(&mut self, code: impl IntoIterator<Item = Instr>) -> MethodKey {
        let def = MethodDefinition::new("Dispose").with_flags(MethodFlags::OVERRIDABLE);
        self.method(def, code.into_iter().chain([Instr::Ret]))
    }

    /// Auto-property backed by a private field, with a getter.
    pub fn auto_property(&mut self, name: &str, ty: TypeRef, markers: &[TypeRef]) -> (FieldRef, PropertyKey) {
        let backing = self
            .module
            .add_field(self.ty, FieldDefinition::new(format!("<{name}>k__BackingField"), ty.clone()))
            .expect("fixture fields are unique");
        let backing = self.module.field_ref(backing);

        let getter = self.method(
            MethodDefinition::new(format!("get_{name}"))
                .returns(ty.clone())
                .with_flags(MethodFlags::SPECIAL_NAME),
            [Instr::load_this(), Instr::LoadField(backing.clone()), Instr::Ret],
        );

        let mut property = PropertyDefinition::new(name, ty).with_getter(getter);
        property.attributes.extend(markers.iter().cloned());
        let property = self
            .module
            .add_property(self.ty, property)
            .expect("fixture properties are unique");
        (backing, property)
    }
}

/// The runtime module plus the local model hierarchy.
pub struct Fixture {
    pub module: Module,
    pub test_model_base: TypeKey,
    pub base_model: TypeKey,
    pub command_decorator: TypeKey,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    pub fn new() -> Self {
        let mut module = runtime_module();

        let test_model_base = module
            .add_type(
                TypeDefinition::new(MODELS_NAMESPACE, "TestModelBase")
                    .extends(object())
                    .implements(disposable())
                    .with_flags(TypeFlags::ABSTRACT),
            )
            .expect("fresh module");
        let mut base = ModelBuilder {
            module: &mut module,
            ty: test_model_base,
            base_ctor: object_ctor(),
        };
        let probe = base.field("Probe", container());
        base.ctor(
            &[],
            [
                Instr::load_this(),
                Instr::NewObj(container_ctor()),
                Instr::StoreField(probe),
            ],
            &[],
        );
        base.method(
            MethodDefinition::new("Dispose").with_flags(MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT),
            [Instr::Ret],
        );

        let base_model = module
            .add_type(
                TypeDefinition::new(MODELS_NAMESPACE, "BaseModel")
                    .extends(model("TestModelBase"))
                    .with_flags(TypeFlags::ABSTRACT),
            )
            .expect("fresh module");
        ModelBuilder {
            module: &mut module,
            ty: base_model,
            base_ctor: ctor_of(model("TestModelBase"), &[]),
        }
        .ctor(&[], [], &[]);

        let command_decorator = module
            .add_type(
                TypeDefinition::new(MODELS_NAMESPACE, "CommandDecorator`1")
                    .generic("T")
                    .extends(object())
                    .implements(command_capability()),
            )
            .expect("fresh module");
        let mut decorator = ModelBuilder {
            module: &mut module,
            ty: command_decorator,
            base_ctor: object_ctor(),
        };
        let flag = decorator.field("IsDisposed", int64());
        decorator.ctor(&[], [], &[]);
        decorator.method(
            MethodDefinition::new("Dispose").with_flags(MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT),
            [
                Instr::load_this(),
                Instr::LoadInt(1),
                Instr::StoreField(flag),
                Instr::Ret,
            ],
        );

        Self {
            module,
            test_model_base,
            base_model,
            command_decorator,
        }
    }

    /// Start a local model deriving from `BaseModel`.
    pub fn model(&mut self, name: &str) -> ModelBuilder<'_> {
        self.model_extending(name, model("BaseModel"), ctor_of(model("BaseModel"), &[]))
    }

    pub fn model_extending(&mut self, name: &str, base: TypeRef, base_ctor: MethodRef) -> ModelBuilder<'_> {
        let ty = self
            .module
            .add_type(TypeDefinition::new(MODELS_NAMESPACE, name).extends(base))
            .expect("fixture model names are unique");
        ModelBuilder {
            module: &mut self.module,
            ty,
            base_ctor,
        }
    }

    pub fn weave(&mut self) -> WeaveResult<WeaveReport> {
        self.weave_with(LogSinks::silent())
    }

    pub fn weave_with(&mut self, sinks: LogSinks) -> WeaveResult<WeaveReport> {
        ModuleWeaver::new(&mut self.module, Default::default(), sinks).execute()
    }

    /// Marked constructor with one handle-producing call.
    pub fn single_constructor_single_subscribe(&mut self) -> TypeKey {
        let mut m = self.model("SingleConstructorSingleSubscribeModel");
        m.ctor(&[], subscribe_into_probe(), &[track_handles_marker()]);
        m.key()
    }

    /// `ctor()` is marked, `ctor(bool)` is not; both subscribe once.
    pub fn two_constructors_one_marked(&mut self) -> TypeKey {
        let mut m = self.model("TwoConstructorsOnlyOneMarkedModel");
        m.ctor(&[], subscribe_into_probe(), &[track_handles_marker()]);
        m.ctor(&[boolean()], subscribe_into_probe(), &[]);
        m.key()
    }

    pub fn single_method_single_subscribe(&mut self) -> TypeKey {
        let mut m = self.model("SingleMethodSingleSubscribeModel");
        m.ctor(&[], [], &[]);
        m.void_method("SingleMethod", subscribe_into_probe(), &[track_handles_marker()]);
        m.key()
    }

    /// Both methods subscribe and return the handle; only the first is
    /// marked.
    pub fn two_methods_one_marked(&mut self) -> TypeKey {
        let mut m = self.model("TwoMethodsOnlyOneMarkedModel");
        m.ctor(&[], [], &[]);
        m.method_with_locals(
            MethodDefinition::new("MethodWithMarker")
                .returns(disposable())
                .with_attribute(track_handles_marker()),
            subscribe_and_return(),
            [disposable()],
        );
        m.method_with_locals(
            MethodDefinition::new("MethodWithoutMarker").returns(disposable()),
            subscribe_and_return(),
            [disposable()],
        );
        m.key()
    }

    /// Four handle-producing call sites over three marked methods:
    /// `MethodOne()` (1), `MethodTwo(source) -> long` (1),
    /// `MethodThree() -> IDisposable` (2).
    pub fn three_methods_multiple_subscribes(&mut self) -> TypeKey {
        let mut m = self.model("ThreeMethodsWithMultipleSubscribesModel");
        m.ctor(&[], [], &[]);
        m.void_method("MethodOne", subscribe_into_probe(), &[track_handles_marker()]);
        m.method(
            MethodDefinition::new("MethodTwo")
                .returns(int64())
                .param("observable", observable_of(string()))
                .with_attribute(track_handles_marker()),
            subscribe_arg_into_probe(1)
                .into_iter()
                .chain([Instr::LoadInt(1), Instr::Ret]),
        );
        m.method_with_locals(
            MethodDefinition::new("MethodThree")
                .returns(disposable())
                .with_attribute(track_handles_marker()),
            subscribe_into_probe()
                .into_iter()
                .chain(subscribe_and_return()),
            [disposable()],
        );
        m.key()
    }

    /// Type-wide marker: `ctor()` (1), `ctor(string)` (0), `MethodOne` (1),
    /// `MethodTwo` (1).
    pub fn class_single_constructor_two_methods(&mut self) -> TypeKey {
        let mut m = self
            .model("ClassSingleConstructorTwoMethods")
            .marked(track_handles_marker());
        m.ctor(&[], subscribe_into_probe(), &[]);
        m.ctor(&[string()], [], &[]);
        m.void_method("MethodOne", subscribe_into_probe(), &[]);
        m.void_method("MethodTwo", subscribe_into_probe(), &[]);
        m.key()
    }

    /// Derives from `ClassSingleConstructorTwoMethods` (which must already be
    /// present). Its own teardown resets `IntValue` and does not call the
    /// base teardown.
    pub fn complex_class(&mut self) -> TypeKey {
        let parent = model("ClassSingleConstructorTwoMethods");
        let mut m = self
            .model_extending("ComplexClass", parent.clone(), ctor_of(parent.clone(), &[]))
            .marked(track_handles_marker());
        let int_value = m.field("IntValue", int64());
        let init = [
            Instr::load_this(),
            Instr::LoadInt(10),
            Instr::StoreField(int_value.clone()),
        ];

        m.ctor(&[], init.clone().into_iter().chain(subscribe_into_probe()), &[]);
        m.ctor_calling(
            ctor_of(parent, &[string()]),
            &[string()],
            init,
            &[track_handles_marker()],
        );
        m.void_method(
            "ComplexMethodOne",
            subscribe_into_probe().into_iter().chain(subscribe_into_probe()),
            &[],
        );
        m.teardown([
            Instr::load_this(),
            Instr::LoadInt(0),
            Instr::StoreField(int_value),
        ]);
        m.key()
    }

    /// Marked constructor and marked method, one call each.
    pub fn constructor_and_method_marked(&mut self) -> TypeKey {
        let mut m = self.model("ConstructorAndMethodMarkedModel");
        m.ctor(&[], subscribe_into_probe(), &[track_handles_marker()]);
        m.void_method("Refresh", subscribe_into_probe(), &[track_handles_marker()]);
        m.void_method("Unmarked", subscribe_into_probe(), &[]);
        m.key()
    }

    /// Type-wide marker without any handle-producing call.
    pub fn empty_tracked(&mut self) -> TypeKey {
        let mut m = self.model("EmptyTrackedModel").marked(track_handles_marker());
        m.ctor(&[], [], &[]);
        m.void_method("Touch", [Instr::Nop], &[]);
        m.key()
    }

    /// Marked but not disposable.
    pub fn not_disposable(&mut self) -> TypeKey {
        let mut m = self.model_extending("NotDisposableModel", object(), object_ctor());
        m.ctor(&[], [], &[]);
        m.void_method(
            "Listen",
            [Instr::Call(never()), Instr::Call(subscribe()), Instr::Pop],
            &[track_handles_marker()],
        );
        m.key()
    }

    /// Generic model relying on an inherited teardown.
    pub fn generic_without_teardown(&mut self) -> TypeKey {
        let mut m = self.model("GenericModel`1").generic("T");
        m.ctor(&[], [], &[]);
        m.void_method("Listen", subscribe_into_probe(), &[track_handles_marker()]);
        m.key()
    }

    /// Generic model declaring its own (empty) teardown.
    pub fn generic_with_teardown(&mut self) -> TypeKey {
        let mut m = self.model("GenericDisposableModel`1").generic("T");
        m.ctor(&[], subscribe_into_probe(), &[track_handles_marker()]);
        m.teardown([]);
        m.key()
    }

    /// Type-wide model whose teardown returns early through a branch to its
    /// final `ret` on every call after the first.
    pub fn early_exit_teardown(&mut self) -> TypeKey {
        let mut m = self.model("EarlyExitTeardownModel").marked(track_handles_marker());
        let released = m.field("Released", int64());
        m.ctor(&[], subscribe_into_probe(), &[]);

        let mut body = MethodBody::new();
        body.push(Instr::load_this());
        body.push(Instr::LoadField(released.clone()));
        let skip = body.push(Instr::BrTrue(Default::default()));
        body.push(Instr::load_this());
        body.push(Instr::LoadInt(1));
        body.push(Instr::StoreField(released));
        let exit = body.push(Instr::Ret);
        body.set_branch_target(skip, exit).expect("branch and exit belong to the body");

        m.module.add_method(
            m.ty,
            MethodDefinition::new("Dispose")
                .with_flags(MethodFlags::OVERRIDABLE)
                .with_body(body),
        );
        m.key()
    }

    /// One marked command property and one unmarked sibling.
    pub fn single_command_property(&mut self) -> TypeKey {
        let command = command_decorator_of(object());
        let mut m = self.model("SingleCommandPropertyModel");
        let (marked, _) = m.auto_property("Command", command.clone(), &[release_commands_marker()]);
        let (other, _) = m.auto_property("Other", command.clone(), &[]);
        m.ctor(&[], Self::assign_new_commands(&[marked, other]), &[]);
        m.key()
    }

    /// Type-wide command marker: two commands and a string property.
    pub fn two_commands_type_wide(&mut self) -> TypeKey {
        let command = command_decorator_of(object());
        let mut m = self
            .model("TwoCommandsTypeWideModel")
            .marked(release_commands_marker());
        let (first, _) = m.auto_property("Command1", command.clone(), &[]);
        let (second, _) = m.auto_property("Command2", command.clone(), &[]);
        let (name, _) = m.auto_property("Name", string(), &[]);
        m.ctor(
            &[],
            Self::assign_new_commands(&[first, second]).into_iter().chain([
                Instr::load_this(),
                Instr::LoadStr("model".into()),
                Instr::StoreField(name),
            ]),
            &[],
        );
        m.key()
    }

    /// Both families on one type: type-wide handle tracking and a marked
    /// command property.
    pub fn tracked_command_model(&mut self) -> TypeKey {
        let command = command_decorator_of(object());
        let mut m = self
            .model("TrackedCommandModel")
            .marked(track_handles_marker());
        let (backing, _) = m.auto_property("Command", command, &[release_commands_marker()]);
        m.ctor(
            &[],
            Self::assign_new_commands(&[backing])
                .into_iter()
                .chain(subscribe_into_probe()),
            &[],
        );
        m.key()
    }

    /// Handle target declared before the handle target it extends. Both
    /// subscribe once in their constructor.
    pub fn leaf_declared_before_mid(&mut self) -> (TypeKey, TypeKey) {
        let mid = model("MidTrackedModel");
        let mut leaf = self.model_extending("LeafTrackedModel", mid.clone(), ctor_of(mid, &[]));
        leaf.ctor(&[], subscribe_into_probe(), &[track_handles_marker()]);
        let leaf = leaf.key();

        let mut mid = self.model("MidTrackedModel");
        mid.ctor(&[], subscribe_into_probe(), &[track_handles_marker()]);
        (leaf, mid.key())
    }

    /// Command target without a teardown of its own, extended by a handle
    /// target.
    pub fn command_base_with_tracked_subtype(&mut self) -> (TypeKey, TypeKey) {
        let mut base = self.model("CommandBaseModel");
        let (backing, _) = base.auto_property(
            "Command",
            command_decorator_of(object()),
            &[release_commands_marker()],
        );
        base.ctor(&[], Self::assign_new_commands(&[backing]), &[]);
        let base_ref = base.self_ref();
        let base = base.key();

        let mut derived = self.model_extending(
            "TrackedCommandSubtypeModel",
            base_ref.clone(),
            ctor_of(base_ref, &[]),
        );
        derived.ctor(&[], subscribe_into_probe(), &[track_handles_marker()]);
        (base, derived.key())
    }

    fn assign_new_commands(fields: &[FieldRef]) -> Vec<Instr> {
        fields
            .iter()
            .flat_map(|field| {
                [
                    Instr::load_this(),
                    Instr::NewObj(ctor_of(command_decorator_of(object()), &[])),
                    Instr::StoreField(field.clone()),
                ]
            })
            .collect()
    }
}
