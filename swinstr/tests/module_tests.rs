use semver::Version;
use swinstr::{
    modules::{
        Module,
        body::MethodBody,
        definitions::{FieldDefinition, MethodDefinition, MethodFlags, PropertyDefinition, TypeDefinition},
        instructions::Instr,
    },
    types::{AssemblyRef, MethodRef, TypeRef},
    utils::Error,
};

fn disposable() -> TypeRef {
    TypeRef::from_full_name("System.IDisposable")
}

/// Body of `Dispose` with an early exit: `ldc 1; brtrue RET; nop; ret`.
fn early_exit_body() -> MethodBody {
    let mut body = MethodBody::new();
    body.push(Instr::LoadInt(1));
    let branch = body.push(Instr::BrTrue(Default::default()));
    body.push(Instr::Nop);
    let exit = body.push(Instr::Ret);
    body.set_branch_target(branch, exit).unwrap();
    body
}

#[test]
fn latest_assembly_version_wins() {
    let mut module = Module::new("App");
    module.add_assembly_ref(AssemblyRef::new("System.Reactive.Core", Version::new(2, 2, 5)));
    module.add_assembly_ref(AssemblyRef::new("System.Reactive.Core", Version::new(3, 0, 0)));
    module.add_assembly_ref(AssemblyRef::new("mscorlib", Version::new(4, 0, 0)));
    module.add_assembly_ref(AssemblyRef::new("System.Reactive.Core", Version::new(2, 9, 0)));

    let found = module.find_assembly("System.Reactive.Core").unwrap();
    assert_eq!(found.version, Version::new(3, 0, 0));
    assert!(module.find_assembly("ReactiveUI").is_none());
}

#[test]
fn duplicate_types_and_fields_are_rejected() {
    let mut module = Module::new("App");
    let ty = module.add_type(TypeDefinition::new("App", "Model")).unwrap();
    assert_eq!(
        module.add_type(TypeDefinition::new("App", "Model")).unwrap_err(),
        Error::DuplicateType("App.Model".to_string())
    );

    module
        .add_field(ty, FieldDefinition::new("probe", disposable()))
        .unwrap();
    assert!(matches!(
        module.add_field(ty, FieldDefinition::new("probe", disposable())),
        Err(Error::DuplicateMember { .. })
    ));
    assert!(matches!(
        module.add_property(ty, PropertyDefinition::new("Command", disposable())).map(|_| ()),
        Ok(())
    ));
}

#[test]
fn base_types_resolve_through_the_index() {
    let mut module = Module::new("App");
    let object = module
        .add_type(TypeDefinition::imported("System", "Object", "mscorlib"))
        .unwrap();
    let base = module
        .add_type(TypeDefinition::new("App", "Base").extends(TypeRef::from_full_name("System.Object")))
        .unwrap();
    let derived = module
        .add_type(TypeDefinition::new("App", "Derived").extends(TypeRef::from_full_name("App.Base")))
        .unwrap();

    assert_eq!(module.base_of(derived), Some(base));
    assert_eq!(module.base_of(base), Some(object));
    assert_eq!(module.base_of(object), None);
    assert_eq!(module.local_types().count(), 2);
    assert_eq!(module.type_count(), 3);
}

#[test]
fn generic_members_are_referenced_through_the_self_instance() {
    let mut module = Module::new("App");
    let boxed = module
        .add_type(TypeDefinition::new("App", "Box`1").generic("T"))
        .unwrap();
    let field = module
        .add_field(boxed, FieldDefinition::new("value", TypeRef::generic_parameter("T")))
        .unwrap();

    let reference = module.field_ref(field);
    assert_eq!(reference.declaring_type.full_name(), "App.Box`1<T>");
    assert_eq!(reference.to_string(), "T App.Box`1<T>::value");
}

#[test]
fn method_refs_follow_the_definition() {
    let mut module = Module::new("App");
    let ty = module.add_type(TypeDefinition::new("App", "Model")).unwrap();
    let ctor = module.add_method(ty, MethodDefinition::constructor());
    let helper = module.add_method(
        ty,
        MethodDefinition::new("Make")
            .with_flags(MethodFlags::STATIC)
            .returns(disposable())
            .param("seed", TypeRef::from_full_name("System.Int64")),
    );

    assert!(module.method_ref(ctor).is_constructor());
    assert_eq!(module.constructors_of(ty).count(), 1);

    let helper = module.method_ref(helper);
    assert!(!helper.has_this);
    assert_eq!(
        helper.full_name(),
        "System.IDisposable App.Model::Make(System.Int64)"
    );
}

#[test]
fn plain_insert_before_keeps_branches_on_the_anchor() {
    let mut body = early_exit_body();
    let exit = body.final_exit().unwrap();
    body.insert_before(exit, [Instr::Nop]).unwrap();

    let branch = body.at(1).unwrap();
    assert_eq!(body.get(branch).unwrap().branch_target(), Some(exit));
    assert_eq!(body.len(), 5);
}

#[test]
fn retargeting_insert_runs_on_every_path() {
    let mut body = early_exit_body();
    let exit = body.final_exit().unwrap();
    let inserted = body
        .insert_before_retargeting(exit, [Instr::LoadInt(2), Instr::Pop])
        .unwrap();

    let branch = body.at(1).unwrap();
    assert_eq!(body.get(branch).unwrap().branch_target(), Some(inserted[0]));
    assert_eq!(body.final_exit(), Some(exit));
    assert_eq!(body.next(inserted[1]), Some(exit));
    assert_eq!(body.verify_stack(false), Ok(1));

    let listing = body.to_string();
    assert!(listing.contains("IL_0001: brtrue IL_0003"), "{listing}");
}

#[test]
fn insert_after_keeps_handles_stable() {
    let call = MethodRef::new(TypeRef::from_full_name("App.Source"), "Subscribe").returns(disposable());
    let mut body = MethodBody::from_instrs([Instr::load_this(), Instr::Call(call), Instr::Pop, Instr::Ret]);
    let anchor = body.at(1).unwrap();
    let pop = body.at(2).unwrap();

    let inserted = body.insert_after(anchor, [Instr::Dup, Instr::Pop]).unwrap();
    assert_eq!(body.position(inserted[0]), Some(2));
    assert_eq!(body.position(pop), Some(4));
    assert_eq!(body.verify_stack(false), Ok(2));
}

#[test]
fn anchor_from_another_body_is_rejected() {
    let mut other = MethodBody::from_instrs([Instr::Nop]);
    let foreign = other.push(Instr::Ret);
    let mut body = MethodBody::from_instrs([Instr::Ret]);

    assert_eq!(
        body.insert_before(foreign, [Instr::Nop]),
        Err(Error::UnknownInstruction(foreign))
    );
    assert_eq!(body.len(), 1);
}

#[test]
fn module_verify_reports_broken_bodies() {
    let mut module = Module::new("App");
    let ty = module.add_type(TypeDefinition::new("App", "Model")).unwrap();
    module.add_method(
        ty,
        MethodDefinition::new("Broken").with_body(MethodBody::from_instrs([Instr::Pop, Instr::Ret])),
    );

    assert!(matches!(module.verify(), Err(Error::StackUnderflow { position: 0, .. })));
}
