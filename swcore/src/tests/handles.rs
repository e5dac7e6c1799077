use swinstr::modules::definitions::MethodFlags;

use super::*;
use crate::{
    magic::DEFAULT_HANDLE_CALL_FRAGMENT, markers::MarkerKind, matcher::find_matches,
    report::TargetState,
};

#[test]
fn single_constructor_handle_is_released() {
    let woven = weave(|fixture| {
        fixture.single_constructor_single_subscribe();
    });
    let mut machine = woven.machine();

    let model = machine
        .construct(&class("SingleConstructorSingleSubscribeModel"), vec![])
        .unwrap();
    let tracker = tracker(&machine, &model, "SingleConstructorSingleSubscribeModel");
    assert_eq!(counts(&machine, &tracker), (0, 1));

    runtime::dispose(&mut machine, &model).unwrap();
    assert!(released(&machine, &tracker));
    assert_eq!(counts(&machine, &tracker), (1, 0));
    assert_eq!(counts(&machine, &probe(&machine, &model)), (1, 0));

    let target = woven
        .report
        .find(&class("SingleConstructorSingleSubscribeModel"), MarkerKind::TrackHandles)
        .unwrap();
    assert_eq!(target.state, TargetState::Released);
    assert_eq!(target.registrations, 1);
    assert_eq!(target.constructors, 1);
}

#[test]
fn unmarked_constructor_is_not_instrumented() {
    let woven = weave(|fixture| {
        fixture.two_constructors_one_marked();
    });
    let mut machine = woven.machine();
    let name = "TwoConstructorsOnlyOneMarkedModel";

    // Every constructor initializes the tracker, only the marked one
    // registers its handle.
    let unmarked = machine.construct(&class(name), vec![Value::Int(1)]).unwrap();
    let tracker = tracker(&machine, &unmarked, name);
    assert_eq!(entries(&machine, &tracker), 0);

    runtime::dispose(&mut machine, &unmarked).unwrap();
    assert!(released(&machine, &tracker));
    assert_eq!(counts(&machine, &probe(&machine, &unmarked)), (0, 1));

    let marked = machine.construct(&class(name), vec![]).unwrap();
    runtime::dispose(&mut machine, &marked).unwrap();
    assert_eq!(counts(&machine, &probe(&machine, &marked)), (1, 0));
}

#[test]
fn marked_method_handle_is_released() {
    let woven = weave(|fixture| {
        fixture.single_method_single_subscribe();
    });
    let mut machine = woven.machine();
    let name = "SingleMethodSingleSubscribeModel";

    let model = machine.construct(&class(name), vec![]).unwrap();
    let tracker = tracker(&machine, &model, name);
    assert_eq!(entries(&machine, &tracker), 0);

    machine.call(&model, "SingleMethod", vec![]).unwrap();
    assert_eq!(counts(&machine, &tracker), (0, 1));

    runtime::dispose(&mut machine, &model).unwrap();
    assert_eq!(counts(&machine, &tracker), (1, 0));
}

#[test]
fn unmarked_method_handle_stays_live() {
    let woven = weave(|fixture| {
        fixture.two_methods_one_marked();
    });
    let mut machine = woven.machine();
    let name = "TwoMethodsOnlyOneMarkedModel";

    let model = machine.construct(&class(name), vec![]).unwrap();
    let tracked = machine.call(&model, "MethodWithMarker", vec![]).unwrap().unwrap();
    let untracked = machine.call(&model, "MethodWithoutMarker", vec![]).unwrap().unwrap();

    let tracker = tracker(&machine, &model, name);
    assert_eq!(runtime::entries(&machine, &tracker).unwrap(), vec![tracked.clone()]);

    runtime::dispose(&mut machine, &model).unwrap();
    assert!(released(&machine, &tracked));
    assert!(!released(&machine, &untracked));
}

#[test]
fn every_call_site_is_registered_once() {
    let woven = weave(|fixture| {
        fixture.three_methods_multiple_subscribes();
    });
    let name = "ThreeMethodsWithMultipleSubscribesModel";
    let ty = woven.fixture.module.find_type(&class(name)).unwrap();

    let target = woven.report.find(&class(name), MarkerKind::TrackHandles).unwrap();
    assert_eq!(target.registrations, 4);

    // The registration helper does not look like a handle-producing call.
    let rescanned: usize = woven
        .fixture
        .module
        .methods_of(ty)
        .filter_map(|(_, method)| method.body.as_ref())
        .map(|body| {
            find_matches(body, &models::disposable(), DEFAULT_HANDLE_CALL_FRAGMENT).len()
        })
        .sum();
    assert_eq!(rescanned, 4);

    let mut machine = woven.machine();
    let model = machine.construct(&class(name), vec![]).unwrap();
    machine.call(&model, "MethodOne", vec![]).unwrap();
    let source = observable(&mut machine);
    assert_eq!(
        machine.call(&model, "MethodTwo", vec![source]).unwrap(),
        Some(Value::Int(1))
    );
    let returned = machine.call(&model, "MethodThree", vec![]).unwrap().unwrap();

    let tracker = tracker(&machine, &model, name);
    assert_eq!(counts(&machine, &tracker), (0, 4));
    assert!(runtime::entries(&machine, &tracker).unwrap().contains(&returned));

    runtime::dispose(&mut machine, &model).unwrap();
    assert_eq!(counts(&machine, &tracker), (4, 0));
}

#[test]
fn type_wide_marker_tracks_every_member() {
    let woven = weave(|fixture| {
        fixture.class_single_constructor_two_methods();
    });
    let mut machine = woven.machine();
    let name = "ClassSingleConstructorTwoMethods";

    let model = machine.construct(&class(name), vec![]).unwrap();
    machine.call(&model, "MethodOne", vec![]).unwrap();
    machine.call(&model, "MethodTwo", vec![]).unwrap();

    let own = tracker(&machine, &model, name);
    assert_eq!(entries(&machine, &own), 3);

    runtime::dispose(&mut machine, &model).unwrap();
    assert!(released(&machine, &own));
    assert_eq!(counts(&machine, &own), (3, 0));

    let other = machine
        .construct(&class(name), vec![Value::Str("name".into())])
        .unwrap();
    assert_eq!(entries(&machine, &tracker(&machine, &other, name)), 0);

    let target = woven.report.find(&class(name), MarkerKind::TrackHandles).unwrap();
    assert!(target.type_wide);
    assert_eq!(target.constructors, 2);
}

#[test]
fn own_teardown_without_base_call_leaves_base_tracker_live() {
    let woven = weave(|fixture| {
        fixture.class_single_constructor_two_methods();
        fixture.complex_class();
    });
    let mut machine = woven.machine();
    let base = "ClassSingleConstructorTwoMethods";

    let model = machine.construct(&class("ComplexClass"), vec![]).unwrap();
    machine.call(&model, "ComplexMethodOne", vec![]).unwrap();
    machine.call(&model, "MethodOne", vec![]).unwrap();
    assert_eq!(machine.field(&model, "IntValue").unwrap(), Value::Int(10));

    let own = tracker(&machine, &model, "ComplexClass");
    let inherited = tracker(&machine, &model, base);
    assert_eq!(entries(&machine, &own), 3);
    assert_eq!(entries(&machine, &inherited), 2);

    runtime::dispose(&mut machine, &model).unwrap();
    assert_eq!(machine.field(&model, "IntValue").unwrap(), Value::Int(0));
    assert_eq!(counts(&machine, &own), (3, 0));
    assert!(!released(&machine, &inherited));
    assert_eq!(counts(&machine, &inherited), (0, 2));

    // The string constructor only chains to the base one, which does not
    // subscribe.
    let other = machine
        .construct(&class("ComplexClass"), vec![Value::Str("name".into())])
        .unwrap();
    assert_eq!(entries(&machine, &tracker(&machine, &other, "ComplexClass")), 0);
    assert_eq!(machine.field(&other, "IntValue").unwrap(), Value::Int(10));
}

#[test]
fn marked_constructor_and_method_register_two_handles() {
    let woven = weave(|fixture| {
        fixture.constructor_and_method_marked();
    });
    let mut machine = woven.machine();
    let name = "ConstructorAndMethodMarkedModel";

    let model = machine.construct(&class(name), vec![]).unwrap();
    machine.call(&model, "Refresh", vec![]).unwrap();
    machine.call(&model, "Unmarked", vec![]).unwrap();

    runtime::dispose(&mut machine, &model).unwrap();
    assert_eq!(counts(&machine, &tracker(&machine, &model, name)), (2, 0));
    assert_eq!(counts(&machine, &probe(&machine, &model)), (2, 1));
}

#[test]
fn zero_matches_still_release_an_empty_container() {
    let woven = weave(|fixture| {
        fixture.empty_tracked();
    });
    let mut machine = woven.machine();
    let name = "EmptyTrackedModel";

    let model = machine.construct(&class(name), vec![]).unwrap();
    machine.call(&model, "Touch", vec![]).unwrap();
    let tracker = tracker(&machine, &model, name);
    assert_eq!(entries(&machine, &tracker), 0);
    assert!(!released(&machine, &tracker));

    runtime::dispose(&mut machine, &model).unwrap();
    assert!(released(&machine, &tracker));
    assert_eq!(
        woven.report.find(&class(name), MarkerKind::TrackHandles).unwrap().registrations,
        0
    );
}

#[test]
fn early_exit_paths_release_too() {
    let woven = weave(|fixture| {
        fixture.early_exit_teardown();
    });
    let mut machine = woven.machine();
    let name = "EarlyExitTeardownModel";

    // Force the early exit on the very first release.
    let model = machine.construct(&class(name), vec![]).unwrap();
    machine
        .object_mut(&model)
        .unwrap()
        .fields
        .insert("Released".into(), Value::Int(1));

    runtime::dispose(&mut machine, &model).unwrap();
    assert_eq!(counts(&machine, &tracker(&machine, &model, name)), (1, 0));

    let fresh = machine.construct(&class(name), vec![]).unwrap();
    runtime::dispose(&mut machine, &fresh).unwrap();
    runtime::dispose(&mut machine, &fresh).unwrap();
    assert_eq!(machine.field(&fresh, "Released").unwrap(), Value::Int(1));
    assert_eq!(counts(&machine, &tracker(&machine, &fresh, name)), (1, 0));
}

#[test]
fn inherited_teardown_becomes_overridable() {
    let woven = weave(|fixture| {
        fixture.single_method_single_subscribe();
    });
    let module = &woven.fixture.module;

    let (_, inherited) = module
        .methods_of(woven.fixture.test_model_base)
        .find(|(_, method)| method.name == "Dispose")
        .unwrap();
    assert!(inherited.flags.contains(MethodFlags::OVERRIDABLE));
    assert!(!inherited.flags.contains(MethodFlags::NEW_SLOT));

    let ty = module.find_type(&class("SingleMethodSingleSubscribeModel")).unwrap();
    let (_, synthesized) = module
        .methods_of(ty)
        .find(|(_, method)| method.name == "Dispose")
        .unwrap();
    let listing = synthesized.body.as_ref().unwrap().to_string();
    assert_eq!(
        listing,
        format!(
            "IL_0000: ldarg 0\n\
             IL_0001: call System.Void {base}::Dispose()\n\
             IL_0002: ldarg 0\n\
             IL_0003: ldfld System.Reactive.Disposables.CompositeDisposable {model}::{field}\n\
             IL_0004: callvirt System.Void System.Reactive.Disposables.CompositeDisposable::Dispose()\n\
             IL_0005: ret\n",
            base = class("TestModelBase"),
            model = class("SingleMethodSingleSubscribeModel"),
            field = models::tracker_name("SingleMethodSingleSubscribeModel"),
        )
    );
}

#[test]
fn generic_model_with_own_teardown_is_woven() {
    let woven = weave(|fixture| {
        fixture.generic_with_teardown();
    });
    let mut machine = woven.machine();
    let name = "GenericDisposableModel`1";

    let model = machine.construct(&class(name), vec![]).unwrap();
    runtime::dispose(&mut machine, &model).unwrap();
    assert_eq!(counts(&machine, &tracker(&machine, &model, name)), (1, 0));
    assert!(woven.log.errors().is_empty());
}

#[test]
fn derived_target_declared_first_chains_to_its_base_target() {
    let woven = weave(|fixture| {
        fixture.leaf_declared_before_mid();
    });
    let module = &woven.fixture.module;
    let leaf = module.find_type(&class("LeafTrackedModel")).unwrap();

    let (_, teardown) = module
        .methods_of(leaf)
        .find(|(_, method)| method.name == "Dispose")
        .unwrap();
    let base_call = teardown.body.as_ref().unwrap().instrs().nth(1).unwrap().to_string();
    assert_eq!(
        base_call,
        format!("call System.Void {}::Dispose()", class("MidTrackedModel"))
    );

    let mut machine = woven.machine();
    let model = machine.construct(&class("LeafTrackedModel"), vec![]).unwrap();
    runtime::dispose(&mut machine, &model).unwrap();
    assert_eq!(counts(&machine, &tracker(&machine, &model, "LeafTrackedModel")), (1, 0));
    assert_eq!(counts(&machine, &tracker(&machine, &model, "MidTrackedModel")), (1, 0));
}
