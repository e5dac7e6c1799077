use swinstr::{
    modules::{
        MethodKey, Module, TypeKey,
        definitions::{FieldDefinition, Visibility},
        instructions::Instr,
    },
    types::{FieldRef, MethodRef, TypeRef},
};

use crate::utils::error::{WeaveError, WeaveResult};

/// Name of the tracking field of the type named `type_name`.
pub fn tracking_field_name(prefix: &str, type_name: &str) -> String {
    format!("{prefix}{type_name}")
}

/// Append the private tracking field to `ty`. The returned reference is bound
/// to `ty` instantiated over its own generic parameters.
pub fn add_tracking_field(
    module: &mut Module,
    ty: TypeKey,
    prefix: &str,
    container: &TypeRef,
) -> WeaveResult<FieldRef> {
    let name = tracking_field_name(prefix, &module[ty].name);
    if module.fields_of(ty).any(|(_, field)| field.name == name) {
        return Err(WeaveError::TrackingFieldExists(module[ty].definition_name()));
    }

    let key = module.add_field(
        ty,
        FieldDefinition::new(name, container.clone()).with_visibility(Visibility::Private),
    )?;
    let field = module.field_ref(key);
    log::debug!("added tracking field {field}");
    Ok(field)
}

/// Prologue initializing the tracking field with a fresh container.
pub fn prologue(field: &FieldRef, container_ctor: &MethodRef) -> [Instr; 3] {
    [
        Instr::load_this(),
        Instr::NewObj(container_ctor.clone()),
        Instr::StoreField(field.clone()),
    ]
}

/// Insert the prologue at the head of every instance constructor declared
/// on `ty`. Returns the number of constructors instrumented.
///
/// The prologue is inserted before the existing first instruction without
/// retargeting: a branch back to the start of the constructor does not
/// allocate a second container.
pub fn instrument_constructors(
    module: &mut Module,
    ty: TypeKey,
    field: &FieldRef,
    container_ctor: &MethodRef,
) -> WeaveResult<usize> {
    let constructors: Vec<MethodKey> = module
        .constructors_of(ty)
        .filter(|(_, ctor)| !ctor.is_static() && ctor.has_body())
        .map(|(key, _)| key)
        .collect();

    let mut count = 0;
    for key in constructors {
        let Some(body) = module[key].body.as_mut() else {
            continue;
        };
        let Some(head) = body.first() else {
            log::debug!("constructor {key:?} has an empty body");
            continue;
        };
        body.insert_before(head, prologue(field, container_ctor))?;
        count += 1;
    }

    log::trace!("instrumented {count} constructor(s) of {}", module[ty].name);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use swinstr::modules::definitions::MethodDefinition;

    use super::*;
    use crate::{
        magic::DEFAULT_FIELD_PREFIX,
        tests_utils::models::{self, Fixture},
    };

    #[test]
    fn field_is_private_and_unique() {
        let mut fixture = Fixture::new();
        let ty = fixture.single_constructor_single_subscribe();

        let field =
            add_tracking_field(&mut fixture.module, ty, DEFAULT_FIELD_PREFIX, &models::container())
                .unwrap();
        assert_eq!(
            field.name,
            models::tracker_name("SingleConstructorSingleSubscribeModel")
        );
        assert_eq!(field.field_type, models::container());

        let (_, def) = fixture
            .module
            .fields_of(ty)
            .find(|(_, def)| def.name == field.name)
            .unwrap();
        assert!(def.visibility.is_private());

        let again =
            add_tracking_field(&mut fixture.module, ty, DEFAULT_FIELD_PREFIX, &models::container());
        assert!(again.unwrap_err().is_tracking_field_exists());
    }

    #[test]
    fn generic_fields_are_bound_to_the_self_instance() {
        let mut fixture = Fixture::new();
        let ty = fixture.generic_with_teardown();

        let field =
            add_tracking_field(&mut fixture.module, ty, DEFAULT_FIELD_PREFIX, &models::container())
                .unwrap();
        assert_eq!(
            field.declaring_type,
            models::model("GenericDisposableModel`1")
                .with_generic_args([TypeRef::generic_parameter("T")])
        );
    }

    #[test]
    fn prologue_heads_every_instance_constructor() {
        let mut fixture = Fixture::new();
        let ty = fixture.two_constructors_one_marked();
        // A static constructor must stay untouched.
        let cctor = fixture.module.add_method(
            ty,
            MethodDefinition::constructor()
                .with_flags(swinstr::modules::definitions::MethodFlags::STATIC)
                .with_body(swinstr::modules::body::MethodBody::from_instrs([Instr::Ret])),
        );

        let field =
            add_tracking_field(&mut fixture.module, ty, DEFAULT_FIELD_PREFIX, &models::container())
                .unwrap();
        let count =
            instrument_constructors(&mut fixture.module, ty, &field, &models::container_ctor())
                .unwrap();
        assert_eq!(count, 2);

        for (key, ctor) in fixture.module.constructors_of(ty) {
            let head: Vec<_> = ctor.body.as_ref().unwrap().instrs().take(3).cloned().collect();
            if key == cctor {
                assert_eq!(head, vec![Instr::Ret]);
            } else {
                assert_eq!(head, prologue(&field, &models::container_ctor()).to_vec());
            }
        }
        fixture.module.verify().unwrap();
    }
}
