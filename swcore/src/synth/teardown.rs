//! Teardown location, synthesis and release injection.
//!
//! A target either declares its own teardown, which is used as is (an
//! author-written teardown that does not call up the chain keeps not doing
//! so), or inherits one. In the latter case an overriding teardown that
//! delegates to the inherited one is synthesized on the target.
use swinstr::{
    modules::{
        MethodKey, Module, TypeKey,
        body::{InsertedRun, MethodBody},
        definitions::{MethodDefinition, MethodFlags},
        instructions::Instr,
    },
    types::{FieldRef, MethodRef, TypeRef},
};

use crate::{
    hierarchy::Hierarchy,
    utils::error::{WeaveError, WeaveResult},
};

/// How the teardown of a target will be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownPlan {
    /// The target declares its own teardown, which ends in a `ret`.
    Existing(MethodKey),
    /// An override delegating to `ancestor` has to be synthesized.
    Synthesize { ancestor: MethodKey },
}

/// Decide how the teardown of `ty` is obtained without touching the module.
/// Every reason the target cannot be given a teardown is reported here, so
/// a failing target can be skipped before it is rewritten.
pub fn plan_teardown(hierarchy: &Hierarchy<'_>, ty: TypeKey) -> WeaveResult<TeardownPlan> {
    let module = hierarchy.module();

    if let Some(own) = hierarchy.own_teardown(ty) {
        let closed = module[own]
            .body
            .as_ref()
            .is_some_and(|body| body.final_exit().is_some());
        if !closed {
            return Err(WeaveError::MissingFinalExit(qualified_name(module, own)));
        }
        return Ok(TeardownPlan::Existing(own));
    }

    if module[ty].has_generic_params() {
        return Err(WeaveError::UnsupportedGenericSynthesis {
            type_name: module[ty].definition_name(),
            method: hierarchy.release_method().to_string(),
        });
    }

    let ancestor = hierarchy.nearest_ancestor_teardown(ty)?;
    if module[ancestor].is_final() {
        return Err(WeaveError::FinalTeardown(qualified_name(module, ancestor)));
    }
    Ok(TeardownPlan::Synthesize { ancestor })
}

/// Carry out `plan` on `ty` and return its teardown.
pub fn ensure_teardown(
    module: &mut Module,
    contract: &TypeRef,
    release_method: &str,
    ty: TypeKey,
    plan: TeardownPlan,
) -> WeaveResult<MethodKey> {
    let ancestor = match plan {
        TeardownPlan::Existing(own) => return Ok(own),
        TeardownPlan::Synthesize { ancestor } => ancestor,
    };

    let base_call = MethodRef {
        declaring_type: Hierarchy::new(module, contract, release_method)
            .ancestor_ref(ty, module[ancestor].declaring_type),
        ..module.method_ref(ancestor)
    };

    let inherited = &module[ancestor];
    let mut teardown = MethodDefinition::new(inherited.name.clone())
        .with_visibility(inherited.visibility)
        .with_body(MethodBody::from_instrs([
            Instr::load_this(),
            Instr::Call(base_call),
            Instr::Ret,
        ]));
    teardown.return_type = inherited.return_type.clone();
    teardown.flags = overriding_flags(inherited.flags);

    let key = module.add_method(ty, teardown);
    log::debug!("synthesized teardown {}", qualified_name(module, key));

    // The override only takes effect if the inherited teardown is virtual.
    let owner = module[ancestor].declaring_type;
    if module[owner].origin.is_local() {
        let flags = &mut module[ancestor].flags;
        *flags = (*flags - MethodFlags::NEW_SLOT) | MethodFlags::OVERRIDABLE;
    }

    Ok(key)
}

/// Flags of an override of a method flagged `inherited`.
pub fn overriding_flags(inherited: MethodFlags) -> MethodFlags {
    (inherited - MethodFlags::NEW_SLOT - MethodFlags::ABSTRACT - MethodFlags::FINAL)
        | MethodFlags::OVERRIDABLE
}

/// Insert `instrs` before the final `ret` of `teardown`. Branches that
/// returned through that `ret` now run the inserted code first.
pub fn append_release(
    module: &mut Module,
    teardown: MethodKey,
    instrs: impl IntoIterator<Item = Instr>,
) -> WeaveResult<InsertedRun> {
    let name = qualified_name(module, teardown);
    let body = module[teardown]
        .body
        .as_mut()
        .ok_or_else(|| WeaveError::MissingFinalExit(name.clone()))?;
    let exit = body
        .final_exit()
        .ok_or_else(|| WeaveError::MissingFinalExit(name))?;

    Ok(body.insert_before_retargeting(exit, instrs)?)
}

/// Release of the tracking container held in `field`.
pub fn release_field(field: &FieldRef, container_release: &MethodRef) -> [Instr; 3] {
    [
        Instr::load_this(),
        Instr::LoadField(field.clone()),
        Instr::CallVirt(container_release.clone()),
    ]
}

/// Release of the value returned by the property getter `getter`.
pub fn release_property(getter: &MethodRef, disposal_release: &MethodRef) -> [Instr; 3] {
    [
        Instr::load_this(),
        Instr::Call(getter.clone()),
        Instr::CallVirt(disposal_release.clone()),
    ]
}

fn qualified_name(module: &Module, method: MethodKey) -> String {
    let def = &module[method];
    format!("{}::{}", module[def.declaring_type].definition_name(), def.name)
}
