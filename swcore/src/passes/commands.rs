//! Command-release pass
//!
//! Releases, at the end of the teardown, every in-scope property whose type
//! is both a command and disposable. Runs after the handle-tracking pass so
//! these releases follow the tracking container's.
use smallvec::SmallVec;
use swinstr::{
    modules::{MethodKey, Module},
    types::MethodRef,
};

use crate::{
    deps::CommandDependencies,
    passes::PassContext,
    report::{TargetReport, TargetState},
    selector::Target,
    synth::teardown::{append_release, ensure_teardown, plan_teardown, release_property},
    utils::error::{WeaveError, WeaveResult},
};

pub fn weave_target(
    module: &mut Module,
    ctx: PassContext<'_>,
    commands: &CommandDependencies,
    target: Target,
    entry: &mut TargetReport,
) -> WeaveResult<()> {
    let ty = target.ty;
    let deps = ctx.deps;

    let (plan, getters) = {
        let hierarchy = ctx.hierarchy(module);
        if !hierarchy.is_disposable(ty) {
            return Err(WeaveError::NotDisposable(module[ty].definition_name()));
        }
        let plan = plan_teardown(&hierarchy, ty)?;

        let mut getters: SmallVec<MethodRef, 4> = SmallVec::new();
        for key in target.properties(module, ctx.markers) {
            let property = &module[key];
            let releasable = hierarchy.is_assignable_to(&property.property_type, &commands.capability)
                && hierarchy.is_assignable_to(&property.property_type, &deps.disposal_contract);
            match property.getter {
                Some(getter) if releasable => getters.push(module.method_ref(getter)),
                _ => log::debug!("property {} is not a releasable command", property.name),
            }
        }
        (plan, getters)
    };

    let teardown = ensure_teardown(
        module,
        &deps.disposal_contract,
        &ctx.config.release_method,
        ty,
        plan,
    )?;
    entry.advance(TargetState::TeardownEnsured);

    entry.properties_released =
        release_properties(module, teardown, &getters, &deps.disposal_release)?;
    entry.advance(TargetState::Released);
    Ok(())
}

/// Release the value of each of `getters` before the final exit of
/// `teardown`, in order. Returns the number of releases appended.
pub fn release_properties(
    module: &mut Module,
    teardown: MethodKey,
    getters: &[MethodRef],
    disposal_release: &MethodRef,
) -> WeaveResult<usize> {
    for getter in getters {
        append_release(module, teardown, release_property(getter, disposal_release))?;
    }
    Ok(getters.len())
}
