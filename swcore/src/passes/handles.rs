//! Handle-tracking pass
//!
//! For each target: add the tracking field, initialize it in every instance
//! constructor, register every handle produced inside the in-scope methods,
//! then release the field at the end of the teardown.
use smallvec::SmallVec;
use swinstr::modules::{MethodKey, Module};

use crate::{
    matcher::find_matches,
    passes::PassContext,
    report::{TargetReport, TargetState},
    selector::Target,
    swerror,
    synth::{
        callsite::register_matches,
        field::{add_tracking_field, instrument_constructors},
        teardown::{append_release, ensure_teardown, plan_teardown, release_field},
    },
    utils::error::{WeaveError, WeaveResult},
};

pub fn weave_target(
    module: &mut Module,
    ctx: PassContext<'_>,
    target: Target,
    entry: &mut TargetReport,
) -> WeaveResult<()> {
    let ty = target.ty;
    let deps = ctx.deps;

    let (plan, scope) = {
        let hierarchy = ctx.hierarchy(module);
        if !hierarchy.is_disposable(ty) {
            return Err(WeaveError::NotDisposable(module[ty].definition_name()));
        }
        let plan = plan_teardown(&hierarchy, ty)?;
        for method in target.excluded_methods(module, ctx.markers) {
            swerror!(
                ctx.sinks,
                "Marked method {}::{} is static or has no body and cannot be instrumented",
                module[ty].definition_name(),
                module[method].name
            );
        }
        let scope: SmallVec<MethodKey, 8> = target.methods(module, ctx.markers).collect();
        (plan, scope)
    };

    let field = add_tracking_field(module, ty, &ctx.config.field_prefix, &deps.container)?;
    entry.advance(TargetState::FieldAdded);

    entry.constructors = instrument_constructors(module, ty, &field, &deps.container_ctor)?;
    entry.advance(TargetState::ConstructorsInstrumented);

    for method in scope {
        let Some(body) = module[method].body.as_mut() else {
            continue;
        };
        let matches = find_matches(body, &deps.disposal_contract, &ctx.config.handle_call_fragment);
        entry.registrations += register_matches(body, &field, &deps.helper, &matches)?;
    }
    log::debug!(
        "{}: {} handle registration(s)",
        entry.type_name,
        entry.registrations
    );
    entry.advance(TargetState::CallSitesRewritten);

    let teardown = ensure_teardown(
        module,
        &deps.disposal_contract,
        &ctx.config.release_method,
        ty,
        plan,
    )?;
    entry.advance(TargetState::TeardownEnsured);

    append_release(module, teardown, release_field(&field, &deps.container_release))?;
    entry.advance(TargetState::Released);
    Ok(())
}
