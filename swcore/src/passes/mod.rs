//! The two weaving passes.
//!
//! Both passes share the same driver: select the targets of a marker family,
//! weave them one at a time and record the outcome. A target failing with a
//! per-target error is reported through the error sink and skipped; such
//! errors are only raised before the target is first mutated.
//!
//! Teardowns are ensured for the targets of both families before either pass
//! runs, ancestors first, so a synthesized override always delegates to the
//! nearest teardown of its chain.
use swinstr::modules::{Module, TypeKey};

use crate::{
    config::WeaveConfig,
    deps::Dependencies,
    ext::swlog::LogSinks,
    hierarchy::Hierarchy,
    markers::{MarkerKind, MarkerTable},
    report::{TargetReport, WeaveReport},
    selector::{Target, select},
    swerror, swinfo,
    synth::teardown::{TeardownPlan, ensure_teardown, plan_teardown},
    utils::error::WeaveResult,
};

pub mod commands;
pub mod handles;

/// Everything a pass reads besides the module it rewrites.
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    pub config: &'a WeaveConfig,
    pub deps: &'a Dependencies,
    pub markers: &'a MarkerTable,
    pub sinks: &'a LogSinks,
}

impl<'a> PassContext<'a> {
    pub fn hierarchy<'m>(&self, module: &'m Module) -> Hierarchy<'m>
    where
        'a: 'm,
    {
        Hierarchy::new(module, &self.deps.disposal_contract, &self.config.release_method)
    }
}

/// Weave every target of `kind` with `weave`, appending the outcomes to
/// `report`.
pub fn run_pass(
    module: &mut Module,
    ctx: PassContext<'_>,
    kind: MarkerKind,
    report: &mut WeaveReport,
    mut weave: impl FnMut(&mut Module, Target, &mut TargetReport) -> WeaveResult<()>,
) -> WeaveResult<()> {
    let targets = select(module, ctx.markers, kind);
    swinfo!(ctx.sinks, "Weaving {} {kind} target(s)", targets.len());

    for target in targets {
        let name = module[target.ty].definition_name();
        swinfo!(ctx.sinks, "Weaving target: {name}");

        let mut entry = TargetReport::new(name.clone(), kind, target.type_wide);
        match weave(module, target, &mut entry) {
            Ok(()) => swinfo!(ctx.sinks, "Completed weaving target: {name}"),
            Err(err) if err.is_per_target() && entry.state.is_unweaved() => {
                swerror!(ctx.sinks, "{err}");
                entry.skip(err.to_string());
            }
            Err(err) => return Err(err),
        }
        report.push(entry);
    }

    Ok(())
}

/// Give every target that needs one a synthesized teardown, shallowest type
/// first. Targets that cannot be given a teardown are left untouched for
/// their pass to report. Returns the number of teardowns synthesized.
pub fn prepare_teardowns(
    module: &mut Module,
    ctx: PassContext<'_>,
    targets: &[Target],
) -> WeaveResult<usize> {
    let mut order: Vec<(usize, TypeKey)> = {
        let hierarchy = ctx.hierarchy(module);
        targets
            .iter()
            .map(|target| (hierarchy.ancestors(target.ty).count(), target.ty))
            .collect()
    };
    order.sort_unstable();
    order.dedup();

    let mut synthesized = 0;
    for (_, ty) in order {
        let plan = {
            let hierarchy = ctx.hierarchy(module);
            if !hierarchy.is_disposable(ty) {
                continue;
            }
            match plan_teardown(&hierarchy, ty) {
                Ok(plan) => plan,
                Err(err) if err.is_per_target() => {
                    log::debug!("no teardown prepared for {}: {err}", module[ty].name);
                    continue;
                }
                Err(err) => return Err(err),
            }
        };

        if let TeardownPlan::Synthesize { .. } = plan {
            ensure_teardown(
                module,
                &ctx.deps.disposal_contract,
                &ctx.config.release_method,
                ty,
                plan,
            )?;
            synthesized += 1;
        }
    }

    Ok(synthesized)
}
