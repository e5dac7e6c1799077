//! Module weaver
//!
//! [`ModuleWeaver`] binds a module to its collaborators and runs the
//! handle-tracking pass followed by the command-release pass, rewriting the
//! module in place. Teardowns the targets lack are synthesized first, over
//! the targets of both families.
use swinstr::modules::Module;

use crate::{
    config::WeaveConfig,
    deps::{CommandDependencies, Dependencies},
    ext::swlog::LogSinks,
    markers::{MarkerKind, MarkerTable},
    passes::{PassContext, commands, handles, prepare_teardowns, run_pass},
    report::WeaveReport,
    selector::select,
    swerror, swinfo,
    utils::error::WeaveResult,
};

pub struct ModuleWeaver<'m> {
    module: &'m mut Module,
    config: WeaveConfig,
    sinks: LogSinks,
}

impl<'m> ModuleWeaver<'m> {
    pub fn new(module: &'m mut Module, config: WeaveConfig, sinks: LogSinks) -> Self {
        Self {
            module,
            config,
            sinks,
        }
    }

    pub fn config(&self) -> &WeaveConfig {
        &self.config
    }

    /// Weave the module.
    ///
    /// Configuration errors (a collaborator that cannot be resolved) are
    /// reported through the error sink and returned before anything is
    /// rewritten. Targets failing on their own are reported and skipped.
    pub fn execute(&mut self) -> WeaveResult<WeaveReport> {
        let markers = MarkerTable::collect(self.module, &self.config.markers);

        let deps = self.resolve(Dependencies::resolve)?;
        let command_deps = if markers.has_kind(MarkerKind::ReleaseCommands) {
            Some(self.resolve(CommandDependencies::resolve)?)
        } else {
            None
        };

        let ctx = PassContext {
            config: &self.config,
            deps: &deps,
            markers: &markers,
            sinks: &self.sinks,
        };
        let mut report = WeaveReport::new();

        let mut targets = select(self.module, &markers, MarkerKind::TrackHandles);
        if command_deps.is_some() {
            targets.extend(select(self.module, &markers, MarkerKind::ReleaseCommands));
        }
        let synthesized = prepare_teardowns(self.module, ctx, &targets)?;
        log::debug!("synthesized {synthesized} teardown(s) ahead of the passes");

        run_pass(
            self.module,
            ctx,
            MarkerKind::TrackHandles,
            &mut report,
            |module, target, entry| handles::weave_target(module, ctx, target, entry),
        )?;

        if let Some(command_deps) = &command_deps {
            run_pass(
                self.module,
                ctx,
                MarkerKind::ReleaseCommands,
                &mut report,
                |module, target, entry| {
                    commands::weave_target(module, ctx, command_deps, target, entry)
                },
            )?;
        }

        swinfo!(
            &self.sinks,
            "Woven {} target(s) of {}, skipped {}",
            report.released().count(),
            self.module.name,
            report.skipped().count()
        );
        Ok(report)
    }

    fn resolve<T>(
        &self,
        resolver: impl FnOnce(&Module, &WeaveConfig) -> WeaveResult<T>,
    ) -> WeaveResult<T> {
        resolver(&*self.module, &self.config).inspect_err(|err| swerror!(&self.sinks, "{err}"))
    }
}
