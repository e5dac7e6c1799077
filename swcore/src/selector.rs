//! Target selection
//!
//! A target is a local type carrying a family's marker itself (type-wide) or
//! on at least one of its members. Selection is a pure query over the
//! [`MarkerTable`].
use either::Either;
use swinstr::modules::{MethodKey, Module, PropertyKey, TypeKey};

use crate::markers::{MarkerKind, MarkerTable, MarkerTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub ty: TypeKey,
    pub kind: MarkerKind,
    /// The type itself carries the marker: every member of the family's kind
    /// is in scope.
    pub type_wide: bool,
}

/// Local types selected by `kind`, in declaration order.
pub fn select(module: &Module, markers: &MarkerTable, kind: MarkerKind) -> Vec<Target> {
    module
        .local_types()
        .filter_map(|(ty, _)| {
            let type_wide = markers.contains(MarkerTarget::Type(ty), kind);
            let member_marked = match kind {
                MarkerKind::TrackHandles => module
                    .methods_of(ty)
                    .any(|(method, _)| markers.contains(MarkerTarget::Method(method), kind)),
                MarkerKind::ReleaseCommands => module
                    .properties_of(ty)
                    .any(|(property, _)| markers.contains(MarkerTarget::Property(property), kind)),
            };

            (type_wide || member_marked).then_some(Target {
                ty,
                kind,
                type_wide,
            })
        })
        .collect()
}

impl Target {
    /// Constructors and methods whose bodies the handle pass rewrites.
    /// Static and body-less methods are never in scope.
    pub fn methods<'m>(
        &self,
        module: &'m Module,
        markers: &'m MarkerTable,
    ) -> impl Iterator<Item = MethodKey> + 'm {
        let candidates = module
            .methods_of(self.ty)
            .filter(|(_, method)| !method.is_static() && method.has_body())
            .map(|(key, _)| key);

        if self.type_wide {
            Either::Left(candidates)
        } else {
            let kind = self.kind;
            Either::Right(
                candidates.filter(move |&key| markers.contains(MarkerTarget::Method(key), kind)),
            )
        }
    }

    /// Methods carrying the family's own marker that cannot be rewritten:
    /// static methods and methods without a body.
    pub fn excluded_methods<'m>(
        &self,
        module: &'m Module,
        markers: &'m MarkerTable,
    ) -> impl Iterator<Item = MethodKey> + 'm {
        let kind = self.kind;
        module
            .methods_of(self.ty)
            .filter(|(_, method)| method.is_static() || !method.has_body())
            .map(|(key, _)| key)
            .filter(move |&key| markers.contains(MarkerTarget::Method(key), kind))
    }

    /// Properties the command pass considers.
    pub fn properties<'m>(
        &self,
        module: &'m Module,
        markers: &'m MarkerTable,
    ) -> impl Iterator<Item = PropertyKey> + 'm {
        let candidates = module.properties_of(self.ty).map(|(key, _)| key);

        if self.type_wide {
            Either::Left(candidates)
        } else {
            let kind = self.kind;
            Either::Right(
                candidates.filter(move |&key| markers.contains(MarkerTarget::Property(key), kind)),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MarkerConfig,
        tests_utils::models::{self, Fixture},
    };

    fn select_in(fixture: &Fixture, kind: MarkerKind) -> (MarkerTable, Vec<Target>) {
        let markers = MarkerTable::collect(&fixture.module, &MarkerConfig::default());
        let targets = select(&fixture.module, &markers, kind);
        (markers, targets)
    }

    #[test]
    fn member_markers_select_only_marked_members() {
        let mut fixture = Fixture::new();
        let ty = fixture.two_constructors_one_marked();
        let (markers, targets) = select_in(&fixture, MarkerKind::TrackHandles);

        assert_eq!(targets.len(), 1);
        let target = targets[0];
        assert_eq!(target.ty, ty);
        assert!(!target.type_wide);

        let scope: Vec<_> = target.methods(&fixture.module, &markers).collect();
        assert_eq!(scope.len(), 1);
        assert!(fixture.module[scope[0]].params.is_empty());
    }

    #[test]
    fn type_markers_put_every_method_in_scope() {
        let mut fixture = Fixture::new();
        let ty = fixture.class_single_constructor_two_methods();
        let (markers, targets) = select_in(&fixture, MarkerKind::TrackHandles);

        assert_eq!(targets.len(), 1);
        assert!(targets[0].type_wide);
        assert_eq!(
            targets[0].methods(&fixture.module, &markers).count(),
            fixture.module.methods_of(ty).count()
        );
    }

    #[test]
    fn families_select_independently() {
        let mut fixture = Fixture::new();
        fixture.single_method_single_subscribe();
        let commands = fixture.two_commands_type_wide();
        let both = fixture.tracked_command_model();

        let (markers, targets) = select_in(&fixture, MarkerKind::ReleaseCommands);
        let selected: Vec<_> = targets.iter().map(|target| target.ty).collect();
        assert_eq!(selected, vec![commands, both]);

        assert!(targets[0].type_wide);
        assert_eq!(targets[0].properties(&fixture.module, &markers).count(), 3);
        assert!(!targets[1].type_wide);
        assert_eq!(targets[1].properties(&fixture.module, &markers).count(), 1);

        let (_, handles) = select_in(&fixture, MarkerKind::TrackHandles);
        assert_eq!(handles.len(), 2);
    }

    #[test]
    fn marked_static_methods_are_excluded_from_scope() {
        use swinstr::modules::{
            definitions::{MethodDefinition, MethodFlags},
            instructions::Instr,
        };

        let mut fixture = Fixture::new();
        let mut model = fixture.model("StaticListenerModel");
        model.ctor(&[], [], &[]);
        let listen = model.method(
            MethodDefinition::new("Listen")
                .with_flags(MethodFlags::STATIC | MethodFlags::HIDE_BY_SIG)
                .with_attribute(models::track_handles_marker()),
            [Instr::Ret],
        );
        let refresh = model.void_method("Refresh", [], &[models::track_handles_marker()]);
        let (markers, targets) = select_in(&fixture, MarkerKind::TrackHandles);

        assert_eq!(targets.len(), 1);
        let scope: Vec<_> = targets[0].methods(&fixture.module, &markers).collect();
        assert_eq!(scope, vec![refresh]);
        let excluded: Vec<_> = targets[0].excluded_methods(&fixture.module, &markers).collect();
        assert_eq!(excluded, vec![listen]);
    }

    #[test]
    fn unmarked_modules_select_nothing() {
        let fixture = Fixture::new();
        let (_, targets) = select_in(&fixture, MarkerKind::TrackHandles);
        assert!(targets.is_empty());
    }
}
