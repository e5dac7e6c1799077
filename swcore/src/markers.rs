//! Marker registry
//!
//! Markers are zero-data custom attributes. Instead of looking attributes up
//! on every query, [`MarkerTable::collect`] reads them once and records each
//! `(member, kind)` pair in an explicit, enumerable set.
use std::collections::BTreeSet;

use strum::{Display, EnumIs, EnumIter};
use swinstr::{
    modules::{MethodKey, Module, PropertyKey, TypeKey},
    types::TypeRef,
};

use crate::config::MarkerConfig;

/// Member a marker is attached to. Constructors are methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIs)]
pub enum MarkerTarget {
    Type(TypeKey),
    Method(MethodKey),
    Property(PropertyKey),
}

/// Marker family. Each family drives one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIs, EnumIter, Display)]
pub enum MarkerKind {
    /// Track handles produced inside constructors and methods.
    #[strum(to_string = "track-handles")]
    TrackHandles,
    /// Release command properties in the teardown method.
    #[strum(to_string = "release-commands")]
    ReleaseCommands,
}

impl MarkerKind {
    /// Whether a marker of this kind may be attached to `target`.
    pub fn attaches_to(self, target: MarkerTarget) -> bool {
        match self {
            MarkerKind::TrackHandles => !target.is_property(),
            MarkerKind::ReleaseCommands => !target.is_method(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerTable {
    entries: BTreeSet<(MarkerTarget, MarkerKind)>,
}

impl MarkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a marker. Markers on an invalid attachment point are ignored;
    /// returns whether the entry was recorded.
    pub fn insert(&mut self, target: MarkerTarget, kind: MarkerKind) -> bool {
        if !kind.attaches_to(target) {
            log::debug!("ignoring {kind} marker on {target:?}");
            return false;
        }
        self.entries.insert((target, kind))
    }

    pub fn contains(&self, target: MarkerTarget, kind: MarkerKind) -> bool {
        self.entries.contains(&(target, kind))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MarkerTarget, MarkerKind)> + '_ {
        self.entries.iter().copied()
    }

    /// Whether at least one marker of `kind` was recorded.
    pub fn has_kind(&self, kind: MarkerKind) -> bool {
        self.entries.iter().any(|&(_, k)| k == kind)
    }

    /// Build the table from the custom attributes of the module's local
    /// types and of their methods and properties.
    pub fn collect(module: &Module, config: &MarkerConfig) -> Self {
        let kind_of = |attribute: &TypeRef| {
            let name = attribute.definition_name();
            if name == config.track_handles {
                Some(MarkerKind::TrackHandles)
            } else if name == config.release_commands {
                Some(MarkerKind::ReleaseCommands)
            } else {
                None
            }
        };

        let mut table = Self::new();
        for (ty, def) in module.local_types() {
            for kind in def.attributes.iter().filter_map(kind_of) {
                table.insert(MarkerTarget::Type(ty), kind);
            }
            for (method, def) in module.methods_of(ty) {
                for kind in def.attributes.iter().filter_map(kind_of) {
                    table.insert(MarkerTarget::Method(method), kind);
                }
            }
            for (property, def) in module.properties_of(ty) {
                for kind in def.attributes.iter().filter_map(kind_of) {
                    table.insert(MarkerTarget::Property(property), kind);
                }
            }
        }

        log::debug!("collected {} marker(s)", table.len());
        table
    }
}
