//! Outcome of a weaving run.
use std::fmt;

use strum::{Display, EnumIs};

use crate::markers::MarkerKind;

/// Progress of one target through its pass. States are ordered: a target
/// only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIs, Display)]
pub enum TargetState {
    #[strum(to_string = "unweaved")]
    Unweaved,
    #[strum(to_string = "field added")]
    FieldAdded,
    #[strum(to_string = "constructors instrumented")]
    ConstructorsInstrumented,
    #[strum(to_string = "call sites rewritten")]
    CallSitesRewritten,
    #[strum(to_string = "teardown ensured")]
    TeardownEnsured,
    #[strum(to_string = "released")]
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub type_name: String,
    pub family: MarkerKind,
    pub type_wide: bool,
    pub state: TargetState,
    /// Registrations inserted after handle-producing calls.
    pub registrations: usize,
    pub constructors: usize,
    pub properties_released: usize,
    /// Set when the target was skipped; the state is then `Unweaved`.
    pub skip_reason: Option<String>,
}

impl TargetReport {
    pub fn new(type_name: impl Into<String>, family: MarkerKind, type_wide: bool) -> Self {
        Self {
            type_name: type_name.into(),
            family,
            type_wide,
            state: TargetState::Unweaved,
            registrations: 0,
            constructors: 0,
            properties_released: 0,
            skip_reason: None,
        }
    }

    pub fn advance(&mut self, next: TargetState) {
        debug_assert!(next > self.state, "{} cannot go from {} to {}", self.type_name, self.state, next);
        log::trace!("{}: {} -> {}", self.type_name, self.state, next);
        self.state = next;
    }

    pub fn skip(&mut self, reason: impl Into<String>) {
        self.skip_reason = Some(reason.into());
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_reason.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.state.is_released()
    }
}

impl fmt::Display for TargetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: ", self.family, self.type_name)?;
        match &self.skip_reason {
            Some(reason) => write!(f, "skipped ({reason})"),
            None => write!(
                f,
                "{} ({} registration(s), {} constructor(s), {} propert(y/ies))",
                self.state, self.registrations, self.constructors, self.properties_released
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeaveReport {
    pub targets: Vec<TargetReport>,
}

impl WeaveReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, target: TargetReport) {
        self.targets.push(target);
    }

    pub fn find(&self, type_name: &str, family: MarkerKind) -> Option<&TargetReport> {
        self.targets
            .iter()
            .find(|target| target.family == family && target.type_name == type_name)
    }

    pub fn released(&self) -> impl Iterator<Item = &TargetReport> + '_ {
        self.targets.iter().filter(|target| target.is_released())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &TargetReport> + '_ {
        self.targets.iter().filter(|target| target.is_skipped())
    }

    pub fn total_registrations(&self) -> usize {
        self.targets.iter().map(|target| target.registrations).sum()
    }
}
