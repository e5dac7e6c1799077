//! Behavioral tests: fixtures are woven, then executed by the test machine
//! against the reactive runtime.
use swinstr::modules::TypeKey;

use crate::{
    report::WeaveReport,
    tests_utils::{
        log::{CollectedLog, collecting_sinks},
        machine::{Machine, Value},
        models::{self, Fixture, MODELS_NAMESPACE},
        runtime,
    },
};

mod handles;

struct Woven {
    fixture: Fixture,
    report: WeaveReport,
    log: CollectedLog,
}

impl Woven {
    fn machine(&self) -> Machine<'_> {
        runtime::machine(&self.fixture.module)
    }

    fn has_tracker(&self, ty: TypeKey) -> bool {
        let name = models::tracker_name(&self.fixture.module[ty].name);
        self.fixture
            .module
            .fields_of(ty)
            .any(|(_, field)| field.name == name)
    }
}

/// Build fixtures with `build`, weave them and check every woven body still
/// verifies.
fn weave(build: impl FnOnce(&mut Fixture)) -> Woven {
    let mut fixture = Fixture::new();
    build(&mut fixture);

    let (sinks, log) = collecting_sinks();
    let report = fixture.weave_with(sinks).unwrap();
    if let Err(err) = fixture.module.verify() {
        panic!("woven module does not verify: {err}");
    }

    Woven {
        fixture,
        report,
        log,
    }
}

fn class(name: &str) -> String {
    format!("{MODELS_NAMESPACE}.{name}")
}

fn tracker(machine: &Machine<'_>, instance: &Value, type_name: &str) -> Value {
    machine
        .field(instance, &models::tracker_name(type_name))
        .unwrap()
}

fn probe(machine: &Machine<'_>, instance: &Value) -> Value {
    machine.field(instance, "Probe").unwrap()
}

fn entries(machine: &Machine<'_>, container: &Value) -> usize {
    runtime::entries(machine, container).unwrap().len()
}

fn released(machine: &Machine<'_>, value: &Value) -> bool {
    runtime::is_disposed(machine, value).unwrap()
}

fn counts(machine: &Machine<'_>, container: &Value) -> (usize, usize) {
    runtime::release_counts(machine, container).unwrap()
}

fn observable(machine: &mut Machine<'_>) -> Value {
    machine
        .invoke(&models::never(), vec![], false)
        .unwrap()
        .unwrap()
}
