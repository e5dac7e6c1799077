use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use swcore::{
    config::WeaveConfig,
    ext::swlog::LogSinks,
    matcher::find_matches,
    tests_utils::models::{self, Fixture},
    weaver::ModuleWeaver,
};
use swinstr::modules::{body::MethodBody, instructions::Instr};

/// A module with `count` models, each either marked type-wide or on a random
/// subset of its methods. Seeded for determinism.
fn build_module(count: usize) -> Fixture {
    let mut rng = ChaCha20Rng::seed_from_u64(0x42);
    let mut fixture = Fixture::new();

    for index in 0..count {
        let type_wide = rng.random_bool(0.3);
        let mut model = fixture.model(&format!("GeneratedModel{index}"));
        if type_wide {
            model = model.marked(models::track_handles_marker());
        }

        model.ctor(&[], models::subscribe_into_probe(), &[]);
        for method in 0..rng.random_range(1..=6) {
            let subscribes = rng.random_range(0..=3);
            let code: Vec<Instr> = (0..subscribes)
                .flat_map(|_| models::subscribe_into_probe())
                .collect();
            let markers = if !type_wide && rng.random_bool(0.5) {
                vec![models::track_handles_marker()]
            } else {
                vec![]
            };
            model.void_method(&format!("Method{method}"), code, &markers);
        }
    }

    fixture
}

fn bench_weave(c: &mut Criterion) {
    for count in [16, 256] {
        let fixture = build_module(count);

        c.bench_function(&format!("weave_{count}_models"), |b| {
            b.iter_batched(
                || fixture.module.clone(),
                |mut module| {
                    let report = ModuleWeaver::new(&mut module, WeaveConfig::default(), LogSinks::silent())
                        .execute();
                    black_box(report)
                },
                BatchSize::LargeInput,
            )
        });
    }
}

fn bench_find_matches(c: &mut Criterion) {
    let body = MethodBody::from_instrs(
        (0..512)
            .flat_map(|_| models::subscribe_into_probe())
            .chain([Instr::Ret]),
    );
    let contract = models::disposable();

    c.bench_function("find_matches_512_calls", |b| {
        b.iter(|| black_box(find_matches(&body, &contract, "Subscribe")))
    });
}

criterion_group!(benches, bench_weave, bench_find_matches);
criterion_main!(benches);
