use chrono::{TimeZone, Utc};
use cod_core::Parameter;
use cod_runtime::{Calculator, RuntimeConfig};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use persistence::MemoryStore;

fn bench_slider_sweep(c: &mut Criterion) {
    let now = Utc.timestamp_opt(1_760_000_000, 0).unwrap();
    let config = RuntimeConfig {
        session_seed: Some(42),
        ..RuntimeConfig::default()
    };
    let mut calc = Calculator::new(config, MemoryStore::new(), now).unwrap();
    c.bench_function("set_position sweep", |b| {
        b.iter(|| {
            for parameter in Parameter::ALL {
                for index in 0..parameter.ladder().len() {
                    let _ = black_box(calc.set_position(parameter, index, now));
                }
            }
        })
    });
}

criterion_group!(benches, bench_slider_sweep);
criterion_main!(benches);
