//! Rule compilation and evaluation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rulefsm_core::{Keyword, Machine, MemoryObject, Registry, RuleCompiler, Timestamp};
use std::rc::Rc;

fn thermostat() -> Rc<MemoryObject> {
    Rc::new(
        MemoryObject::new("thermostat")
            .with_enumeration("mode", [("OFF", 0), ("HEAT", 1), ("COOL", 2)], 0)
            .with_double("temp", 20.0)
            .with_array("setpoint", vec![20.0, 18.0, 24.0]),
    )
}

fn setup_machine(object: Rc<MemoryObject>) -> Machine {
    let mut machine = Machine::new(object);
    machine
        .configure(
            "state:mode; \
             rule:OFF->HEAT=temp<setpoint#HEAT,$timer>=60; \
             rule:OFF->COOL=temp>setpoint#COOL,$timer>=60; \
             rule:HEAT->OFF=temp>=setpoint#OFF; \
             rule:COOL->OFF=temp<=setpoint#OFF; \
             hold:HEAT=5min; hold:COOL=5min",
            Timestamp::ZERO,
        )
        .unwrap();
    machine.init(Timestamp::ZERO);
    machine
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    let object = thermostat();
    let keywords = vec![
        Keyword::new("OFF", 0),
        Keyword::new("HEAT", 1),
        Keyword::new("COOL", 2),
    ];
    let compiler = RuleCompiler::new(object.as_ref(), &keywords, keywords.len());

    group.throughput(Throughput::Elements(1));
    group.bench_function("simple", |b| {
        b.iter(|| black_box(compiler.compile_transition("OFF->HEAT=$timer>=60").unwrap()))
    });

    group.bench_function("chained", |b| {
        b.iter(|| {
            black_box(
                compiler
                    .compile_transition("OFF->HEAT=temp<setpoint#HEAT, $timer>=60, $state==0")
                    .unwrap(),
            )
        })
    });

    group.bench_function("hold_with_unit", |b| {
        b.iter(|| black_box(compiler.compile_hold("HEAT=1.5h").unwrap()))
    });

    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    let object = thermostat();
    let mut machine = setup_machine(object.clone());

    group.throughput(Throughput::Elements(1));
    group.bench_function("no_fire", |b| {
        let mut now = 0i64;
        b.iter(|| {
            now += 1;
            black_box(machine.tick(Timestamp::new(now)))
        });
    });

    let mut machine = setup_machine(object.clone());
    group.bench_function("fire_and_return", |b| {
        let mut now = 0i64;
        b.iter(|| {
            now += 400;
            object.set_double("temp", if now % 800 == 0 { 25.0 } else { 10.0 });
            black_box(machine.tick(Timestamp::new(now)))
        });
    });

    group.finish();
}

fn bench_tick_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_tick_all");

    for size in [100usize, 1000] {
        let mut registry = Registry::new();
        for _ in 0..size {
            registry.register(setup_machine(thermostat()));
        }
        registry.init_all(Timestamp::ZERO);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("machines", size), &size, |b, _| {
            let mut now = 0i64;
            b.iter(|| {
                now += 60;
                black_box(registry.tick_all(Timestamp::new(now)))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_tick, bench_tick_all);
criterion_main!(benches);
