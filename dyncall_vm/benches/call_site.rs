//! Call Site Dispatch Benchmarks
//!
//! Measures the cost of cached dispatch against the uncached slow path.
//!
//! # Benchmark Categories
//!
//! 1. **Guard Hits**: monomorphic sites for each variant
//! 2. **Slow Path**: a full method-table search per call
//! 3. **Thrash**: a single site alternating between two receiver shapes
//! 4. **Contention**: several threads hitting one site

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use dyncall_runtime::{Class, Instance, Method, TypeRegistry, Value};
use dyncall_vm::{CallDescriptor, CallSiteArray, MethodTableResolver, SlowPathResolver};
use std::sync::Arc;

// =============================================================================
// Benchmark Helpers
// =============================================================================

fn setup() -> (Arc<TypeRegistry>, Value) {
    let registry = Arc::new(TypeRegistry::with_builtins());
    let widget = registry.define_class(
        Class::builder("Widget").method(Method::new("size", [], |_, _| Ok(Value::Int(3)))),
    );
    let object = Value::Object(Arc::new(Instance::new(widget)));
    (registry, object)
}

fn array_for(registry: &Arc<TypeRegistry>, descriptors: Vec<CallDescriptor>) -> CallSiteArray {
    let resolver: Arc<dyn SlowPathResolver> =
        Arc::new(MethodTableResolver::new(Arc::clone(registry)));
    CallSiteArray::new("bench", descriptors, resolver)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_guard_hits(c: &mut Criterion) {
    let (registry, object) = setup();
    let array = array_for(
        &registry,
        vec![
            CallDescriptor::instance("size"),
            CallDescriptor::instance("getAt"),
            CallDescriptor::instance("length"),
            CallDescriptor::operator("plus"),
        ],
    );
    let bytes = Value::bytes(&[1; 64]);
    let text = Value::str("hello");

    let mut group = c.benchmark_group("guard_hit");
    group.bench_function("self_describing", |b| {
        b.iter(|| array.invoke(0, black_box(&object), &[]))
    });
    group.bench_function("accessor_get_at", |b| {
        b.iter(|| array.invoke(1, black_box(&bytes), &[Value::Int(-1)]))
    });
    group.bench_function("builtin_str_length", |b| {
        b.iter(|| array.invoke(2, black_box(&text), &[]))
    });
    group.bench_function("operator_int_add", |b| {
        b.iter(|| array.invoke(3, black_box(&Value::Int(2)), &[Value::Int(3)]))
    });
    group.finish();
}

fn bench_slow_path(c: &mut Criterion) {
    let (registry, object) = setup();
    let resolver = MethodTableResolver::new(Arc::clone(&registry));
    let descriptor = CallDescriptor::instance("size");

    c.bench_function("slow_path_resolve_invoke", |b| {
        b.iter(|| {
            resolver
                .resolve(black_box(&object), &descriptor, &[])
                .map(|target| target.invoke(&object, &[]))
        })
    });
}

fn bench_thrash(c: &mut Criterion) {
    let (registry, object) = setup();
    let array = array_for(&registry, vec![CallDescriptor::instance("size")]);
    let bytes = Value::bytes(&[0; 8]);

    c.bench_function("thrash_alternating", |b| {
        b.iter(|| {
            let _ = array.invoke(0, black_box(&object), &[]);
            array.invoke(0, black_box(&bytes), &[])
        })
    });
}

fn bench_contention(c: &mut Criterion) {
    let (registry, object) = setup();
    let array = array_for(&registry, vec![CallDescriptor::instance("size")]);
    const CALLS: u64 = 1_000;

    let mut group = c.benchmark_group("contention");
    for threads in [1usize, 2, 4] {
        group.throughput(Throughput::Elements(CALLS * threads as u64));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &n| {
            b.iter(|| {
                std::thread::scope(|scope| {
                    for _ in 0..n {
                        scope.spawn(|| {
                            for _ in 0..CALLS {
                                let _ = black_box(array.invoke(0, &object, &[]));
                            }
                        });
                    }
                })
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_guard_hits,
    bench_slow_path,
    bench_thrash,
    bench_contention
);
criterion_main!(benches);
