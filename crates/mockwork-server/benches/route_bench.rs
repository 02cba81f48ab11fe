use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hyper::Method;
use mockwork_server::definition::{Definition, MockBody};
use mockwork_server::dispatch::synthesize;
use mockwork_server::expression::{render, Bindings};
use mockwork_server::functions::RequestScope;
use mockwork_server::request::MockRequest;
use mockwork_server::route::RouteTable;

fn populated_table(count: usize) -> RouteTable {
    let table = RouteTable::new();
    for i in 0..count {
        table
            .rebuild(Definition::new(
                format!("def-{i}"),
                "GET",
                format!("/api/v1/endpoint{i}/{{id:[0-9]+}}"),
            ))
            .unwrap();
    }
    table
}

fn bench_route_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_lookup");

    for route_count in [10, 100, 1000].iter() {
        let table = populated_table(*route_count);
        group.throughput(Throughput::Elements(1));

        for (label, index) in [("first", 0), ("last", route_count - 1)] {
            let request = MockRequest::get(Method::GET, &format!("/api/v1/endpoint{index}/42"));
            group.bench_with_input(BenchmarkId::new(label, route_count), route_count, |b, _| {
                b.iter(|| table.find(black_box(&request)))
            });
        }

        let miss = MockRequest::get(Method::GET, "/nowhere");
        group.bench_with_input(BenchmarkId::new("miss", route_count), route_count, |b, _| {
            b.iter(|| table.find(black_box(&miss)))
        });
    }

    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_rebuild");

    for route_count in [10, 100, 1000].iter() {
        let table = populated_table(*route_count);
        let definition = Definition::new("def-0", "GET", "/api/v2/{id}");
        group.bench_with_input(
            BenchmarkId::new("replace", route_count),
            route_count,
            |b, _| b.iter(|| table.rebuild(black_box(definition.clone()))),
        );
    }

    group.finish();
}

fn bench_templates(c: &mut Criterion) {
    let mut group = c.benchmark_group("templates");
    let table = populated_table(10);
    let definition = Definition::new("def-3", "GET", "/api/v1/endpoint3/{id:[0-9]+}");
    let request = MockRequest::get(Method::GET, "/api/v1/endpoint3/42?lang=en");
    let scope = RequestScope::new(&request, &definition, &table);

    for (label, template) in [
        ("literal", r#"{"status": "ok", "items": []}"#),
        ("path", r#"{"id": "{{path "id"}}"}"#),
        ("pipeline", r#"{"lang": "{{param "lang" | encode "base64"}}"}"#),
    ] {
        group.bench_function(label, |b| {
            b.iter(|| render(black_box(template), &mut Bindings::new(), &scope))
        });
    }

    group.finish();
}

fn bench_synthesize(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let table = populated_table(10);
    let mut definition = Definition::new("def-1", "GET", "/api/v1/endpoint1/{id:[0-9]+}");
    definition.mock_body = Some(MockBody::raw("json", r#"{"id": "{{path "id"}}", "trace": "{{uuid}}"}"#));
    definition.mock_headers = [("X-Request", "{{header \"X-Request-Id\"}}")]
        .into_iter()
        .collect();
    let request = MockRequest::get(Method::GET, "/api/v1/endpoint1/42");

    c.bench_function("synthesize_raw_json", |b| {
        b.iter(|| runtime.block_on(synthesize(black_box(&definition), &request, &table)))
    });
}

criterion_group!(
    benches,
    bench_route_lookup,
    bench_rebuild,
    bench_templates,
    bench_synthesize
);
criterion_main!(benches);
