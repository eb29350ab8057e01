use criterion::{black_box, criterion_group, criterion_main, Criterion};
use greet_service::feature::greet::greet_service::GreetingService;

fn message_benchmark(c: &mut Criterion) {
    let service = GreetingService::new("Ciao");
    c.bench_function("message", |b| b.iter(|| service.message(black_box("World"))));
}

criterion_group!(benches, message_benchmark);
criterion_main!(benches);
