use criterion::{black_box, criterion_group, criterion_main, Criterion};

use edn_reader::read_str;

const MANIFEST: &str = r#"
{:service {:name "api"
           :port 8080
           :tags #{:http :public :edge}
           :retries 3
           :backoff-ms [100 200 400 800]
           :owners [{:team "core" :contact "core@example.com"}
                    {:team "infra" :contact "infra@example.com"}]
           :launched #inst "2021-06-01T12:00:00Z"
           :id #uuid "f81d4fae-7dec-11d0-a765-00a0c91e6bf6"}}
"#;

fn bench_read_manifest(c: &mut Criterion) {
    c.bench_function("read_manifest", |b| {
        b.iter(|| read_str(black_box(MANIFEST)).unwrap())
    });
}

fn bench_read_numbers(c: &mut Criterion) {
    let numbers: String = (0..512).map(|n| format!("{n} ")).collect();
    let vector = format!("[{numbers}]");
    c.bench_function("read_number_vector", |b| {
        b.iter(|| read_str(black_box(&vector)).unwrap())
    });
}

criterion_group!(benches, bench_read_manifest, bench_read_numbers);
criterion_main!(benches);
