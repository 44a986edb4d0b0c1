use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;
use texler_core::{decode_hex, encode_hex, CompilationSnapshot, ProjectDetails, ProjectState, RemoteFile};
use uuid::Uuid;

fn create_project(file_count: usize) -> ProjectState {
    let files = (0..file_count)
        .map(|i| {
            let path = format!("sections/part{i:03}.tex");
            let file = RemoteFile {
                path: path.clone(),
                content: "\\section{Part}\nLorem ipsum dolor sit amet.\n".repeat(50),
                is_main: false,
                updated_at: None,
            };
            (path, file)
        })
        .collect();

    let details = ProjectDetails {
        id: Uuid::new_v4(),
        workspace_id: None,
        name: "Bench".into(),
        description: None,
        main_file: Some("sections/part000.tex".into()),
        files,
    };

    let mut state = ProjectState::new();
    state.hydrate(Uuid::new_v4(), details, None);
    state
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("Snapshot");
    group.throughput(Throughput::Elements(1));

    let state = create_project(100);
    group.bench_function("build_100_files", |b| {
        b.iter(|| {
            let snap = CompilationSnapshot::build(black_box(&state));
            black_box(snap);
        })
    });

    group.finish();
}

fn bench_artifact_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("Artifact");

    // Typical small article PDF is a few hundred KB.
    let pdf: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
    let encoded = encode_hex(&pdf);
    group.throughput(Throughput::Bytes(pdf.len() as u64));

    group.bench_function("decode_hex_256k", |b| {
        b.iter(|| {
            let bytes = decode_hex(black_box(&encoded)).unwrap();
            black_box(bytes);
        })
    });

    group.finish();
}

criterion_group!(benches, bench_snapshot, bench_artifact_decode);
criterion_main!(benches);
