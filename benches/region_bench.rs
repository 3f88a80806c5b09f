use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use memshuttle::{ProvisionConfig, RegionProvisioner};
use tempfile::TempDir;

fn benchmark_set_value(c: &mut Criterion) {
    let mut group = c.benchmark_group("SharedRegion_SetValue");

    let dir = TempDir::new().unwrap();
    let provisioner = RegionProvisioner::with_config(ProvisionConfig {
        dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    });

    for size in [64usize, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("set_value", size), size, |b, &size| {
            let mut region = provisioner.create_temporary(size).unwrap();
            let payload = vec![0xA5u8; size];

            b.iter(|| {
                region.set_value(&payload).unwrap();
            });
        });
    }

    group.finish();
}

fn benchmark_value_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("SharedRegion_Value");

    let dir = TempDir::new().unwrap();
    let provisioner = RegionProvisioner::with_config(ProvisionConfig {
        dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    });

    for size in [64usize, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("value", size), size, |b, &size| {
            let mut region = provisioner.create_temporary(size).unwrap();
            region.set_value(&vec![0x5Au8; size]).unwrap();

            b.iter(|| {
                let value = region.value();
                criterion::black_box(value.len());
            });
        });
    }

    group.finish();
}

fn benchmark_exchange_round_trip(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let provisioner = RegionProvisioner::with_config(ProvisionConfig {
        dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    });

    c.bench_function("exchange_4k_between_mappings", |b| {
        let mut writer = provisioner.create_temporary(4096).unwrap();
        let reader = provisioner
            .attach_path(writer.path().unwrap(), writer.total_size(), false)
            .unwrap();
        let payload = vec![0x3Cu8; 4096];

        b.iter(|| {
            writer.set_value(&payload).unwrap();
            criterion::black_box(reader.value().len());
        });
    });
}

criterion_group!(
    benches,
    benchmark_set_value,
    benchmark_value_read,
    benchmark_exchange_round_trip
);
criterion_main!(benches);
