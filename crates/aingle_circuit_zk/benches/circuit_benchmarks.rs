//! Benchmarks for circuit construction and batch proofs

use aingle_circuit_zk::{
    BatchConfig, BatchEncryptionCircuit, BatchProver, BatchVerifier, EncryptionCircuit, Field,
    PaillierEncryption, SparseMatrix,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use num_bigint::BigUint;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn keypair(key_bytes: usize) -> PaillierEncryption {
    let mut rng = StdRng::seed_from_u64(42);
    PaillierEncryption::generate_with_rng(key_bytes, &mut rng).unwrap()
}

fn test_config(msg_count: usize) -> BatchConfig {
    BatchConfig {
        msg_count,
        ..BatchConfig::test_mode()
    }
}

fn messages(batch: &BatchEncryptionCircuit) -> Vec<BigUint> {
    let layout = batch.layout();
    let slots = layout.slot_layout().unwrap();
    (0..layout.msg_count)
        .map(|i| {
            let flags: Vec<bool> = (0..layout.slots_per_msg).map(|r| (i + r) % 2 == 0).collect();
            slots.encode(&flags).unwrap()
        })
        .collect()
}

/// Benchmark the encryption circuit for growing key sizes
fn benchmark_encryption_circuit(c: &mut Criterion) {
    let mut group = c.benchmark_group("encryption_circuit");

    for key_bytes in [8usize, 16, 32] {
        let crypto = keypair(key_bytes);
        let mut rng = StdRng::seed_from_u64(1);
        let m = BigUint::from(7u32);
        let r = crypto.pick_random_with_rng(&mut rng);
        let cipher = crypto.encrypt(&m, &r).unwrap();

        group.bench_with_input(BenchmarkId::new("wire_up", key_bytes), &key_bytes, |b, _| {
            b.iter(|| {
                black_box(
                    EncryptionCircuit::wire_up(
                        crypto.public_key(),
                        crypto.group_params().clone(),
                        black_box(&cipher),
                    )
                    .unwrap(),
                )
            })
        });

        let mut circuit =
            EncryptionCircuit::wire_up(crypto.public_key(), crypto.group_params().clone(), &cipher)
                .unwrap();
        group.bench_with_input(BenchmarkId::new("run", key_bytes), &key_bytes, |b, _| {
            b.iter(|| black_box(circuit.run(black_box(&m), black_box(&r)).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark sparse reshaping of a gate vector
fn benchmark_matrix_group(c: &mut Criterion) {
    let field = Field::new(BigUint::from(1_000_003u32)).unwrap();
    let values: Vec<i64> = (1..=1024).collect();
    let row = SparseMatrix::from_i64_row(&field, &values).unwrap();

    c.bench_function("matrix_group_1024", |b| {
        b.iter(|| {
            let mut m = row.clone();
            m.group(32, Some(32)).unwrap();
            black_box(m)
        })
    });
}

/// Benchmark the batch statement, wiring through proving
fn benchmark_batch_proof(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_proof");
    group.sample_size(10);

    let crypto = keypair(8);
    for msg_count in [2usize, 4, 8] {
        let config = test_config(msg_count);

        group.bench_with_input(BenchmarkId::new("wire_up_and_run", msg_count), &config, |b, config| {
            let mut rng = StdRng::seed_from_u64(2);
            b.iter(|| {
                let mut batch = BatchEncryptionCircuit::new(crypto.clone(), config).unwrap();
                let msgs = messages(&batch);
                batch.encrypt_with_rng(&msgs, &mut rng).unwrap();
                let ljir = batch.calculate_ljir().unwrap();
                let lj = batch.calculate_lj(&ljir).unwrap();
                batch.wire_up(&ljir, &lj).unwrap();
                batch.run().unwrap();
                black_box(batch)
            })
        });

        let prover = BatchProver::new(crypto.clone(), config.clone()).unwrap();
        let msgs = messages(&BatchEncryptionCircuit::new(crypto.clone(), &config).unwrap());
        group.bench_with_input(BenchmarkId::new("prove", msg_count), &msgs, |b, msgs| {
            let mut rng = StdRng::seed_from_u64(3);
            b.iter(|| black_box(prover.prove_with_rng(msgs, &mut rng).unwrap()))
        });

        let mut rng = StdRng::seed_from_u64(4);
        let proof = prover.prove_with_rng(&msgs, &mut rng).unwrap();
        let verifier = BatchVerifier::new(crypto.to_public(), config.clone()).unwrap();
        group.bench_with_input(BenchmarkId::new("verify", msg_count), &proof, |b, proof| {
            b.iter(|| black_box(verifier.verify(proof)))
        });
    }

    group.finish();
}

criterion_group!(circuit_benches, benchmark_encryption_circuit, benchmark_matrix_group);

criterion_group!(proof_benches, benchmark_batch_proof);

criterion_main!(circuit_benches, proof_benches);
