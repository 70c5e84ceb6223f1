//! Integration tests for batch encryption proofs

use aingle_circuit_zk::{
    Aggregator, BatchConfig, BatchEncryptionCircuit, BatchLayout, BatchProof, BatchProver,
    BatchVerifier, EncryptionCircuit, GeneratorSetup, PaillierEncryption,
};
use num_bigint::BigUint;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn keypair(seed: u64) -> (PaillierEncryption, StdRng) {
    let mut rng = StdRng::seed_from_u64(seed);
    let crypto = PaillierEncryption::generate_with_rng(8, &mut rng).unwrap();
    (crypto, rng)
}

fn flags(config: &BatchConfig, salt: usize) -> Vec<Vec<bool>> {
    (0..config.msg_count)
        .map(|i| {
            (0..config.slots_per_msg())
                .map(|r| (i * 7 + r * 3 + salt) % 5 < 2)
                .collect()
        })
        .collect()
}

fn prove(
    crypto: &PaillierEncryption,
    config: &BatchConfig,
    rng: &mut StdRng,
) -> (BatchProof, Vec<Vec<bool>>) {
    let prover = BatchProver::new(crypto.clone(), config.clone()).unwrap();
    let flags = flags(config, 1);
    let messages = prover.encode_messages(&flags).unwrap();
    (prover.prove_with_rng(&messages, rng).unwrap(), flags)
}

#[test]
fn test_default_layout_counts() {
    let n = (BigUint::from(1u32) << 2047) + 12_345u32;
    let layout = BatchLayout::new(&BatchConfig::default(), &n).unwrap();
    assert_eq!(layout.msg_size, 256);
    assert_eq!(layout.batch_count, 10);
    assert_eq!(layout.slots_per_msg, 64);
    assert_eq!(layout.rj_max, BigUint::from(1u32) << 282);
    assert_eq!(layout.encryption_count(), 150 + 3 + 10);
}

#[test]
fn test_encryption_circuit_round_trip() {
    let (crypto, mut rng) = keypair(21);
    for m in [0u64, 1, 0xdead_beef, 1 << 40] {
        let m = BigUint::from(m);
        let r = crypto.pick_random_with_rng(&mut rng);
        let c = crypto.encrypt(&m, &r).unwrap();
        let mut circuit =
            EncryptionCircuit::wire_up(crypto.public_key(), crypto.group_params().clone(), &c)
                .unwrap();
        assert_eq!(circuit.run(&m, &r).unwrap(), c);
        circuit.circuit().check_satisfied().unwrap();
    }
}

#[test]
fn test_batch_completeness() {
    let config = BatchConfig::test_mode();
    for seed in [1u64, 2] {
        let (crypto, mut rng) = keypair(seed);
        let (proof, _) = prove(&crypto, &config, &mut rng);
        let verifier = BatchVerifier::new(crypto.to_public(), config.clone()).unwrap();
        assert!(verifier.verify(&proof), "seed {seed}");
    }
}

#[test]
fn test_partial_last_batch() {
    let mut config = BatchConfig::test_mode();
    config.msg_count = 3;
    let (crypto, mut rng) = keypair(3);
    let (proof, _) = prove(&crypto, &config, &mut rng);
    assert_eq!(proof.ciphertexts.cm_star.len(), 2);
    let verifier = BatchVerifier::new(crypto.to_public(), config).unwrap();
    assert!(verifier.verify(&proof));
}

#[test]
fn test_hash_derived_setup_must_match() {
    let config = BatchConfig::test_mode();
    let (crypto, mut rng) = keypair(4);
    let setup = GeneratorSetup::HashDerived {
        domain: b"batch-test".to_vec(),
    };
    let prover = BatchProver::new(crypto.clone(), config.clone())
        .unwrap()
        .with_setup(setup.clone());
    let messages = prover.encode_messages(&flags(&config, 2)).unwrap();
    let proof = prover.prove_with_rng(&messages, &mut rng).unwrap();

    let matching = BatchVerifier::new(crypto.to_public(), config.clone())
        .unwrap()
        .with_setup(setup);
    assert!(matching.verify(&proof));
    let sequential = BatchVerifier::new(crypto.to_public(), config).unwrap();
    assert!(!sequential.verify(&proof));
}

#[test]
fn test_ljir_agrees_between_prover_and_verifier() {
    let config = BatchConfig::test_mode();
    let (crypto, mut rng) = keypair(5);
    let mut prover_side = BatchEncryptionCircuit::new(crypto.clone(), &config).unwrap();
    let slots = prover_side.layout().slot_layout().unwrap();
    let messages: Vec<BigUint> = flags(&config, 0)
        .iter()
        .map(|f| slots.encode(f).unwrap())
        .collect();
    let cts = prover_side.encrypt_with_rng(&messages, &mut rng).unwrap();

    let mut verifier_side = BatchEncryptionCircuit::new(crypto.to_public(), &config).unwrap();
    verifier_side.set_ciphertexts(cts).unwrap();
    assert_eq!(
        prover_side.calculate_ljir().unwrap(),
        verifier_side.calculate_ljir().unwrap()
    );
}

#[test]
fn test_wrong_key_rejected() {
    let config = BatchConfig::test_mode();
    let (crypto, mut rng) = keypair(6);
    let (other, _) = keypair(7);
    let (proof, _) = prove(&crypto, &config, &mut rng);
    let verifier = BatchVerifier::new(other.to_public(), config).unwrap();
    assert!(!verifier.verify(&proof));
}

#[test]
fn test_mutated_commitment_rejected() {
    let config = BatchConfig::test_mode();
    let (crypto, mut rng) = keypair(8);
    let (proof, _) = prove(&crypto, &config, &mut rng);
    let verifier = BatchVerifier::new(crypto.to_public(), config).unwrap();

    let mut bad = proof.clone();
    bad.commits[0] += 1u32;
    assert!(!verifier.verify(&bad));

    let mut bad = proof.clone();
    let last = bad.poly_commits.len() - 1;
    bad.poly_commits[last] += 1u32;
    assert!(!verifier.verify(&bad));

    let mut bad = proof;
    bad.ciphertexts.crj[0] += 1u32;
    assert!(!verifier.verify(&bad));
}

#[test]
fn test_non_canonical_encodings_rejected() {
    let config = BatchConfig::test_mode();
    let (crypto, mut rng) = keypair(10);
    let (proof, _) = prove(&crypto, &config, &mut rng);
    let verifier = BatchVerifier::new(crypto.to_public(), config).unwrap();
    assert!(verifier.verify(&proof));

    // same residues, shifted by the modulus
    let mut bad = proof.clone();
    bad.proofs[0] += crypto.group_p();
    assert!(!verifier.verify(&bad));

    let mut bad = proof.clone();
    bad.commits[0] += crypto.group_q();
    assert!(!verifier.verify(&bad));

    let mut bad = proof;
    bad.poly_commits[0] += crypto.group_q();
    assert!(!verifier.verify(&bad));
}

#[test]
fn test_aggregate_after_verification() {
    let config = BatchConfig::test_mode();
    let (crypto, mut rng) = keypair(9);
    let (proof, flags) = prove(&crypto, &config, &mut rng);
    let verifier = BatchVerifier::new(crypto.to_public(), config.clone()).unwrap();
    assert!(verifier.verify(&proof));

    let aggregator = Aggregator::new(crypto, &config).unwrap();
    let weights = aggregator.random_weights_with_rng(&mut rng);
    let totals = aggregator.aggregate(&proof.ciphertexts.cm, &weights).unwrap();
    for r in 0..config.slots_per_msg() {
        let expected: BigUint = flags
            .iter()
            .zip(&weights)
            .filter(|(f, _)| f[r])
            .map(|(_, w)| w.clone())
            .sum();
        assert_eq!(totals.sums[r], expected);
    }
}
