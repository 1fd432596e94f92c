// Schnorr signing & verification benchmarks for the voucher protocol.
//
// Covers key generation, BIP-340 signing and verification of a challenge
// digest, and the two wire signatures: Offer signing and ACK production.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use voucher_protocol::crypto::keys::{Keypair, SchnorrSignature};
use voucher_protocol::crypto::signatures::{sign_hash, verify_hash};
use voucher_protocol::transfer::{challenge_digest, WireOffer};
use voucher_protocol::voucher::VoucherId;

fn sample_offer() -> WireOffer {
    WireOffer {
        voucher_id: VoucherId::new(Keypair::generate().public_key()),
        value: 1_500,
        issuer_id: Keypair::generate().public_key(),
        encrypted_traveler: [0x11; 32],
        nonce: [0x22; 12],
        tag: [0x33; 16],
        challenge: [0x44; 16],
        issuer_name: "Ferme du Lac".into(),
        timestamp: 1_760_000_000,
        signature: SchnorrSignature::EMPTY,
    }
}

fn bench_keypair_generation(c: &mut Criterion) {
    c.bench_function("schnorr/keypair_generate", |b| {
        b.iter(Keypair::generate);
    });
}

fn bench_sign_challenge(c: &mut Criterion) {
    let keypair = Keypair::generate();
    let id = VoucherId::new(keypair.public_key());
    let digest = challenge_digest(&id, &[0x5a; 16]);

    c.bench_function("schnorr/sign_challenge", |b| {
        b.iter(|| sign_hash(keypair.secret(), &digest).unwrap());
    });
}

fn bench_verify_challenge(c: &mut Criterion) {
    let keypair = Keypair::generate();
    let id = VoucherId::new(keypair.public_key());
    let digest = challenge_digest(&id, &[0x5a; 16]);
    let signature = sign_hash(keypair.secret(), &digest).unwrap();
    let public_key = keypair.public_key();

    c.bench_function("schnorr/verify_challenge", |b| {
        b.iter(|| verify_hash(&public_key, &digest, &signature));
    });
}

fn bench_sign_offer(c: &mut Criterion) {
    let identity = Keypair::generate();
    let offer = sample_offer();

    c.bench_function("schnorr/sign_offer", |b| {
        b.iter(|| {
            let mut o = offer.clone();
            o.sign(identity.secret()).unwrap();
            o.encode().unwrap()
        });
    });
}

fn bench_verify_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("schnorr/verify_many");

    for size in [10, 50, 100] {
        let items: Vec<_> = (0..size)
            .map(|i: u8| {
                let kp = Keypair::generate();
                let digest = challenge_digest(&VoucherId::new(kp.public_key()), &[i; 16]);
                let sig = sign_hash(kp.secret(), &digest).unwrap();
                (kp.public_key(), digest, sig)
            })
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &items, |b, items| {
            b.iter(|| items.iter().all(|(pk, d, s)| verify_hash(pk, d, s)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_keypair_generation,
    bench_sign_challenge,
    bench_verify_challenge,
    bench_sign_offer,
    bench_verify_many,
);
criterion_main!(benches);
