//! End-to-end integration tests for the voucher protocol.
//!
//! These tests walk whole market days: an issuer mints a voucher and
//! publishes its Witness share, members sync it, and vouchers change hands
//! over Offer/ACK exchanges. Every device gets its own store and cache; the
//! only thing shared between them is the bytes that would go through a
//! camera, plus a clock so TTLs can be fast-forwarded.

use std::sync::Arc;

use voucher_protocol::clock::{Clock, ManualClock};
use voucher_protocol::config::TransferConfig;
use voucher_protocol::crypto::keys::{Keypair, SecretKeyBytes, XOnlyPublicKey};
use voucher_protocol::crypto::signatures::{sign_hash, verify_hash};
use voucher_protocol::identity::derivation::{derive_private_key, derive_seed_with_params};
use voucher_protocol::identity::{to_ss58, SeedKdfParams};
use voucher_protocol::sharing::ShareRole;
use voucher_protocol::transfer::{
    challenge_digest, AckStatus, TransferEngine, TransferError, TransferState, WireAck, WireOffer,
};
use voucher_protocol::voucher::{
    issue_voucher, sync_witness_share, MemoryVoucherStore, MemoryWitnessCache, Status,
    StatusEvent, VoucherId, VoucherRepository, WitnessEnvelope,
};

const MARKET_SEED: [u8; 32] = [0x6d; 32];
const START: u64 = 1_760_000_000;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// One phone at the market.
struct Device {
    engine: TransferEngine,
    store: Arc<MemoryVoucherStore>,
    cache: Arc<MemoryWitnessCache>,
}

fn device(clock: &Arc<ManualClock>, identity: Option<Keypair>) -> Device {
    let store = Arc::new(MemoryVoucherStore::new());
    let cache = Arc::new(MemoryWitnessCache::new());
    let mut engine = TransferEngine::new(
        store.clone(),
        cache.clone(),
        clock.clone(),
        TransferConfig::default(),
    );
    if let Some(kp) = identity {
        engine = engine.with_identity(kp);
    }
    Device {
        engine,
        store,
        cache,
    }
}

/// Credential-derived identity with a cheap KDF profile.
fn identity(phone: &str, pin: &[u8]) -> Keypair {
    let params = SeedKdfParams {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    };
    let seed = derive_seed_with_params(phone, pin, params).unwrap();
    Keypair::from_secret(derive_private_key(&seed).unwrap())
}

/// Issue a voucher on `issuer`, publish the Witness envelope, and sync it
/// to every device in `market`. Returns the active voucher's id.
async fn mint(
    clock: &Arc<ManualClock>,
    issuer: &Device,
    issuer_pk: XOnlyPublicKey,
    market: &[&Device],
    value: u32,
) -> VoucherId {
    let now = clock.now();
    let issued = issue_voucher(issuer_pk, "Ferme du Lac", value, None, now).unwrap();
    let mut voucher = issued.voucher;
    let envelope =
        WitnessEnvelope::seal(voucher.id, &issued.witness_share, &MARKET_SEED, clock.today())
            .unwrap();

    // What the relay carries is JSON.
    let published = serde_json::to_string(&envelope).unwrap();
    voucher.apply(StatusEvent::Publish, now).unwrap();

    for member in market {
        let received: WitnessEnvelope = serde_json::from_str(&published).unwrap();
        sync_witness_share(member.cache.as_ref(), &received, &MARKET_SEED)
            .await
            .unwrap();
    }

    voucher.apply(StatusEvent::Activate, now).unwrap();
    issuer.store.save(&voucher).unwrap();
    voucher.id
}

fn status(device: &Device, id: &VoucherId) -> Status {
    device.store.load(id).unwrap().unwrap().status
}

// ---------------------------------------------------------------------------
// 1. Alice pays Bob
// ---------------------------------------------------------------------------

#[tokio::test]
async fn alice_pays_bob() {
    let clock = Arc::new(ManualClock::new(START));
    let alice_id = identity("+33611111111", b"4821");
    let alice_pk = alice_id.public_key();
    let alice = device(&clock, Some(alice_id));
    let bob = device(&clock, Some(identity("+33622222222", b"1379")));

    let id = mint(&clock, &alice, alice_pk, &[&alice, &bob], 1_500).await;
    assert_eq!(status(&alice, &id), Status::Active);

    // Alice shows the Offer.
    let mut session = alice.engine.create_offer(&id).await.unwrap();
    assert!(matches!(status(&alice, &id), Status::LockedForTransfer(_)));

    // Bob scans it, checking it came from Alice.
    clock.advance(20);
    let received = bob
        .engine
        .accept_offer(session.offer_bytes(), Some(&alice_pk))
        .await
        .unwrap();
    assert_eq!(received.voucher.value, 1_500);
    assert_eq!(received.voucher.issuer, alice_pk);
    assert_eq!(received.machine.state(), &TransferState::AckBuilt);

    // Alice scans the ACK.
    clock.advance(15);
    let spent = alice.engine.finalize(&mut session, &received.ack).await.unwrap();
    assert_eq!(spent.status, Status::Spent);
    assert_eq!(session.state(), &TransferState::Finalized);
    assert_eq!(status(&alice, &id), Status::Spent);

    // Alice keeps only the Anchor share; Bob holds Traveler + Witness.
    let alice_record = alice.store.load(&id).unwrap().unwrap();
    assert_eq!(alice_record.shares.roles(), vec![ShareRole::Anchor]);
    let bob_record = bob.store.load(&id).unwrap().unwrap();
    assert_eq!(bob_record.status, Status::Active);
    assert_eq!(
        bob_record.shares.roles(),
        vec![ShareRole::Traveler, ShareRole::Witness]
    );

    // Bob can now sign as the voucher.
    let secret = bob_record.shares.combine().unwrap();
    let key = SecretKeyBytes::from_bytes(&secret).unwrap();
    let digest = challenge_digest(&id, &[7u8; 16]);
    let sig = sign_hash(&key, &digest).unwrap();
    assert!(verify_hash(id.public_key(), &digest, &sig));

    // Identity keys have an SS58 form for the ledger bridge.
    assert!(to_ss58(&alice_pk).unwrap().starts_with('5'));
}

// ---------------------------------------------------------------------------
// 2. The voucher keeps travelling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn voucher_travels_alice_bob_carol() {
    let clock = Arc::new(ManualClock::new(START));
    let alice_kp = Keypair::generate();
    let alice_pk = alice_kp.public_key();
    let alice = device(&clock, Some(alice_kp));
    let bob = device(&clock, None);
    let carol = device(&clock, None);

    let id = mint(&clock, &alice, alice_pk, &[&alice, &bob, &carol], 300).await;

    let mut first = alice.engine.create_offer(&id).await.unwrap();
    let to_bob = bob.engine.accept_offer(first.offer_bytes(), None).await.unwrap();
    alice.engine.finalize(&mut first, &to_bob.ack).await.unwrap();

    clock.advance(60);
    let mut second = bob.engine.create_offer(&id).await.unwrap();
    let offer = WireOffer::decode(second.offer_bytes()).unwrap();
    assert!(!offer.is_signed(), "bob has no identity key");
    assert_eq!(offer.issuer_id, alice_pk);

    let to_carol = carol.engine.accept_offer(second.offer_bytes(), None).await.unwrap();
    bob.engine.finalize(&mut second, &to_carol.ack).await.unwrap();

    assert_eq!(status(&bob, &id), Status::Spent);
    assert_eq!(status(&carol, &id), Status::Active);
    assert!(!bob
        .store
        .load(&id)
        .unwrap()
        .unwrap()
        .shares
        .contains(ShareRole::Traveler));
}

// ---------------------------------------------------------------------------
// 3. Replays and staleness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_offer_replay_is_rejected() {
    let clock = Arc::new(ManualClock::new(START));
    let alice = device(&clock, None);
    let bob = device(&clock, None);
    let mallory = device(&clock, None);
    let issuer = Keypair::generate().public_key();

    let id = mint(&clock, &alice, issuer, &[&alice, &bob, &mallory], 50).await;

    let mut session = alice.engine.create_offer(&id).await.unwrap();
    let captured = session.offer_bytes().to_vec();
    let received = bob.engine.accept_offer(&captured, None).await.unwrap();
    alice.engine.finalize(&mut session, &received.ack).await.unwrap();

    // Someone photographed the Offer and tries it much later.
    clock.advance(TransferConfig::default().offer_ttl_secs);
    assert!(matches!(
        mallory.engine.accept_offer(&captured, None).await,
        Err(TransferError::OfferExpired { .. })
    ));
    assert!(mallory.store.load(&id).unwrap().is_none());

    // Replaying Bob's old ACK at Alice does nothing: the session is closed.
    assert!(matches!(
        alice.engine.finalize(&mut session, &received.ack).await,
        Err(TransferError::InvalidState(_))
    ));
}

#[tokio::test]
async fn ack_from_a_different_offer_does_not_verify() {
    let clock = Arc::new(ManualClock::new(START));
    let alice = device(&clock, None);
    let bob = device(&clock, None);
    let id = mint(&clock, &alice, Keypair::generate().public_key(), &[&alice, &bob], 80).await;

    // First attempt is abandoned after Bob signed it.
    let mut old = alice.engine.create_offer(&id).await.unwrap();
    let old_ack = bob.engine.accept_offer(old.offer_bytes(), None).await.unwrap().ack;
    alice.engine.abort(&mut old).unwrap();

    // A fresh attempt has a fresh challenge; the old ACK must not close it.
    let mut fresh = alice.engine.create_offer(&id).await.unwrap();
    assert!(matches!(
        alice.engine.finalize(&mut fresh, &old_ack).await,
        Err(TransferError::SignatureInvalid)
    ));
    assert_eq!(status(&alice, &id), Status::Active);
}

// ---------------------------------------------------------------------------
// 4. Lock behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_offers_on_one_voucher() {
    let clock = Arc::new(ManualClock::new(START));
    let alice = device(&clock, None);
    let id = mint(&clock, &alice, Keypair::generate().public_key(), &[&alice], 10).await;

    let (a, b) = tokio::join!(alice.engine.create_offer(&id), alice.engine.create_offer(&id));
    let results = [a, b];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let busy = results
        .iter()
        .filter(|r| matches!(r, Err(TransferError::LockUnavailable { .. })))
        .count();
    assert_eq!((ok, busy), (1, 1));
    for r in &results {
        if let Err(e) = r {
            assert!(e.is_recoverable());
        }
    }
}

#[tokio::test]
async fn crash_recovery_restores_voucher() {
    let clock = Arc::new(ManualClock::new(START));
    let alice = device(&clock, None);
    let bob = device(&clock, None);
    let id = mint(&clock, &alice, Keypair::generate().public_key(), &[&alice, &bob], 40).await;

    let session = alice.engine.create_offer(&id).await.unwrap();
    drop(session);

    // The phone dies. It comes back six minutes later with the same store.
    clock.advance(360);
    let restarted = TransferEngine::new(
        alice.store.clone(),
        alice.cache.clone(),
        clock.clone(),
        TransferConfig::default(),
    );
    assert_eq!(restarted.recover().unwrap(), vec![id]);
    assert_eq!(status(&alice, &id), Status::Active);

    let mut session = restarted.create_offer(&id).await.unwrap();
    let received = bob.engine.accept_offer(session.offer_bytes(), None).await.unwrap();
    restarted.finalize(&mut session, &received.ack).await.unwrap();
    assert_eq!(status(&alice, &id), Status::Spent);
}

#[tokio::test]
async fn ack_after_lock_expiry_is_refused() {
    let clock = Arc::new(ManualClock::new(START));
    let alice = device(&clock, None);
    let bob = device(&clock, None);
    let id = mint(&clock, &alice, Keypair::generate().public_key(), &[&alice, &bob], 40).await;

    let mut session = alice.engine.create_offer(&id).await.unwrap();
    let received = bob.engine.accept_offer(session.offer_bytes(), None).await.unwrap();

    clock.advance(TransferConfig::default().lock_ttl_secs);
    let err = alice
        .engine
        .finalize(&mut session, &received.ack)
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::LockExpired));
    assert!(err.is_recoverable());
    assert_eq!(status(&alice, &id), Status::Active);
    assert!(matches!(session.state(), TransferState::Failed(_)));
}

#[tokio::test]
async fn aborting_a_lapsed_offer_keeps_the_newer_lock() {
    let clock = Arc::new(ManualClock::new(START));
    let alice = device(&clock, None);
    let bob = device(&clock, None);
    let id = mint(&clock, &alice, Keypair::generate().public_key(), &[&alice, &bob], 60).await;

    let mut first = alice.engine.create_offer(&id).await.unwrap();
    clock.advance(TransferConfig::default().lock_ttl_secs + 1);
    let mut second = alice.engine.create_offer(&id).await.unwrap();
    assert_eq!(status(&alice, &id), Status::LockedForTransfer(*second.lock()));

    // Backing out of the old Offer must not reopen the voucher.
    alice.engine.abort(&mut first).unwrap();
    assert_eq!(status(&alice, &id), Status::LockedForTransfer(*second.lock()));
    assert!(matches!(
        alice.engine.create_offer(&id).await,
        Err(TransferError::LockUnavailable { .. })
    ));

    // The live Offer still completes.
    let received = bob.engine.accept_offer(second.offer_bytes(), None).await.unwrap();
    alice.engine.finalize(&mut second, &received.ack).await.unwrap();
    assert_eq!(status(&alice, &id), Status::Spent);
}

// ---------------------------------------------------------------------------
// 5. Declining
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bob_declines() {
    let clock = Arc::new(ManualClock::new(START));
    let alice = device(&clock, None);
    let bob = device(&clock, None);
    let id = mint(&clock, &alice, Keypair::generate().public_key(), &[&alice, &bob], 25).await;

    let mut session = alice.engine.create_offer(&id).await.unwrap();
    let ack = bob.engine.decline_offer(session.offer_bytes()).unwrap().ack;
    assert_eq!(WireAck::decode(&ack).unwrap().status, AckStatus::Declined);

    assert!(matches!(
        alice.engine.finalize(&mut session, &ack).await,
        Err(TransferError::TransferDeclined)
    ));
    assert_eq!(status(&alice, &id), Status::Active);
    assert!(bob.store.load(&id).unwrap().is_none());

    // Alice can offer it again straight away.
    assert!(alice.engine.create_offer(&id).await.is_ok());
}

// ---------------------------------------------------------------------------
// 6. Outsiders
// ---------------------------------------------------------------------------

#[tokio::test]
async fn device_without_witness_share_cannot_receive() {
    let clock = Arc::new(ManualClock::new(START));
    let alice = device(&clock, None);
    let outsider = device(&clock, None);
    let id = mint(&clock, &alice, Keypair::generate().public_key(), &[&alice], 25).await;

    let mut session = alice.engine.create_offer(&id).await.unwrap();
    assert!(matches!(
        outsider.engine.accept_offer(session.offer_bytes(), None).await,
        Err(TransferError::WitnessShareUnavailable(_))
    ));
    alice.engine.abort(&mut session).unwrap();
    assert_eq!(status(&alice, &id), Status::Active);
}

#[tokio::test]
async fn wrong_market_seed_cannot_open_envelope() {
    let clock = Arc::new(ManualClock::new(START));
    let issuer = Keypair::generate().public_key();
    let issued = issue_voucher(issuer, "Ferme du Lac", 5, None, clock.now()).unwrap();
    let envelope = WitnessEnvelope::seal(
        issued.voucher.id,
        &issued.witness_share,
        &MARKET_SEED,
        clock.today(),
    )
    .unwrap();

    let stranger = device(&clock, None);
    assert!(sync_witness_share(stranger.cache.as_ref(), &envelope, &[0u8; 32])
        .await
        .is_err());
}
