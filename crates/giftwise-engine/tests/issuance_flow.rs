//! End-to-end tests: real components wired together over an in-memory store,
//! with a background template generated on the fly.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{Duration as ChronoDuration, Utc};
use image::{ImageFormat, Rgba, RgbaImage};
use uuid::Uuid;

use giftwise_core::card::{CARD_NUMBER_MAX, CARD_NUMBER_MIN};
use giftwise_core::{
    Amount, CardNumber, CredentialStatus, DeliveryJob, GiftCredential, IssuanceRequest,
    RedemptionOutcome,
};
use giftwise_db::{Database, DbConfig};
use giftwise_engine::{
    ArtifactStore, CardTemplate, CredentialRenderer, DeliveryError, DeliveryPolicy,
    DeliveryProcessor, DeliveryTransport, IssuanceCoordinator, IssuanceError, IssuancePolicy,
    RedemptionVerifier, SealingKey, TokenSealer,
};

// =============================================================================
// Test Harness
// =============================================================================

struct TestEngine {
    db: Database,
    sealer: TokenSealer,
    coordinator: IssuanceCoordinator,
    verifier: RedemptionVerifier,
    artifacts: ArtifactStore,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn engine() -> TestEngine {
    engine_with_policy(IssuancePolicy::default()).await
}

async fn engine_with_policy(policy: IssuancePolicy) -> TestEngine {
    init_tracing();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let dir = std::env::temp_dir().join(format!("giftwise-e2e-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();

    let background_path = dir.join("background.png");
    RgbaImage::from_pixel(300, 550, Rgba([10, 60, 120, 255]))
        .save_with_format(&background_path, ImageFormat::Png)
        .unwrap();

    let renderer = Arc::new(CredentialRenderer::new(CardTemplate::new(&background_path)).unwrap());
    let artifacts = ArtifactStore::new(dir.join("artifacts"));
    let sealer = TokenSealer::new(SealingKey::from_bytes([0x42; 32]));

    let coordinator = IssuanceCoordinator::new(
        db.clone(),
        sealer.clone(),
        renderer,
        artifacts.clone(),
        policy,
    );
    let verifier = RedemptionVerifier::new(db.clone(), sealer.clone());

    TestEngine {
        db,
        sealer,
        coordinator,
        verifier,
        artifacts,
    }
}

fn request(amount: i64) -> IssuanceRequest {
    IssuanceRequest {
        recipient_name: "Mila".to_string(),
        gift_message: "Happy birthday!".to_string(),
        recipient_email: "a@b.com".to_string(),
        amount,
        payment_authorized: true,
    }
}

// =============================================================================
// Issuance
// =============================================================================

#[tokio::test]
async fn issue_then_redeem_then_replay() {
    let engine = engine().await;

    // Issue
    let receipt = engine.coordinator.issue(&request(1000)).await.unwrap();
    assert!(receipt.card_number.value() >= CARD_NUMBER_MIN);
    assert!(receipt.card_number.value() <= CARD_NUMBER_MAX);

    let stored = engine
        .db
        .credentials()
        .find_by_token(&receipt.sealed_token)
        .await
        .unwrap()
        .expect("credential should be persisted");
    assert_eq!(stored.status, CredentialStatus::Issued);
    assert_eq!(stored.amount.value(), 1000);
    assert_eq!(stored.card_number, receipt.card_number);
    assert_eq!(stored.expires_at, receipt.expires_at);

    // The rendered artifact exists and is a decodable PNG of template size
    let artifact_path = engine.artifacts.path_for(&receipt.artifact_ref);
    let bytes = tokio::fs::read(&artifact_path).await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!((decoded.width(), decoded.height()), (300, 550));

    // Redeem
    let outcome = engine.verifier.verify(&receipt.sealed_token).await.unwrap();
    assert_eq!(
        outcome,
        RedemptionOutcome::Redeemed {
            card_number: receipt.card_number,
            amount: Amount::try_new(1000).unwrap(),
        }
    );

    // Replay with the same token
    let outcome = engine.verifier.verify(&receipt.sealed_token).await.unwrap();
    assert_eq!(outcome, RedemptionOutcome::AlreadyRedeemed);
}

#[tokio::test]
async fn off_menu_amount_is_a_validation_error() {
    let engine = engine().await;

    let err = engine.coordinator.issue(&request(1500)).await.unwrap_err();
    assert!(matches!(err, IssuanceError::Validation(_)), "{err:?}");

    // Nothing durable was left behind
    assert_eq!(engine.db.credentials().count_all().await.unwrap(), 0);
}

#[tokio::test]
async fn unauthorized_payment_fails_before_allocation() {
    let engine = engine().await;

    let mut req = request(1000);
    req.payment_authorized = false;

    let err = engine.coordinator.issue(&req).await.unwrap_err();
    assert!(matches!(err, IssuanceError::PaymentNotAuthorized), "{err:?}");
    assert_eq!(engine.db.credentials().count_all().await.unwrap(), 0);
}

#[tokio::test]
async fn card_numbers_stay_unique_across_history() {
    let engine = engine().await;

    let mut numbers = HashSet::new();
    for _ in 0..5 {
        let receipt = engine.coordinator.issue(&request(2000)).await.unwrap();
        numbers.insert(receipt.card_number.value());
    }

    assert_eq!(numbers.len(), 5);
    assert_eq!(engine.db.credentials().count_all().await.unwrap(), 5);
}

// =============================================================================
// Redemption edge cases
// =============================================================================

#[tokio::test]
async fn garbage_and_foreign_tokens_are_invalid() {
    let engine = engine().await;

    for garbage in ["", "garbage", "zz:zz", "0102030405060708090a0b0c"] {
        let outcome = engine.verifier.verify(garbage).await.unwrap();
        assert_eq!(outcome, RedemptionOutcome::TokenInvalid, "{garbage}");
    }

    // Sealed under a different key: authenticates as forged
    let foreign = TokenSealer::new(SealingKey::from_bytes([0x99; 32]));
    let (_, sealed) = foreign.seal().unwrap();
    let outcome = engine.verifier.verify(&sealed.encode()).await.unwrap();
    assert_eq!(outcome, RedemptionOutcome::TokenInvalid);
}

#[tokio::test]
async fn well_formed_but_unissued_token_is_not_found() {
    let engine = engine().await;

    // Sealed under the right key, but never persisted
    let (_, sealed) = engine.sealer.seal().unwrap();
    let outcome = engine.verifier.verify(&sealed.encode()).await.unwrap();
    assert_eq!(outcome, RedemptionOutcome::NotFound);
}

#[tokio::test]
async fn zero_validity_credential_expires_immediately() {
    let engine = engine_with_policy(IssuancePolicy {
        validity_days: 0,
        ..IssuancePolicy::default()
    })
    .await;

    let receipt = engine.coordinator.issue(&request(1000)).await.unwrap();
    let outcome = engine.verifier.verify(&receipt.sealed_token).await.unwrap();
    assert_eq!(outcome, RedemptionOutcome::Expired);

    // The lazy sweep in the verifier marked the row
    let stored = engine
        .db
        .credentials()
        .find_by_token(&receipt.sealed_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, CredentialStatus::Expired);
}

#[tokio::test]
async fn expiry_wins_over_prior_redemption() {
    let engine = engine().await;
    let now = Utc::now();

    // A credential that was redeemed in its day and has since expired
    let (_, sealed) = engine.sealer.seal().unwrap();
    let credential = GiftCredential {
        id: Uuid::new_v4().to_string(),
        card_number: CardNumber::try_new(123456789012).unwrap(),
        recipient_name: "Mila".to_string(),
        gift_message: "Happy birthday!".to_string(),
        recipient_email: "a@b.com".to_string(),
        amount: Amount::try_new(1000).unwrap(),
        sealed_token: sealed.encode(),
        artifact_ref: "giftcard-123456789012.png".to_string(),
        status: CredentialStatus::Redeemed,
        issued_at: now - ChronoDuration::days(400),
        expires_at: now - ChronoDuration::days(35),
        redeemed_at: Some(now - ChronoDuration::days(300)),
        revision: 1,
    };
    engine.db.credentials().insert(&credential).await.unwrap();

    // After expires_at the answer is Expired regardless of redemption state
    let outcome = engine.verifier.verify(&sealed.encode()).await.unwrap();
    assert_eq!(outcome, RedemptionOutcome::Expired);
}

#[tokio::test]
async fn concurrent_redemption_has_exactly_one_winner() {
    let engine = engine().await;
    let receipt = engine.coordinator.issue(&request(5000)).await.unwrap();

    let verifier_a = engine.verifier.clone();
    let verifier_b = engine.verifier.clone();
    let token_a = receipt.sealed_token.clone();
    let token_b = receipt.sealed_token.clone();

    let (outcome_a, outcome_b) = tokio::join!(
        tokio::spawn(async move { verifier_a.verify(&token_a).await.unwrap() }),
        tokio::spawn(async move { verifier_b.verify(&token_b).await.unwrap() }),
    );
    let outcomes = [outcome_a.unwrap(), outcome_b.unwrap()];

    let redeemed = outcomes
        .iter()
        .filter(|o| matches!(o, RedemptionOutcome::Redeemed { .. }))
        .count();
    let already = outcomes
        .iter()
        .filter(|o| matches!(o, RedemptionOutcome::AlreadyRedeemed))
        .count();

    assert_eq!(redeemed, 1, "exactly one caller wins: {outcomes:?}");
    assert_eq!(already, 1, "the loser observes AlreadyRedeemed: {outcomes:?}");
}

// =============================================================================
// Expiry sweep
// =============================================================================

#[tokio::test]
async fn sweep_expires_overdue_credentials() {
    let engine = engine_with_policy(IssuancePolicy {
        validity_days: 0,
        ..IssuancePolicy::default()
    })
    .await;

    engine.coordinator.issue(&request(1000)).await.unwrap();
    engine.coordinator.issue(&request(2000)).await.unwrap();

    let swept = engine.coordinator.sweep_expired().await.unwrap();
    assert_eq!(swept, 2);
    assert_eq!(engine.db.credentials().count_issued().await.unwrap(), 0);

    // Idempotent: a second sweep finds nothing
    assert_eq!(engine.coordinator.sweep_expired().await.unwrap(), 0);
}

// =============================================================================
// Delivery decoupling
// =============================================================================

#[derive(Clone, Default)]
struct RecordingTransport {
    delivered: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl DeliveryTransport for RecordingTransport {
    async fn deliver(&self, job: &DeliveryJob, artifact_path: &Path) -> Result<(), DeliveryError> {
        self.delivered
            .lock()
            .unwrap()
            .push((job.recipient_email.clone(), artifact_path.to_path_buf()));
        Ok(())
    }
}

#[tokio::test]
async fn issuance_queues_delivery_and_the_worker_drains_it() {
    let engine = engine().await;
    let receipt = engine.coordinator.issue(&request(1000)).await.unwrap();

    // Issuance already returned; the job waits in the outbox
    assert_eq!(engine.db.delivery_outbox().count_pending().await.unwrap(), 1);

    let transport = RecordingTransport::default();
    let (processor, _handle) = DeliveryProcessor::new(
        engine.db.clone(),
        engine.artifacts.clone(),
        transport.clone(),
        DeliveryPolicy::default(),
    );

    let stats = processor.process_pending().await.unwrap();
    assert_eq!(stats.delivered, 1);
    assert_eq!(engine.db.delivery_outbox().count_pending().await.unwrap(), 0);

    let delivered = transport.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, "a@b.com");
    assert!(delivered[0].1.ends_with(&receipt.artifact_ref));
}
