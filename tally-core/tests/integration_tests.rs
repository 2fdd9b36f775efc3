//! Integration tests for tally-core services
//!
//! These run the full service stack against a real DuckDB (in memory or in
//! a temp directory) with cheap password hashing and a manual clock.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use tally_core::adapters::clock::ManualClock;
use tally_core::config::Config;
use tally_core::domain::{Argon2Params, Session, MSG_MISSING_FIELDS, MSG_PASSWORD_MISMATCH, MSG_PASSWORD_TOO_SHORT};
use tally_core::ports::{Clock, SessionStore};
use tally_core::services::EntryPoint;
use tally_core::{
    Error, Identity, ProviderAssertion, RegistrationForm, SessionToken, TallyContext,
    TransactionDraft, TransactionInput, TransactionKind,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn test_config() -> Config {
    let mut config = Config::default();
    config.password_params = Argon2Params::insecure_fast();
    config.session_ttl = Duration::hours(1);
    config.sliding_sessions = false;
    config
}

fn create_test_context() -> (TallyContext, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
    ));
    let ctx = TallyContext::in_memory(test_config(), clock.clone())
        .expect("Failed to create context");
    (ctx, clock)
}

async fn register(ctx: &TallyContext, name: &str, email: &str) -> Identity {
    ctx.auth_service
        .register(&RegistrationForm::new(name, email, "secret1", "secret1"))
        .await
        .expect("registration failed")
}

fn draft(kind: TransactionKind, category: &str, amount: i64) -> TransactionDraft {
    TransactionDraft::new(kind, category, Decimal::new(amount, 0)).unwrap()
}

fn validation_messages(err: Error) -> Vec<String> {
    match err {
        Error::Validation(errors) => errors.messages().to_vec(),
        other => panic!("expected validation error, got {:?}", other),
    }
}

// ============================================================================
// Registration and local login
// ============================================================================

#[tokio::test]
async fn test_register_then_login_case_insensitive() {
    let (ctx, _) = create_test_context();

    let ann = register(&ctx, "Ann", "A@x.com").await;
    assert_eq!(ann.email.as_deref(), Some("a@x.com"));

    let wrong = ctx.auth_service.login_local("a@x.com", "wrong").await;
    assert!(matches!(wrong, Err(Error::InvalidCredentials)));

    let again = ctx
        .auth_service
        .login_local("A@X.COM", "secret1")
        .await
        .unwrap();
    assert_eq!(again.id, ann.id);
}

#[tokio::test]
async fn test_duplicate_email_any_case_is_conflict() {
    let (ctx, _) = create_test_context();
    register(&ctx, "Ann", "ann@x.com").await;

    let err = ctx
        .auth_service
        .register(&RegistrationForm::new("Other", "ANN@X.com", "secret2", "secret2"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(ctx.repository.identity_count().unwrap(), 1);
}

#[tokio::test]
async fn test_registration_reports_every_violation() {
    let (ctx, _) = create_test_context();

    let err = ctx
        .auth_service
        .register(&RegistrationForm::new("", "a@x.com", "abc", "abd"))
        .await
        .unwrap_err();
    assert_eq!(
        validation_messages(err),
        [MSG_MISSING_FIELDS, MSG_PASSWORD_MISMATCH, MSG_PASSWORD_TOO_SHORT]
    );
    assert_eq!(ctx.repository.identity_count().unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_email_and_wrong_password_look_the_same() {
    let (ctx, _) = create_test_context();
    register(&ctx, "Ann", "a@x.com").await;

    let unknown = ctx.auth_service.login_local("nobody@x.com", "secret1").await.unwrap_err();
    let wrong = ctx.auth_service.login_local("a@x.com", "secret2").await.unwrap_err();
    assert_eq!(unknown.to_string(), wrong.to_string());
    assert_eq!(unknown.kind(), wrong.kind());
}

// ============================================================================
// External login and linking
// ============================================================================

#[tokio::test]
async fn test_external_login_creates_once_then_returns_unchanged() {
    let (ctx, _) = create_test_context();
    let first = ProviderAssertion::new("github", "583231")
        .with_username("octo")
        .with_avatar("https://avatars.example/583231");

    let created = ctx.auth_service.login_external(&first).await.unwrap();
    assert_eq!(created.display_name, "octo");
    assert_eq!(created.external_id.as_deref(), Some("github:583231"));
    assert!(created.email.is_none());
    assert!(created.password_hash.is_none());

    // Profile changes at the provider are not copied over
    let renamed = ProviderAssertion::new("github", "583231").with_display_name("The Octocat");
    let again = ctx.auth_service.login_external(&renamed).await.unwrap();
    assert_eq!(again.id, created.id);
    assert_eq!(again.display_name, "octo");
    assert_eq!(ctx.repository.identity_count().unwrap(), 1);
}

#[tokio::test]
async fn test_same_subject_different_providers_are_distinct() {
    let (ctx, _) = create_test_context();
    let a = ctx
        .auth_service
        .login_external(&ProviderAssertion::new("github", "1"))
        .await
        .unwrap();
    let b = ctx
        .auth_service
        .login_external(&ProviderAssertion::new("google", "1"))
        .await
        .unwrap();
    assert_ne!(a.id, b.id);
}

#[tokio::test]
async fn test_external_login_never_merges_on_email() {
    let (ctx, _) = create_test_context();
    let ann = register(&ctx, "Ann", "ann@x.com").await;

    let assertion = ProviderAssertion::new("github", "42").with_email("Ann@x.com");
    let err = ctx.auth_service.login_external(&assertion).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // The password identity is untouched
    let stored = ctx.auth_service.find_identity(ann.id).await.unwrap().unwrap();
    assert!(stored.external_id.is_none());

    // Linking explicitly makes the provider login resolve to Ann
    let linked = ctx.auth_service.link_external(&ann, &assertion).await.unwrap();
    assert_eq!(linked.external_id.as_deref(), Some("github:42"));
    let resolved = ctx.auth_service.login_external(&assertion).await.unwrap();
    assert_eq!(resolved.id, ann.id);

    // Local login still works on the linked identity
    let local = ctx.auth_service.login_local("ann@x.com", "secret1").await.unwrap();
    assert_eq!(local.id, ann.id);
}

#[tokio::test]
async fn test_link_rules() {
    let (ctx, _) = create_test_context();
    let ann = register(&ctx, "Ann", "ann@x.com").await;
    let bob = register(&ctx, "Bob", "bob@x.com").await;
    let assertion = ProviderAssertion::new("github", "9");

    ctx.auth_service.link_external(&ann, &assertion).await.unwrap();
    // Same pair twice is a no-op
    let again = ctx.auth_service.link_external(&ann, &assertion).await.unwrap();
    assert_eq!(again.id, ann.id);

    // Someone else can't take it
    let stolen = ctx.auth_service.link_external(&bob, &assertion).await.unwrap_err();
    assert!(matches!(stolen, Error::Conflict(_)));

    // Ann can't hold a second external id
    let second = ctx
        .auth_service
        .link_external(&ann, &ProviderAssertion::new("github", "10"))
        .await
        .unwrap_err();
    assert!(matches!(second, Error::Conflict(_)));
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_session_round_trip_and_destroy() {
    let (ctx, _) = create_test_context();
    let ann = register(&ctx, "Ann", "a@x.com").await;

    let token = ctx.session_service.create(ann.id).await.unwrap();
    let resolved = ctx.session_service.resolve(&token).await.unwrap().unwrap();
    assert_eq!(resolved.id, ann.id);

    ctx.session_service.destroy(&token).await.unwrap();
    assert!(ctx.session_service.resolve(&token).await.unwrap().is_none());

    // Destroying again is not an error
    ctx.session_service.destroy(&token).await.unwrap();
}

#[tokio::test]
async fn test_unknown_token_resolves_to_none() {
    let (ctx, _) = create_test_context();
    let token = SessionToken::from_client("never-issued");
    assert!(ctx.session_service.resolve(&token).await.unwrap().is_none());
}

#[tokio::test]
async fn test_session_expires_with_clock() {
    let (ctx, clock) = create_test_context();
    let ann = register(&ctx, "Ann", "a@x.com").await;
    let token = ctx.session_service.create(ann.id).await.unwrap();

    clock.advance(Duration::hours(1));
    assert!(ctx.session_service.resolve(&token).await.unwrap().is_none());
    // Expired session was deleted on resolve
    assert_eq!(ctx.session_service.purge_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn test_session_for_missing_identity_resolves_to_none() {
    let (ctx, clock) = create_test_context();
    let token = SessionToken::generate();
    let session = Session::new(&token, Uuid::new_v4(), clock.now(), Duration::hours(1));
    ctx.repository.insert_session(&session).await.unwrap();

    assert!(ctx.session_service.resolve(&token).await.unwrap().is_none());
    // The dangling row is removed on resolve
    assert!(ctx.repository.get_session(&token.digest()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_session_token_is_not_stored() {
    let (ctx, _) = create_test_context();
    let ann = register(&ctx, "Ann", "a@x.com").await;
    let token = ctx.session_service.create(ann.id).await.unwrap();

    assert!(ctx.repository.get_session(token.as_str()).await.unwrap().is_none());
    assert!(ctx.repository.get_session(&token.digest()).await.unwrap().is_some());
}

// ============================================================================
// Ledger and aggregation
// ============================================================================

#[tokio::test]
async fn test_dashboard_example() {
    let (ctx, _) = create_test_context();
    let ann = register(&ctx, "Ann", "a@x.com").await;

    ctx.ledger_service
        .add(&ann, draft(TransactionKind::Income, "salary", 1000))
        .await
        .unwrap();
    ctx.ledger_service
        .add(&ann, draft(TransactionKind::Expense, "food", 200))
        .await
        .unwrap();
    ctx.ledger_service
        .add(&ann, draft(TransactionKind::Expense, "food", 50))
        .await
        .unwrap();

    let dashboard = ctx.dashboard_service.dashboard(&ann).await.unwrap();
    let summary = dashboard.summary;
    assert_eq!(summary.total_income, Decimal::new(1000, 0));
    assert_eq!(summary.total_expenses, Decimal::new(250, 0));
    assert_eq!(summary.balance, Decimal::new(750, 0));
    assert_eq!(summary.category_breakdown.len(), 1);
    assert_eq!(summary.category_breakdown.get("food"), Some(Decimal::new(250, 0)));
    assert_eq!(summary.total_income - summary.total_expenses, summary.balance);
    assert_eq!(summary.category_breakdown.total(), summary.total_expenses);
}

#[tokio::test]
async fn test_empty_dashboard() {
    let (ctx, _) = create_test_context();
    let ann = register(&ctx, "Ann", "a@x.com").await;

    let dashboard = ctx.dashboard_service.dashboard(&ann).await.unwrap();
    assert!(dashboard.recent.is_empty());
    assert_eq!(dashboard.summary.balance, Decimal::ZERO);
    assert!(dashboard.summary.category_breakdown.is_empty());
}

#[tokio::test]
async fn test_ownership_isolation() {
    let (ctx, _) = create_test_context();
    let ann = register(&ctx, "Ann", "ann@x.com").await;
    let bob = register(&ctx, "Bob", "bob@x.com").await;

    let bobs = ctx
        .ledger_service
        .add(&bob, draft(TransactionKind::Expense, "rent", 900))
        .await
        .unwrap();

    let update = ctx
        .ledger_service
        .update(&ann, bobs.id, &draft(TransactionKind::Income, "mine now", 1))
        .await
        .unwrap_err();
    assert!(matches!(update, Error::NotFound(_)));

    let delete = ctx.ledger_service.delete(&ann, bobs.id).await.unwrap_err();
    assert!(matches!(delete, Error::NotFound(_)));

    let get = ctx.ledger_service.get(&ann, bobs.id).await.unwrap_err();
    assert!(matches!(get, Error::NotFound(_)));

    // Foreign and nonexistent ids are indistinguishable
    let missing = ctx
        .ledger_service
        .update(&ann, Uuid::new_v4(), &draft(TransactionKind::Income, "x", 1))
        .await
        .unwrap_err();
    assert_eq!(missing.kind(), update.kind());

    // Bob's record is untouched
    let stored = ctx.ledger_service.get(&bob, bobs.id).await.unwrap();
    assert_eq!(stored, bobs);
    assert!(ctx.ledger_service.list(&ann, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_input_parsing_through_ledger() {
    let (ctx, clock) = create_test_context();
    let ann = register(&ctx, "Ann", "a@x.com").await;

    let bad = TransactionInput {
        kind: "expense".into(),
        category: "food".into(),
        amount: "twelve".into(),
        ..Default::default()
    };
    assert!(matches!(bad.parse(), Err(Error::InvalidInput(_))));

    let good = TransactionInput {
        kind: "expense".into(),
        category: "food".into(),
        amount: "12.34".into(),
        description: Some("lunch".into()),
        date: None,
    };
    let tx = ctx.ledger_service.add(&ann, good.parse().unwrap()).await.unwrap();
    assert_eq!(tx.amount, Decimal::new(1234, 2));
    assert_eq!(tx.date, clock.now());
}

#[tokio::test]
async fn test_amount_bounded_by_ledger_column() {
    let (ctx, _) = create_test_context();
    let ann = register(&ctx, "Ann", "a@x.com").await;

    let too_big = TransactionInput {
        kind: "income".into(),
        category: "lottery".into(),
        amount: "1000000000000000".into(),
        ..Default::default()
    };
    assert!(matches!(too_big.parse(), Err(Error::InvalidInput(_))));

    let largest = TransactionInput {
        kind: "income".into(),
        category: "lottery".into(),
        amount: "99999999999999.9999".into(),
        ..Default::default()
    };
    let tx = ctx.ledger_service.add(&ann, largest.parse().unwrap()).await.unwrap();
    assert_eq!(tx.amount, Decimal::new(999_999_999_999_999_999, 4));
}

#[tokio::test]
async fn test_public_feed_spans_owners() {
    let (ctx, clock) = create_test_context();
    let ann = register(&ctx, "Ann", "ann@x.com").await;
    let bob = register(&ctx, "Bob", "bob@x.com").await;

    ctx.ledger_service
        .add(&ann, draft(TransactionKind::Income, "salary", 10))
        .await
        .unwrap();
    clock.advance(Duration::days(1));
    ctx.ledger_service
        .add(&bob, draft(TransactionKind::Expense, "food", 3))
        .await
        .unwrap();

    let feed = ctx.dashboard_service.public_feed().await.unwrap();
    let owners: Vec<_> = feed.iter().map(|t| t.owner_name.as_deref()).collect();
    assert_eq!(owners, [Some("Bob"), Some("Ann")]);
}

// ============================================================================
// File-backed context
// ============================================================================

#[tokio::test]
async fn test_file_context_persists_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("settings.json"),
        r#"{"password": {"timeCost": 1, "memoryCost": 8, "parallelism": 1}}"#,
    )
    .unwrap();

    let (ann_id, token) = {
        let ctx = TallyContext::new(temp_dir.path(), EntryPoint::Cli).unwrap();
        let ann = register(&ctx, "Ann", "a@x.com").await;
        ctx.ledger_service
            .add(&ann, draft(TransactionKind::Income, "salary", 5))
            .await
            .unwrap();
        let token = ctx.session_service.create(ann.id).await.unwrap();
        (ann.id, token)
    };

    let ctx = TallyContext::new(temp_dir.path(), EntryPoint::Cli).unwrap();
    let ann = ctx.session_service.resolve(&token).await.unwrap().unwrap();
    assert_eq!(ann.id, ann_id);
    assert_eq!(ctx.ledger_service.list(&ann, None).await.unwrap().len(), 1);
    assert!(ctx.logger.count().unwrap() > 0);
}
