//! Conformance suite shared by every storage backend.
//!
//! A backend test file implements [`StoreFactory`] and expands [`conformance_tests!`], which
//! generates one `#[tokio::test]` per suite function below. Each case gets a fresh store from
//! the factory, runs `before_each`, exercises the store and finally runs `after_each`.
//!
//! Expiry-sensitive cases scale their delays by the harness baseline (200 ms unless
//! `KAGI_TEST_BASELINE_MS` says otherwise).
#![allow(dead_code)]
#![allow(async_fn_in_trait)]

use std::time::Duration as StdDuration;

use chrono::Duration;
use kagi::{Authentication, Error, Kagi, NewToken, RepositoryProvider, ValidationError};

pub const BASELINE_ENV: &str = "KAGI_TEST_BASELINE_MS";
pub const DEFAULT_BASELINE: StdDuration = StdDuration::from_millis(200);

/// Supplies a fresh, empty store for every test case.
pub trait StoreFactory {
    type Provider: RepositoryProvider;

    async fn create(&self) -> Kagi<Self::Provider>;

    async fn before_each(&self, _store: &Kagi<Self::Provider>) {}

    async fn after_each(&self, _store: &Kagi<Self::Provider>) {}
}

pub struct Harness<F: StoreFactory> {
    factory: F,
    baseline: StdDuration,
}

impl<F: StoreFactory> Harness<F> {
    pub fn new(factory: F) -> Self {
        let baseline = std::env::var(BASELINE_ENV)
            .ok()
            .and_then(|ms| ms.parse::<u64>().ok())
            .map(StdDuration::from_millis)
            .unwrap_or(DEFAULT_BASELINE);

        Self { factory, baseline }
    }

    pub fn with_baseline(mut self, baseline: StdDuration) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn baseline(&self) -> StdDuration {
        self.baseline
    }

    /// The baseline as a token ttl
    pub fn ttl(&self) -> Duration {
        Duration::from_std(self.baseline).unwrap()
    }

    pub async fn setup(&self) -> Kagi<F::Provider> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let store = self.factory.create().await;
        self.factory.before_each(&store).await;
        store
    }

    pub async fn teardown(&self, store: &Kagi<F::Provider>) {
        self.factory.after_each(store).await;
    }
}

/// Generate one test per conformance case for the given factory expression.
macro_rules! conformance_tests {
    ($factory:expr) => {
        conformance_tests!(@cases $factory;
            stores_and_authenticates_with_referrer,
            absent_referrer_authenticates_as_empty,
            empty_referrer_is_kept,
            repeated_authentication_stays_valid,
            replacement_invalidates_previous_token,
            uids_are_isolated,
            unknown_uid_is_invalid,
            token_expires_after_ttl,
            non_positive_ttl_is_already_expired,
            length_counts_distinct_uids,
            clear_on_empty_store_succeeds,
            invalidate_unknown_uid_succeeds,
            invalidate_known_uid,
            missing_arguments_are_validation_errors,
            rejected_store_writes_nothing,
            builder_token_is_stored,
            cleanup_does_not_change_authentication,
            concurrent_updates_keep_one_record,
        );
    };
    (@cases $factory:expr; $($case:ident),* $(,)?) => {
        $(
            #[tokio::test]
            async fn $case() {
                let harness = crate::common::Harness::new($factory);
                crate::common::$case(&harness).await;
            }
        )*
    };
}

fn assert_validation_error(result: Result<impl std::fmt::Debug, Error>, field: &str) {
    match result {
        Err(Error::Validation(ValidationError::MissingField(missing))) => {
            assert_eq!(missing, field)
        }
        other => panic!("expected missing {field}, got {other:?}"),
    }
}

pub async fn stores_and_authenticates_with_referrer<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    store
        .store_or_update("t0k3n", "alice@example.com", Duration::minutes(5), Some("/inbox?page=2"))
        .await
        .unwrap();

    let auth = store.authenticate("t0k3n", "alice@example.com").await.unwrap();
    assert_eq!(
        auth,
        Authentication::Valid {
            referrer: "/inbox?page=2".to_string()
        }
    );

    harness.teardown(&store).await;
}

pub async fn absent_referrer_authenticates_as_empty<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    store
        .store_or_update("t0k3n", "alice", Duration::minutes(5), None)
        .await
        .unwrap();

    let auth = store.authenticate("t0k3n", "alice").await.unwrap();
    assert_eq!(auth.referrer(), Some(""));

    harness.teardown(&store).await;
}

pub async fn empty_referrer_is_kept<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    store
        .store_or_update("t0k3n", "alice", Duration::minutes(5), Some(""))
        .await
        .unwrap();

    let auth = store.authenticate("t0k3n", "alice").await.unwrap();
    assert_eq!(auth.into_referrer(), Some(String::new()));

    let record = store.find_record("alice").await.unwrap().unwrap();
    assert_eq!(record.referrer.as_deref(), Some(""));

    harness.teardown(&store).await;
}

pub async fn repeated_authentication_stays_valid<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    store
        .store_or_update("t0k3n", "alice", Duration::minutes(5), Some("/home"))
        .await
        .unwrap();

    for _ in 0..3 {
        let auth = store.authenticate("t0k3n", "alice").await.unwrap();
        assert_eq!(auth.referrer(), Some("/home"));
    }

    harness.teardown(&store).await;
}

pub async fn replacement_invalidates_previous_token<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    store
        .store_or_update("first", "alice", Duration::minutes(5), Some("/old"))
        .await
        .unwrap();
    store
        .store_or_update("second", "alice", Duration::minutes(5), Some("/new"))
        .await
        .unwrap();

    assert_eq!(
        store.authenticate("first", "alice").await.unwrap(),
        Authentication::Invalid
    );
    assert_eq!(
        store.authenticate("second", "alice").await.unwrap().referrer(),
        Some("/new")
    );
    assert_eq!(store.length().await.unwrap(), 1);

    // Replacing with the same token and no referrer drops the old referrer too
    store
        .store_or_update("second", "alice", Duration::minutes(5), None)
        .await
        .unwrap();
    assert_eq!(
        store.authenticate("second", "alice").await.unwrap().referrer(),
        Some("")
    );

    harness.teardown(&store).await;
}

pub async fn uids_are_isolated<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    store
        .store_or_update("alice-token", "alice", Duration::minutes(5), Some("/a"))
        .await
        .unwrap();
    store
        .store_or_update("bob-token", "bob", Duration::minutes(5), Some("/b"))
        .await
        .unwrap();

    assert!(!store.authenticate("alice-token", "bob").await.unwrap().is_valid());
    assert!(!store.authenticate("bob-token", "alice").await.unwrap().is_valid());
    assert_eq!(
        store.authenticate("alice-token", "alice").await.unwrap().referrer(),
        Some("/a")
    );
    assert_eq!(
        store.authenticate("bob-token", "bob").await.unwrap().referrer(),
        Some("/b")
    );

    // uids are compared exactly
    assert!(!store.authenticate("alice-token", "Alice").await.unwrap().is_valid());

    store.invalidate_user("alice").await.unwrap();
    assert!(store.authenticate("bob-token", "bob").await.unwrap().is_valid());

    harness.teardown(&store).await;
}

pub async fn unknown_uid_is_invalid<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    assert_eq!(
        store.authenticate("anything", "nobody").await.unwrap(),
        Authentication::Invalid
    );

    harness.teardown(&store).await;
}

pub async fn token_expires_after_ttl<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    store
        .store_or_update("t0k3n", "alice", harness.ttl() * 2, Some("/r"))
        .await
        .unwrap();

    tokio::time::sleep(harness.baseline() / 2).await;
    assert_eq!(
        store.authenticate("t0k3n", "alice").await.unwrap().referrer(),
        Some("/r")
    );

    tokio::time::sleep(harness.baseline() * 2).await;
    assert_eq!(
        store.authenticate("t0k3n", "alice").await.unwrap(),
        Authentication::Invalid
    );

    harness.teardown(&store).await;
}

pub async fn non_positive_ttl_is_already_expired<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    store
        .store_or_update("zero", "alice", Duration::zero(), None)
        .await
        .unwrap();
    store
        .store_or_update("negative", "bob", Duration::milliseconds(-1000), None)
        .await
        .unwrap();

    assert!(!store.authenticate("zero", "alice").await.unwrap().is_valid());
    assert!(!store.authenticate("negative", "bob").await.unwrap().is_valid());
    // Expired records are still held until invalidated, cleared or collected
    assert_eq!(store.length().await.unwrap(), 2);

    harness.teardown(&store).await;
}

pub async fn length_counts_distinct_uids<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    assert_eq!(store.length().await.unwrap(), 0);

    store
        .store_or_update("t1", "alice", Duration::minutes(5), None)
        .await
        .unwrap();
    store
        .store_or_update("t2", "alice", Duration::minutes(5), None)
        .await
        .unwrap();
    assert_eq!(store.length().await.unwrap(), 1);

    store
        .store_or_update("t3", "bob", Duration::minutes(5), None)
        .await
        .unwrap();
    assert_eq!(store.length().await.unwrap(), 2);

    store.clear().await.unwrap();
    assert_eq!(store.length().await.unwrap(), 0);
    assert!(!store.authenticate("t2", "alice").await.unwrap().is_valid());
    assert!(!store.authenticate("t3", "bob").await.unwrap().is_valid());

    harness.teardown(&store).await;
}

pub async fn clear_on_empty_store_succeeds<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    store.clear().await.unwrap();
    store.clear().await.unwrap();
    assert_eq!(store.length().await.unwrap(), 0);

    harness.teardown(&store).await;
}

pub async fn invalidate_unknown_uid_succeeds<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    store.invalidate_user("nobody").await.unwrap();
    assert_eq!(store.length().await.unwrap(), 0);

    harness.teardown(&store).await;
}

pub async fn invalidate_known_uid<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    store
        .store_or_update("t0k3n", "alice", Duration::minutes(5), None)
        .await
        .unwrap();
    store.invalidate_user("alice").await.unwrap();

    assert_eq!(
        store.authenticate("t0k3n", "alice").await.unwrap(),
        Authentication::Invalid
    );
    assert_eq!(store.length().await.unwrap(), 0);

    // A new token can be issued after invalidation
    store
        .store_or_update("fresh", "alice", Duration::minutes(5), None)
        .await
        .unwrap();
    assert!(store.authenticate("fresh", "alice").await.unwrap().is_valid());

    harness.teardown(&store).await;
}

pub async fn missing_arguments_are_validation_errors<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    assert_validation_error(
        store
            .store_or_update("", "alice", Duration::minutes(5), None)
            .await,
        "token",
    );
    assert_validation_error(
        store
            .store_or_update("t0k3n", "", Duration::minutes(5), None)
            .await,
        "uid",
    );
    assert_validation_error(store.authenticate("", "alice").await, "token");
    assert_validation_error(store.authenticate("t0k3n", "").await, "uid");
    assert_validation_error(store.invalidate_user("").await, "uid");

    let missing_ttl = NewToken::builder().token("t0k3n").uid("alice").build();
    assert_eq!(
        missing_ttl.unwrap_err(),
        ValidationError::MissingField("ttl".to_string())
    );

    harness.teardown(&store).await;
}

pub async fn rejected_store_writes_nothing<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    store
        .store_or_update("kept", "alice", Duration::minutes(5), None)
        .await
        .unwrap();

    let result = store
        .store_or_update("", "alice", Duration::minutes(5), Some("/x"))
        .await;
    assert!(result.unwrap_err().is_validation_error());

    assert_eq!(store.length().await.unwrap(), 1);
    assert_eq!(
        store.authenticate("kept", "alice").await.unwrap().referrer(),
        Some("")
    );

    harness.teardown(&store).await;
}

pub async fn builder_token_is_stored<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    let new_token = NewToken::builder()
        .token("built")
        .uid("alice")
        .ttl_millis(60_000)
        .referrer("/from-builder")
        .build()
        .unwrap();
    store.store(new_token).await.unwrap();

    assert_eq!(
        store.authenticate("built", "alice").await.unwrap().referrer(),
        Some("/from-builder")
    );

    let record = store.find_record("alice").await.unwrap().unwrap();
    assert_ne!(record.token_hash, "built");

    harness.teardown(&store).await;
}

pub async fn cleanup_does_not_change_authentication<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    store
        .store_or_update("old", "expired", Duration::milliseconds(-1), None)
        .await
        .unwrap();
    store
        .store_or_update("new", "live", Duration::minutes(5), Some("/live"))
        .await
        .unwrap();

    assert!(!store.authenticate("old", "expired").await.unwrap().is_valid());

    assert_eq!(store.cleanup_expired_tokens().await.unwrap(), 1);
    assert_eq!(store.length().await.unwrap(), 1);

    assert!(!store.authenticate("old", "expired").await.unwrap().is_valid());
    assert_eq!(
        store.authenticate("new", "live").await.unwrap().referrer(),
        Some("/live")
    );

    harness.teardown(&store).await;
}

pub async fn concurrent_updates_keep_one_record<F: StoreFactory>(harness: &Harness<F>) {
    let store = harness.setup().await;

    let tokens: Vec<String> = (0..16).map(|i| format!("token-{i}")).collect();
    let handles: Vec<_> = tokens
        .iter()
        .cloned()
        .map(|token| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .store_or_update(&token, "alice", Duration::minutes(5), Some(token.as_str()))
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.length().await.unwrap(), 1);

    // Exactly one writer won, and its referrer came with it
    let mut winners = Vec::new();
    for token in &tokens {
        if let Authentication::Valid { referrer } = store.authenticate(token, "alice").await.unwrap()
        {
            assert_eq!(&referrer, token);
            winners.push(token.clone());
        }
    }
    assert_eq!(winners.len(), 1);

    harness.teardown(&store).await;
}
