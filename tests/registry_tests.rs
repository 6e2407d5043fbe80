/// Registry tests
///
/// Bundle creation, reset semantics and degraded construction
/// Run with: cargo test --test registry_tests

use memorider::{
    BundleState, ConfiguredProvider, ConnectionStrategy, ContextFactory, ContextFlavor, DefaultProvider,
    EntityKey, FailureSink, InitStage, InitStatus, Registry, RiderError, UnitConfig, UnitsConfig,
};
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingSink {
    failures: Mutex<Vec<(String, InitStage, String)>>,
}

impl RecordingSink {
    fn failures(&self) -> Vec<(String, InitStage, String)> {
        self.failures.lock().unwrap().clone()
    }
}

impl FailureSink for RecordingSink {
    fn construction_failed(&self, unit_name: &str, stage: InitStage, error: &RiderError) {
        self.failures
            .lock()
            .unwrap()
            .push((unit_name.to_string(), stage, error.to_string()));
    }
}

fn units() -> UnitsConfig {
    UnitsConfig::new(vec![
        UnitConfig::new("unitA"),
        UnitConfig::new("unitB").flavor(ContextFlavor::Session),
    ])
    .unwrap()
}

#[test]
fn test_sequential_instance_returns_same_context() {
    let registry = Registry::new(ConfiguredProvider::new(units()));

    let first = registry.instance("unitA");
    let first_context = first.context().unwrap();
    let first_factory = first.factory().unwrap();

    let second = registry.instance("unitA");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first_context, &second.context().unwrap()));
    assert_eq!(first_factory.id(), second.factory().unwrap().id());

    // Nothing was cached, so the second reset evicted nothing
    assert_eq!(first_factory.cache().stats().evictions, 0);
}

#[test]
fn test_repeated_instance_keeps_tracked_count_at_zero() {
    let registry = Registry::new(DefaultProvider::default());

    for _ in 0..5 {
        let bundle = registry.instance("unitA");
        assert_eq!(bundle.context().unwrap().tracked_count(), 0);
    }
}

#[test]
fn test_instance_resets_tracked_entities_and_cache() {
    let registry = Registry::new(DefaultProvider::default());
    let bundle = registry.instance("unitA");
    let context = bundle.context().unwrap();
    let factory = bundle.factory().unwrap();

    let key = EntityKey::new("users", "1");
    context.persist(key.clone(), json!({"name": "Alice"})).unwrap();
    context.clear();
    context.find(&key).unwrap();
    assert_eq!(context.tracked_count(), 1);
    assert_eq!(factory.cache().len(), 1);

    registry.instance("unitA");

    assert_eq!(context.tracked_count(), 0);
    assert!(factory.cache().is_empty());
    // Reset only touches in-memory state
    assert_eq!(context.find(&key).unwrap(), Some(json!({"name": "Alice"})));
}

#[test]
fn test_connection_handle_is_stable() {
    let registry = Registry::new(ConfiguredProvider::new(units()));

    for unit in ["unitA", "unitB"] {
        let first = registry.instance(unit).connection().unwrap();
        let second = registry.instance(unit).connection().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.id(), second.id());
    }
}

#[test]
fn test_strategy_follows_context_flavor() {
    let registry = Registry::new(ConfiguredProvider::new(units()));

    let generic = registry.instance("unitA");
    assert_eq!(generic.strategy(), Some(ConnectionStrategy::TransactionalUnwrap));
    assert!(!generic.transaction_controller().unwrap().is_active());

    let session = registry.instance("unitB");
    assert_eq!(session.strategy(), Some(ConnectionStrategy::DirectUnwrap));
    assert!(!session.transaction_controller().unwrap().is_active());
}

#[test]
fn test_transactional_unwrap_leaves_no_data() {
    let registry = Registry::new(DefaultProvider::default());
    let bundle = registry.instance("unitA");
    let connection = bundle.connection().unwrap();

    assert!(!connection.is_in_transaction());
    assert!(connection.table_names().unwrap().is_empty());
}

#[test]
fn test_factory_failure_degrades_and_logs_once() {
    let sink = Arc::new(RecordingSink::default());
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    let registry = Registry::new(move |_: &str| -> memorider::Result<ContextFactory> {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(RiderError::Config("driver missing".into()))
    })
    .with_sink(Arc::clone(&sink));

    let bundle = registry.instance("broken");
    assert!(bundle.factory().is_none());
    assert!(bundle.context().is_none());
    assert!(bundle.transaction_controller().is_none());
    assert!(bundle.connection().is_none());
    assert!(matches!(
        bundle.status(),
        Some(InitStatus::Failed { stage: InitStage::Factory, message, .. }) if message.contains("driver missing")
    ));

    let failures = sink.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "broken");
    assert_eq!(failures[0].1, InitStage::Factory);

    // No retry on later calls
    let again = registry.instance("broken");
    assert!(Arc::ptr_eq(&bundle, &again));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(sink.failures().len(), 1);
}

#[test]
fn test_provider_panic_propagates_and_next_call_retries() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    let registry = Registry::new(move |unit_name: &str| -> memorider::Result<ContextFactory> {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("provider crashed");
        }
        ContextFactory::new(UnitConfig::new(unit_name))
    });

    let result = std::panic::catch_unwind(AssertUnwindSafe(|| registry.instance("unitA")));
    assert!(result.is_err());

    let bundle = registry.get("unitA").unwrap();
    assert_eq!(bundle.state(), BundleState::Uninitialized);
    assert!(bundle.status().is_none());

    let retried = registry.instance("unitA");
    assert!(Arc::ptr_eq(&bundle, &retried));
    assert_eq!(retried.state(), BundleState::Ready);
    assert!(retried.is_ready());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unknown_unit_is_degraded() {
    let registry = Registry::new(ConfiguredProvider::new(units()));
    let bundle = registry.instance("unitZ");

    assert!(!bundle.is_ready());
    assert!(matches!(
        bundle.ensure_ready(),
        Err(RiderError::UnitUnavailable { ref unit, .. }) if unit == "unitZ"
    ));
}

#[test]
fn test_blank_unit_name_is_degraded() {
    let sink = Arc::new(RecordingSink::default());
    let registry = Registry::new(DefaultProvider::default()).with_sink(Arc::clone(&sink));

    let bundle = registry.instance("");
    assert!(!bundle.is_ready());
    assert_eq!(sink.failures().len(), 1);
}

#[test]
fn test_failed_unit_does_not_affect_others() {
    let registry = Registry::new(ConfiguredProvider::new(units()));

    assert!(!registry.instance("missing").is_ready());
    assert!(registry.instance("unitA").is_ready());
    assert_eq!(registry.unit_names(), vec!["missing", "unitA"]);
}

#[test]
fn test_units_have_independent_stores() {
    let registry = Registry::new(ConfiguredProvider::new(units()));

    let a = registry.instance("unitA").connection().unwrap();
    let b = registry.instance("unitB").connection().unwrap();

    a.insert("users", "1", json!({"unit": "A"})).unwrap();
    assert_eq!(a.count("users").unwrap(), 1);
    assert_eq!(b.count("users").unwrap(), 0);
}

#[tokio::test]
async fn test_instance_async() {
    let registry = Arc::new(Registry::new(DefaultProvider::default()));

    let bundle = registry.instance_async("unitA").await.unwrap();
    assert!(bundle.is_ready());
    assert!(Arc::ptr_eq(&bundle, &registry.instance("unitA")));
}
