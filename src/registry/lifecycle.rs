// ============================================================================
// Test lifecycle hook
// ============================================================================
//
// Wraps one test execution. Whatever the body does (returns, returns an
// error, panics), the bundle's context is cleared on the way out and the
// body's outcome reaches the caller untouched.
//
// ============================================================================

use super::ContextBundle;
use std::future::Future;
use tracing::{Instrument, Level, event, info_span};

/// Clears the bundle's context when dropped, including during unwinding
struct ClearOnExit<'a> {
    bundle: &'a ContextBundle,
}

impl Drop for ClearOnExit<'_> {
    fn drop(&mut self) {
        if let Some(context) = self.bundle.context_ref() {
            let detached = context.clear();
            event!(
                Level::DEBUG,
                unit = %self.bundle.unit_name(),
                detached,
                panicking = std::thread::panicking(),
                "test scope closed"
            );
        }
    }
}

impl ContextBundle {
    /// Run a test body, then clear the context
    ///
    /// ```ignore
    /// let bundle = registry.instance("unitA");
    /// bundle.around(|| {
    ///     let ctx = bundle.context().unwrap();
    ///     ctx.persist(EntityKey::new("users", "1"), json!({"name": "Alice"}))
    /// })?;
    /// ```
    pub fn around<F, R>(&self, body: F) -> R
    where
        F: FnOnce() -> R,
    {
        let span = info_span!("unit_test_scope", unit = %self.unit_name());
        let _enter = span.enter();
        let _clear = ClearOnExit { bundle: self };
        body()
    }

    /// Async variant of [`ContextBundle::around`]
    ///
    /// The context is also cleared if the future is dropped before completion.
    pub async fn around_async<Fut>(&self, body: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        let span = info_span!("unit_test_scope", unit = %self.unit_name());
        let _clear = ClearOnExit { bundle: self };
        body.instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use crate::context::DefaultProvider;
    use crate::core::{EntityKey, RiderError};
    use crate::registry::Registry;
    use serde_json::json;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[test]
    fn test_around_clears_after_success() {
        let registry = Registry::new(DefaultProvider::default());
        let bundle = registry.instance("unitA");
        let context = bundle.context().unwrap();

        let value = bundle.around(|| {
            context
                .persist(EntityKey::new("users", "1"), json!({}))
                .unwrap();
            assert_eq!(context.tracked_count(), 1);
            42
        });

        assert_eq!(value, 42);
        assert_eq!(context.tracked_count(), 0);
    }

    #[test]
    fn test_around_propagates_error_after_clear() {
        let registry = Registry::new(DefaultProvider::default());
        let bundle = registry.instance("unitA");
        let context = bundle.context().unwrap();

        let result: Result<(), RiderError> = bundle.around(|| {
            context.persist(EntityKey::new("users", "1"), json!({}))?;
            Err(RiderError::ExecutionError("assertion failed".into()))
        });

        assert!(matches!(result, Err(RiderError::ExecutionError(msg)) if msg == "assertion failed"));
        assert_eq!(context.tracked_count(), 0);
    }

    #[test]
    fn test_around_propagates_panic_after_clear() {
        let registry = Registry::new(DefaultProvider::default());
        let bundle = registry.instance("unitA");
        let context = bundle.context().unwrap();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            bundle.around(|| {
                context
                    .persist(EntityKey::new("users", "1"), json!({}))
                    .unwrap();
                panic!("test body failed");
            })
        }));

        let payload = outcome.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"test body failed"));
        assert_eq!(context.tracked_count(), 0);
    }

    #[test]
    fn test_around_on_failed_bundle_runs_body() {
        let registry = Registry::new(DefaultProvider::default());
        let bundle = registry.instance("");
        assert!(!bundle.is_ready());

        assert_eq!(bundle.around(|| "ran"), "ran");
    }
}
