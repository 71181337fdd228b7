use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize test logging in a thread-safe way.
/// This function ensures that logging is initialized only once across all
/// tests, even when multiple test files are running in parallel.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info,ai_relay=debug".into()),
            )
            .with_test_writer()
            .finish();

        // Another harness may already have installed a subscriber
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
