use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with an env-filter and fmt layer.
///
/// Safe to call more than once; subsequent calls are no-ops. Filter
/// defaults to `greenroom=debug` and can be overridden with `RUST_LOG`.
pub fn init_telemetry() {
    let result = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "greenroom=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Telemetry initialized");
    }
}
