//! Tracing subscriber setup for hosts and test binaries.

/// Install a fmt subscriber honoring `RUST_LOG`, defaulting to `croupier=info`.
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "croupier=info".into()),
        )
        .try_init();
}
