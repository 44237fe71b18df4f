//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG`, unless the
/// application already installed one.
pub fn init_tracing() {
    install(EnvFilter::from_default_env());
}

/// Like [`init_tracing`], with explicit filter directives such as
/// `"dagflow=debug"`. Invalid directives fall back to `RUST_LOG`.
pub fn init_tracing_with(directives: &str) {
    install(EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::from_default_env()));
}

fn install(filter: EnvFilter) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
