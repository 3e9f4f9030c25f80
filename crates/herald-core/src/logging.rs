//! `tracing` subscriber setup.
//!
//! Call one of the `init_*` functions once at startup. `RUST_LOG` takes
//! precedence over the level passed in. Subsequent calls are no-ops.

use tracing_subscriber::EnvFilter;

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install a compact, human-readable subscriber writing to stderr.
pub fn init_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}

/// Install a JSON-lines subscriber writing to stderr, for log shipping.
pub fn init_subscriber_json(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .flatten_event(true);

    let _ = subscriber.try_init();
}

/// Install the subscriber selected by `json`.
pub fn init(level: &str, json: bool) {
    if json {
        init_subscriber_json(level);
    } else {
        init_subscriber(level);
    }
}

/// Run `f` with a temporary stderr subscriber as the thread's default.
///
/// For work that logs before settings select the real subscriber, such as
/// loading the settings themselves.
pub fn with_bootstrap<R>(level: &str, f: impl FnOnce() -> R) -> R {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::with_default(subscriber, f)
}
