//! Tracing subscriber setup.

use poolvr_shared::config::Variant;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
///
/// The level is `debug` in debug mode and `info` in release mode. The classic
/// variant only logs at that level with `--verbose` and otherwise shows
/// warnings and errors; the pyserver variant always does. HTTP request
/// logging from `tower_http` stays at `warn` either way.
pub fn default_filter(verbose: bool, debug: bool, variant: Variant) -> String {
    let level = match (verbose || variant == Variant::PyServer, debug) {
        (true, true) => "debug",
        (true, false) => "info",
        (false, _) => "warn",
    };
    format!("{level},tower_http=warn")
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logging(verbose: bool, debug: bool, variant: Variant) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose, debug, variant)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .init();
}
