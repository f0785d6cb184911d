/// Install the `tracing` subscriber that prints broker events.
///
/// `default_level` is usually `logging.level` from the loaded settings.
/// Subscriber lifecycle is logged at `info`, subscription changes and
/// fan-out at `debug`, single deliveries at `trace`. Unknown level names
/// fall back to `info`.
pub fn init(default_level: &str) {
    let lvl = match default_level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" | "warning" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };

    // a second init (tests, embedding binaries) is ignored
    let _ = tracing_subscriber::fmt()
        .with_max_level(lvl)
        .with_target(false)
        .try_init();
}
