use tracing_subscriber::EnvFilter;

/// Install the log subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` (e.g. "debug") is used, and
/// failing that, warnings only.
pub fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init()
        .ok();
}
