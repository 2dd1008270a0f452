use tracing_subscriber::EnvFilter;

/// Filter directives for a given config: the configured level for everything,
/// with HTTP client internals capped at `warn` unless explicitly enabled.
pub fn log_filter(config: &crate::config::Config) -> String {
    let level = config.logs.level.trim().to_ascii_lowercase();
    let level = if level.is_empty() { "info".to_string() } else { level };
    if config.logs.enable_reqwest_logging {
        level
    } else {
        format!("{level},reqwest=warn,hyper=warn,hyper_util=warn,rustls=warn")
    }
}

pub fn init_logging(config: &crate::config::Config) {
    // RUST_LOG wins over the config file when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(config)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
