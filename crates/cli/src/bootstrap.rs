use doh_proxy_domain::Config;
use tracing_subscriber::EnvFilter;

/// Maps the configured level onto a tracing filter; `fatal` and `panic`
/// coalesce into `error`.
pub fn init_logging(config: &Config) {
    let level = match config.logging.level.as_str() {
        "fatal" | "panic" => "error",
        other => other,
    };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
