/// Installs the process-global tracing subscriber a build driver should set
/// up before running steps.
///
/// `RUST_LOG` overrides the default `info` filter, so `RUST_LOG=mason.rulekey=debug`
/// exposes per-rule key computations without rebuilding. Calling this more
/// than once leaves the first subscriber in place.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
