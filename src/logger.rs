//! Centralized logging configuration for lmgraph binaries and benches
//!
//! Sets up a `tracing-subscriber` formatter with a default INFO level that
//! can be overridden through `RUST_LOG`.

use tracing::Level;

/// Initialize the tracing subscriber with lmgraph's standard configuration
///
/// Default log level: INFO (overrideable via RUST_LOG environment variable)
///
/// Format includes:
/// - Timestamp
/// - Log level
/// - Module/target path
///
/// # Example
/// ```no_run
/// use lmgraph::init_logger;
///
/// init_logger();
/// tracing::info!("Application started");
/// ```
///
/// # Environment Variables
/// ```bash
/// RUST_LOG=debug cargo run --bin bundle_adjustment -- problem.txt
/// RUST_LOG=lmgraph::optimizer=trace cargo run --bin bundle_adjustment -- problem.txt
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Initialize the tracing subscriber with a custom default level
///
/// # Arguments
/// * `default_level` - The default log level (overrideable via RUST_LOG)
///
/// Calling this more than once is harmless: later calls keep the first
/// subscriber.
pub fn init_logger_with_level(default_level: Level) {
    use tracing_subscriber::fmt::time::SystemTime;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_timer(SystemTime)
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
}
