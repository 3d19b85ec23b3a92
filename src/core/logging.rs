//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// objpaging::core::logging::init();
/// log::info!("Paging started");
/// ```
pub fn init() {
    // Tests and tools may both try to install a logger; the second call is a no-op.
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).try_init();
}
