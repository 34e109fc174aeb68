// Public modules
pub mod config;
pub mod domains;
pub mod errors;
pub mod ffi;
pub mod globals;
pub mod types;
pub mod validation;

// Private modules
mod db_migration;

pub use config::AppConfig;

/// Set up `env_logger`, defaulting to `debug` in debug builds and `info`
/// otherwise when `RUST_LOG` is unset. Safe to call more than once.
pub fn init_logging() {
    let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init();
}

// Entry point for initialization
/// Initialize the library. This function must be called before any other
/// function in the library.
pub async fn initialize(config: AppConfig) -> ffi::FFIResult<()> {
    globals::initialize(config).await
}

/// Stop background tasks and release global state.
pub async fn shutdown() {
    globals::shutdown().await
}

/// Get the current device ID
pub fn get_device_id() -> ffi::FFIResult<String> {
    globals::get_device_id()
}
