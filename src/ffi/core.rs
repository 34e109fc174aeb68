// src/ffi/core.rs
// ============================================================================
// Core FFI functions for library initialization and management
// ============================================================================

use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::time::Duration;

use serde::Deserialize;

use crate::config::AppConfig;
use crate::ffi::error::{get_last_error_message, FFIError};
use crate::ffi::{block_on_async, handle_status_result, json_arg};

/// Settings the host app may pass to `initialize_library`. Every field is
/// optional and overrides the value read from the environment.
#[derive(Debug, Default, Deserialize)]
struct InitOptions {
    db_url: Option<String>,
    device_id: Option<String>,
    remote_url: Option<String>,
    remote_api_key: Option<String>,
    auto_sync_secs: Option<u64>,
    cache_capacity: Option<usize>,
    cache_ttl_secs: Option<u64>,
}

impl InitOptions {
    fn apply(self, mut config: AppConfig) -> Result<AppConfig, FFIError> {
        if let Some(db_url) = self.db_url {
            if !db_url.starts_with("sqlite:") {
                return Err(FFIError::invalid_argument(
                    "db_url must be a SQLite URL starting with 'sqlite:', not a file path",
                ));
            }
            config.db_url = Some(db_url);
        }
        if self.device_id.is_some() {
            config.device_id = self.device_id;
        }
        if let Some(url) = self.remote_url {
            config.remote.base_url = url;
        }
        if let Some(key) = self.remote_api_key {
            config.remote.api_key = key;
        }
        if let Some(secs) = self.auto_sync_secs {
            config.sync.auto_sync_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(capacity) = self.cache_capacity {
            config.store.cache_capacity = capacity;
        }
        if let Some(secs) = self.cache_ttl_secs {
            config.store.cache_ttl = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Initialize the library. `options_json` may be null to use the environment
/// alone. Returns 0 on success, non-zero on error.
///
/// # Safety
/// `options_json` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn initialize_library(options_json: *const c_char) -> c_int {
    handle_status_result(|| {
        crate::init_logging();

        let options: InitOptions = if options_json.is_null() {
            InitOptions::default()
        } else {
            json_arg(options_json, "options_json")?
        };
        let config = options.apply(AppConfig::from_env())?;

        block_on_async(async move { crate::initialize(config).await })
    })
}

/// Stop background work and release all global state.
#[no_mangle]
pub extern "C" fn shutdown_library() -> c_int {
    handle_status_result(|| {
        block_on_async(async {
            crate::shutdown().await;
            Ok(())
        })
    })
}

/// Get the current device ID
/// Returns allocated string that must be freed with free_string()
///
/// # Safety
/// `result` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn get_device_id(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| {
        if result.is_null() {
            return Err(FFIError::null_pointer("result"));
        }
        let device_id = crate::get_device_id()?;
        *result = CString::new(device_id)?.into_raw();
        Ok(())
    })
}

/// JSON of the last error raised on this thread, or null.
/// Returns allocated string that must be freed with free_string()
#[no_mangle]
pub extern "C" fn get_last_error() -> *mut c_char {
    get_last_error_message()
}

/// Frees a C string that was allocated by Rust and passed over FFI.
///
/// # Safety
/// `ptr` must be null or a pointer returned by this library.
#[no_mangle]
pub unsafe extern "C" fn free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}

/// Get library version
/// Returns allocated string that must be freed with free_string()
#[no_mangle]
pub extern "C" fn get_library_version() -> *mut c_char {
    CString::new(env!("CARGO_PKG_VERSION")).map_or(std::ptr::null_mut(), |c| c.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_override_environment_values() {
        let options: InitOptions = serde_json::from_str(
            r#"{"db_url":"sqlite::memory:","device_id":"ipad-1","auto_sync_secs":0,"cache_capacity":10}"#,
        )
        .unwrap();
        let base = AppConfig {
            device_id: Some("env-device".into()),
            ..AppConfig::default()
        };
        let config = options.apply(base).unwrap();
        assert_eq!(config.db_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.device_id.as_deref(), Some("ipad-1"));
        assert!(config.sync.auto_sync_interval.is_none());
        assert_eq!(config.store.cache_capacity, 10);
    }

    #[test]
    fn test_plain_file_path_is_rejected() {
        let options = InitOptions {
            db_url: Some("/var/mobile/pos.db".into()),
            ..InitOptions::default()
        };
        assert!(options.apply(AppConfig::default()).is_err());
    }
}
