use std::ffi::{CStr, CString};
use std::future::Future;
use std::os::raw::{c_char, c_int};

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Runtime;

use crate::ffi::error::{clear_last_error, set_last_error, ErrorCode, FFIError};

pub mod core;
pub mod error;
pub mod store;
pub mod sync;

pub use error::FFIResult;

/// Runtime shared by every FFI call and by the background tasks they start.
static RUNTIME: Lazy<Result<Runtime, String>> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("spa-pos-core")
        .build()
        .map_err(|e| e.to_string())
});

/// Run a future to completion on the shared runtime.
pub fn block_on_async<F, T>(future: F) -> FFIResult<T>
where
    F: Future<Output = FFIResult<T>>,
{
    match RUNTIME.as_ref() {
        Ok(runtime) => runtime.block_on(future),
        Err(e) => Err(FFIError::internal(format!("Failed to start async runtime: {}", e))),
    }
}

/// Error handling helper for FFI boundaries (returns error code)
pub fn handle_status_result<F>(func: F) -> c_int
where
    F: FnOnce() -> FFIResult<()>,
{
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(func))
        .unwrap_or_else(|payload| Err(FFIError::internal(panic_message(payload))));

    match outcome {
        Ok(()) => {
            clear_last_error();
            ErrorCode::Success as c_int
        }
        Err(e) => {
            log::error!(
                "FFI call failed. Code: {:?}, Message: {}, Details: {}",
                e.code,
                e.message,
                e.details.as_deref().unwrap_or("None")
            );
            set_last_error(&e);
            e.code as c_int
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        format!("Panic during FFI call: {}", s)
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        format!("Panic during FFI call: {}", s)
    } else {
        "Panicked during FFI call, but panic message is not a string".to_string()
    }
}

/// Read a required UTF-8 argument.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
pub unsafe fn c_str_arg(ptr: *const c_char, name: &str) -> FFIResult<String> {
    if ptr.is_null() {
        return Err(FFIError::null_pointer(name));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(str::to_string)
        .map_err(|_| FFIError::new(ErrorCode::InvalidUtf8, &format!("Invalid UTF-8 in {}", name)))
}

/// Parse a JSON payload argument.
///
/// # Safety
/// Same contract as [`c_str_arg`].
pub unsafe fn json_arg<T: DeserializeOwned>(ptr: *const c_char, name: &str) -> FFIResult<T> {
    let raw = c_str_arg(ptr, name)?;
    serde_json::from_str(&raw).map_err(|e| FFIError::invalid_argument(&format!("Invalid JSON in {}: {}", name, e)))
}

/// Serialize `value` into a newly allocated C string stored in `*out`.
///
/// # Safety
/// `out` must be null or valid for writes.
pub unsafe fn write_json_out<T: Serialize>(out: *mut *mut c_char, value: &T) -> FFIResult<()> {
    if out.is_null() {
        return Err(FFIError::null_pointer("result"));
    }
    let json = serde_json::to_string(value)
        .map_err(|e| FFIError::internal(format!("Failed to serialize result: {}", e)))?;
    *out = CString::new(json)?.into_raw();
    Ok(())
}
