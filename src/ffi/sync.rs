// src/ffi/sync.rs
// ============================================================================
// Sync Engine FFI functions. Run results are written to `result` as JSON
// (free with free_string()).
// ============================================================================

use std::future::Future;
use std::os::raw::{c_char, c_int};
use std::sync::Arc;

use serde::Deserialize;

use crate::domains::sync::service::{SyncEngine, SyncService};
use crate::domains::sync::types::SyncOutcome;
use crate::errors::SyncResult;
use crate::ffi::error::FFIResult;
use crate::ffi::{block_on_async, handle_status_result, json_arg, write_json_out};
use crate::globals;

/// Run one sync operation on the global engine and write its outcome.
unsafe fn run_sync<F, Fut>(result: *mut *mut c_char, op: F) -> FFIResult<()>
where
    F: FnOnce(Arc<SyncEngine>) -> Fut,
    Fut: Future<Output = SyncResult<SyncOutcome>>,
{
    let outcome = block_on_async(async move {
        let engine = globals::get_sync_engine()?;
        Ok(op(engine).await?)
    })?;
    write_json_out(result, &outcome)
}

/// Upload all local tables.
///
/// # Safety
/// `result` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn sync_push(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| run_sync(result, |engine| async move { engine.push_local_changes().await }))
}

/// Merge all remote tables into the local store.
///
/// # Safety
/// `result` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn sync_pull(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| run_sync(result, |engine| async move { engine.pull_remote_changes().await }))
}

/// Push then pull.
///
/// # Safety
/// `result` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn sync_bidirectional(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| run_sync(result, |engine| async move { engine.sync_bidirectional().await }))
}

/// Clear local data and rebuild it from the remote store.
///
/// # Safety
/// `result` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn sync_reset_and_resync(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| run_sync(result, |engine| async move { engine.reset_and_resync().await }))
}

/// Current phase, pending change count and last outcome.
///
/// # Safety
/// `result` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn sync_status(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| {
        let status = block_on_async(async {
            let engine = globals::get_sync_engine()?;
            Ok(engine.status().await)
        })?;
        write_json_out(result, &status)
    })
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    access_token: Option<String>,
}

/// `{"access_token": "..."}` signs the remote client in, `{"access_token": null}`
/// signs it out.
///
/// # Safety
/// `payload_json` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn set_remote_session(payload_json: *const c_char) -> c_int {
    handle_status_result(|| {
        let payload: SessionPayload = json_arg(payload_json, "payload_json")?;
        let remote = globals::get_remote()?;
        match payload.access_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                remote.set_session(&token);
                log::info!("Remote session set");
            }
            None => {
                remote.clear_session();
                log::info!("Remote session cleared");
            }
        }
        Ok(())
    })
}
