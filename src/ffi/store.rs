// src/ffi/store.rs
// ============================================================================
// Record Store FFI functions. Every call takes one JSON payload naming the
// table and writes its JSON result to `result` (free with free_string()).
// ============================================================================

use std::os::raw::{c_char, c_int};

use serde::Deserialize;

use crate::ffi::error::{FFIError, FFIResult};
use crate::ffi::{block_on_async, handle_status_result, json_arg, write_json_out};
use crate::globals;
use crate::types::{Filters, Record, TableName};

#[derive(Debug, Deserialize)]
struct TableRequest {
    table: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    data: Option<Record>,
    #[serde(default)]
    filters: Filters,
}

impl TableRequest {
    fn table(&self) -> FFIResult<TableName> {
        Ok(self.table.parse::<TableName>()?)
    }

    fn id(&self) -> FFIResult<&str> {
        self.id
            .as_deref()
            .ok_or_else(|| FFIError::invalid_argument("Missing 'id' in payload"))
    }

    fn take_data(&mut self) -> FFIResult<Record> {
        self.data
            .take()
            .ok_or_else(|| FFIError::invalid_argument("Missing 'data' object in payload"))
    }
}

/// `{"table", "id"}` -> the record, or `null` when absent.
///
/// # Safety
/// `payload_json` must be a valid NUL-terminated string and `result` valid for writes.
#[no_mangle]
pub unsafe extern "C" fn store_get(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| {
        let request: TableRequest = json_arg(payload_json, "payload_json")?;
        let table = request.table()?;
        let id = request.id()?.to_string();

        let record = block_on_async(async move {
            let store = globals::get_store()?;
            Ok(store.get(table, &id).await)
        })?;
        write_json_out(result, &record)
    })
}

/// `{"table", "filters"?}` -> array of matching records.
///
/// # Safety
/// `payload_json` must be a valid NUL-terminated string and `result` valid for writes.
#[no_mangle]
pub unsafe extern "C" fn store_list(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| {
        let request: TableRequest = json_arg(payload_json, "payload_json")?;
        let table = request.table()?;

        let records = block_on_async(async move {
            let store = globals::get_store()?;
            Ok(store.list(table, &request.filters).await)
        })?;
        write_json_out(result, &records)
    })
}

/// `{"table", "data"}` -> the created record.
///
/// # Safety
/// `payload_json` must be a valid NUL-terminated string and `result` valid for writes.
#[no_mangle]
pub unsafe extern "C" fn store_create(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| {
        let mut request: TableRequest = json_arg(payload_json, "payload_json")?;
        let table = request.table()?;
        let data = request.take_data()?;

        let record = block_on_async(async move {
            let store = globals::get_store()?;
            Ok(store.create(table, data).await?)
        })?;
        write_json_out(result, &record)
    })
}

/// `{"table", "id", "data"}` -> the updated record.
///
/// # Safety
/// `payload_json` must be a valid NUL-terminated string and `result` valid for writes.
#[no_mangle]
pub unsafe extern "C" fn store_update(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| {
        let mut request: TableRequest = json_arg(payload_json, "payload_json")?;
        let table = request.table()?;
        let id = request.id()?.to_string();
        let data = request.take_data()?;

        let record = block_on_async(async move {
            let store = globals::get_store()?;
            Ok(store.update(table, &id, data).await?)
        })?;
        write_json_out(result, &record)
    })
}

/// `{"table", "id"}` -> `{"success": true}`.
///
/// # Safety
/// `payload_json` must be a valid NUL-terminated string and `result` valid for writes.
#[no_mangle]
pub unsafe extern "C" fn store_delete(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| {
        let request: TableRequest = json_arg(payload_json, "payload_json")?;
        let table = request.table()?;
        let id = request.id()?.to_string();

        let outcome = block_on_async(async move {
            let store = globals::get_store()?;
            Ok(store.delete(table, &id).await?)
        })?;
        write_json_out(result, &outcome)
    })
}

/// Per-table record counts, pending changes and cache size.
///
/// # Safety
/// `result` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn store_stats(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| {
        let stats = block_on_async(async {
            let store = globals::get_store()?;
            Ok(store.stats().await)
        })?;
        write_json_out(result, &stats)
    })
}
