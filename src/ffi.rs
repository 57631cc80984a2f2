//! C-compatible FFI API for editor hosts written in other languages.
//!
//! # ABI Contract
//!
//! All exported functions use `extern "C"` calling convention and `#[no_mangle]`
//! to ensure stable symbol names.
//!
//! ## Memory management
//! - Buffers returned by `pforge_*` functions are allocated on the Rust heap.
//! - Callers **must** free them with `pforge_free_buffer` / `pforge_free_string`.
//! - Passing a null pointer to a free function is a no-op.
//!
//! ## Error handling
//! - Functions that can fail return a `c_int` (0 = success, non-zero = error).
//! - Error details can be retrieved via `pforge_last_error`. For a failed
//!   export the message is the user-facing `Failed to generate <format>`
//!   followed by its cause.
//!
//! ## Thread safety
//! - `pforge_last_error` uses a thread-local, so it is safe to call from
//!   multiple threads. Raster exports use a surface private to each call.
//!
//! ## Usage from C
//! ```c
//! #include "page_forge.h"
//! uint8_t *buf; uint32_t len;
//! if (pforge_export(html, strlen(html), PFORGE_FORMAT_RTF, "modern", NULL, &buf, &len) == 0) {
//!     fwrite(buf, 1, len, out);
//!     pforge_free_buffer(buf, len);
//! }
//! ```

use std::cell::RefCell;
use std::error::Error as _;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::slice;

use crate::export::{export, structured_layout_config, ExportFormat, ExportOptions, ExportRequest};
use crate::interpolate::TemplateData;
use crate::theme::ThemeKey;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg.replace('\0', " ")).ok();
    });
}

/// Output format selector.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PforgeFormat {
    /// Text, tables and lists drawn as PDF primitives.
    StructuredPdf = 0,
    /// Rasterized pages embedded as images.
    RasterPdf = 1,
    Rtf = 2,
    /// Word-compatible HTML (`.doc`).
    Word = 3,
}

impl From<PforgeFormat> for ExportFormat {
    fn from(f: PforgeFormat) -> Self {
        match f {
            PforgeFormat::StructuredPdf => ExportFormat::StructuredPdf,
            PforgeFormat::RasterPdf => ExportFormat::RasterPdf,
            PforgeFormat::Rtf => ExportFormat::Rtf,
            PforgeFormat::Word => ExportFormat::Word,
        }
    }
}

/// Read an optional null-terminated UTF-8 string.
///
/// # Safety
/// `p`, if non-null, must point to a valid null-terminated string.
unsafe fn opt_cstr<'a>(p: *const c_char, what: &str) -> Result<Option<&'a str>, String> {
    if p.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(p)
        .to_str()
        .map(Some)
        .map_err(|e| format!("Invalid UTF-8 in {what}: {e}"))
}

/// Hand a byte buffer to the caller.
///
/// # Safety
/// `out_buf` and `out_len` must be valid pointers.
unsafe fn give_buffer(bytes: Vec<u8>, out_buf: *mut *mut u8, out_len: *mut u32) {
    let len = bytes.len() as u32;
    let buf = bytes.into_boxed_slice();
    *out_buf = Box::into_raw(buf) as *mut u8;
    *out_len = len;
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

fn run_export(request: &ExportRequest, format: PforgeFormat) -> Result<Vec<u8>, (c_int, String)> {
    export(request, format.into(), &ExportOptions::default())
        .map(|out| out.bytes)
        .map_err(|e| (3, error_chain(&e)))
}

// ---------------------------------------------------------------------------
// Core API
// ---------------------------------------------------------------------------

/// Export an editor HTML fragment.
///
/// # Parameters
/// - `html_ptr`: pointer to UTF-8 HTML bytes (not necessarily null-terminated)
/// - `html_len`: length of the HTML data in bytes
/// - `format`: output format
/// - `theme`: null-terminated theme name, or `NULL` for `default`; unknown
///   names fall back to `default`
/// - `vars_json`: null-terminated JSON object of template variables, or `NULL`
/// - `out_buf`, `out_len`: on success, receive the output buffer
///
/// # Returns
/// `0` on success, non-zero on error. On error, call `pforge_last_error`.
///
/// # Safety
/// - `html_ptr` must point to `html_len` valid bytes.
/// - `theme` and `vars_json`, if non-null, must be null-terminated strings.
/// - `out_buf` and `out_len` must be valid pointers.
/// - The caller must free `*out_buf` by calling `pforge_free_buffer`.
#[no_mangle]
pub unsafe extern "C" fn pforge_export(
    html_ptr: *const u8,
    html_len: u32,
    format: PforgeFormat,
    theme: *const c_char,
    vars_json: *const c_char,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
) -> c_int {
    if html_ptr.is_null() || out_buf.is_null() || out_len.is_null() {
        set_last_error("Null pointer argument");
        return 1;
    }

    let html_bytes = slice::from_raw_parts(html_ptr, html_len as usize);
    let html = match std::str::from_utf8(html_bytes) {
        Ok(s) => s,
        Err(e) => {
            set_last_error(&format!("Invalid UTF-8: {e}"));
            return 2;
        }
    };

    let mut request = ExportRequest::new(html);
    match opt_cstr(theme, "theme") {
        Ok(name) => request.theme = name.map(ThemeKey::from_name).unwrap_or_default(),
        Err(e) => {
            set_last_error(&e);
            return 2;
        }
    }
    match opt_cstr(vars_json, "variables") {
        Ok(Some(json)) => match serde_json::from_str::<TemplateData>(json) {
            Ok(data) => request.template_data = Some(data),
            Err(e) => {
                set_last_error(&format!("Invalid variables JSON: {e}"));
                return 2;
            }
        },
        Ok(None) => {}
        Err(e) => {
            set_last_error(&e);
            return 2;
        }
    }

    match run_export(&request, format) {
        Ok(bytes) => {
            give_buffer(bytes, out_buf, out_len);
            0
        }
        Err((code, msg)) => {
            set_last_error(&msg);
            code
        }
    }
}

/// Export a JSON request (`{"content", "theme", "meta", "templateData"}`).
///
/// # Safety
/// `request_json` must be a null-terminated string; `out_buf` and `out_len`
/// must be valid pointers. Free `*out_buf` with `pforge_free_buffer`.
#[no_mangle]
pub unsafe extern "C" fn pforge_export_request(
    request_json: *const c_char,
    format: PforgeFormat,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
) -> c_int {
    if request_json.is_null() || out_buf.is_null() || out_len.is_null() {
        set_last_error("Null pointer argument");
        return 1;
    }
    let request = match opt_cstr(request_json, "request")
        .and_then(|json| ExportRequest::from_json(json.unwrap_or_default()))
    {
        Ok(r) => r,
        Err(e) => {
            set_last_error(&format!("Invalid request: {e}"));
            return 2;
        }
    };

    match run_export(&request, format) {
        Ok(bytes) => {
            give_buffer(bytes, out_buf, out_len);
            0
        }
        Err((code, msg)) => {
            set_last_error(&msg);
            code
        }
    }
}

/// Compute the structured page layout of a JSON request without rendering.
/// Returns a JSON string (free with `pforge_free_string`).
///
/// # Safety
/// `request_json` must be a null-terminated string; `out_json_ptr` must be a
/// valid pointer.
#[no_mangle]
pub unsafe extern "C" fn pforge_layout_json(
    request_json: *const c_char,
    out_json_ptr: *mut *mut c_char,
) -> c_int {
    if request_json.is_null() || out_json_ptr.is_null() {
        set_last_error("Null pointer argument");
        return 1;
    }
    let request = match opt_cstr(request_json, "request")
        .and_then(|json| ExportRequest::from_json(json.unwrap_or_default()))
    {
        Ok(r) => r,
        Err(e) => {
            set_last_error(&format!("Invalid request: {e}"));
            return 2;
        }
    };

    let layout = match structured_layout_config(&request, &ExportOptions::default()) {
        Ok(l) => l,
        Err(e) => {
            set_last_error(&error_chain(&e));
            return 3;
        }
    };
    match CString::new(layout.to_json()) {
        Ok(cs) => {
            *out_json_ptr = cs.into_raw();
            0
        }
        Err(_) => {
            *out_json_ptr = ptr::null_mut();
            set_last_error("JSON contained null byte");
            3
        }
    }
}

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free a buffer returned by `pforge_export` or `pforge_export_request`.
///
/// # Safety
/// `buf` must have been returned by one of those calls, and `len` must be the
/// corresponding length.
#[no_mangle]
pub unsafe extern "C" fn pforge_free_buffer(buf: *mut u8, len: u32) {
    if !buf.is_null() {
        let _ = Box::from_raw(slice::from_raw_parts_mut(buf, len as usize));
    }
}

/// Free a string returned by `pforge_layout_json`.
///
/// # Safety
/// `s` must have been returned by a `pforge_*` function.
#[no_mangle]
pub unsafe extern "C" fn pforge_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

/// Last error message on this thread, or `NULL`. The pointer stays valid
/// until the next failing call on the same thread; do not free it.
#[no_mangle]
pub extern "C" fn pforge_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cs) => cs.as_ptr(),
        None => ptr::null(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_rtf_through_ffi() {
        let html = b"<p>Hello ${name}</p>";
        let vars = CString::new(r#"{"name":"World"}"#).unwrap();
        let theme = CString::new("minimal").unwrap();
        let mut buf: *mut u8 = ptr::null_mut();
        let mut len: u32 = 0;
        let rc = unsafe {
            pforge_export(
                html.as_ptr(),
                html.len() as u32,
                PforgeFormat::Rtf,
                theme.as_ptr(),
                vars.as_ptr(),
                &mut buf,
                &mut len,
            )
        };
        assert_eq!(rc, 0);
        let out = unsafe { slice::from_raw_parts(buf, len as usize) }.to_vec();
        unsafe { pforge_free_buffer(buf, len) };
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Hello World"));
        assert!(text.contains("\\fs20"));
    }

    #[test]
    fn null_arguments_set_last_error() {
        let rc = unsafe {
            pforge_export(
                ptr::null(),
                0,
                PforgeFormat::Word,
                ptr::null(),
                ptr::null(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        assert_eq!(rc, 1);
        let msg = unsafe { CStr::from_ptr(pforge_last_error()) };
        assert_eq!(msg.to_str().unwrap(), "Null pointer argument");
    }

    #[test]
    fn layout_json_round_trips() {
        let req = CString::new(r#"{"content":"<p>x</p>","theme":"modern"}"#).unwrap();
        let mut json: *mut c_char = ptr::null_mut();
        let rc = unsafe { pforge_layout_json(req.as_ptr(), &mut json) };
        assert_eq!(rc, 0);
        let text = unsafe { CStr::from_ptr(json) }.to_str().unwrap().to_string();
        unsafe { pforge_free_string(json) };
        let layout = crate::layout_config::LayoutConfig::from_json(&text).unwrap();
        assert_eq!(layout.pages.len(), 1);
    }
}
