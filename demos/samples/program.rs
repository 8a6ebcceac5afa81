// Test.Program.Main(args) prints a greeting and returns nothing.
use std::ffi::{CStr, CString, c_char};

const MANIFEST: &CStr = c"{\"types\":[{\"name\":\"Test.Program\",\"members\":[{\"name\":\"Main\",\"kind\":\"method\",\"arity\":1,\"is_static\":true}]}]}";

#[unsafe(no_mangle)]
pub extern "C" fn dyncode_manifest() -> *const c_char {
    MANIFEST.as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn dyncode_invoke(request: *const c_char) -> *mut c_char {
    let request = unsafe { CStr::from_ptr(request) }.to_string_lossy();

    let response = if request.contains("\"member\":\"Main\"") {
        println!("Hello from Test.Program");
        "{\"ok\":null}"
    } else {
        "{\"mismatch\":\"unknown member\"}"
    };

    match CString::new(response) {
        Ok(response) => response.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn dyncode_free(response: *mut c_char) {
    if !response.is_null() {
        drop(unsafe { CString::from_raw(response) });
    }
}
