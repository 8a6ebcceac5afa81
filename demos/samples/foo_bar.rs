// Foo has an instance property MyProperty, Bar a static property MyFoo
// returning a Foo whose MyProperty is 42.
use std::ffi::{CStr, CString, c_char};

const MANIFEST: &CStr = c"{\"types\":[{\"name\":\"Foo\",\"members\":[{\"name\":\"MyProperty\",\"kind\":\"property\",\"is_static\":false}]},{\"name\":\"Bar\",\"members\":[{\"name\":\"MyFoo\",\"kind\":\"property\",\"is_static\":true}]}]}";

const MY_FOO: &str = "{\"kind\":\"object\",\"value\":{\"type_name\":\"Foo\",\"fields\":{\"MyProperty\":{\"kind\":\"int\",\"value\":42}}}}";

#[unsafe(no_mangle)]
pub extern "C" fn dyncode_manifest() -> *const c_char {
    MANIFEST.as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn dyncode_invoke(request: *const c_char) -> *mut c_char {
    let request = unsafe { CStr::from_ptr(request) }.to_string_lossy();

    let response = if request.contains("\"type_name\":\"Bar\",\"member\":\"MyFoo\"") {
        format!("{{\"ok\":{}}}", MY_FOO)
    } else if request.contains("\"type_name\":\"Foo\",\"member\":\"MyProperty\"") {
        match field(&request, "MyProperty") {
            Some(value) => format!("{{\"ok\":{}}}", value),
            None => "{\"fault\":\"target has no MyProperty\"}".to_string(),
        }
    } else {
        "{\"mismatch\":\"unknown member\"}".to_string()
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

// Scalar field values never nest braces.
fn field<'a>(request: &'a str, name: &str) -> Option<&'a str> {
    let key = format!("\"{}\":{{", name);
    let start = request.find(&key)? + key.len() - 1;
    let end = start + request[start..].find('}')?;
    Some(&request[start..=end])
}
