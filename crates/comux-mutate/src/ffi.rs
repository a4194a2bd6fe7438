//! AFL++ custom-mutator ABI (C9's only FFI surface). Every function here is
//! a thin, `unsafe`-isolated adapter onto `Driver`; all interesting
//! behavior lives in `driver.rs` as ordinary safe Rust.

use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::slice;

use crate::config::MutateConfig;
use crate::driver::Driver;

/// `afl_custom_init`: construct a `Driver` and hand the host an opaque
/// pointer to it. The host passes this pointer back unchanged to every
/// other entry point.
#[no_mangle]
pub extern "C" fn afl_custom_init(_afl_state: *mut c_void, seed: u32) -> *mut c_void {
    let config = MutateConfig::from_env();
    let driver = Box::new(Driver::new(seed as u64, config));
    Box::into_raw(driver) as *mut c_void
}

/// # Safety
/// `data` must be a live pointer returned by `afl_custom_init` and not yet
/// passed to `afl_custom_deinit`.
unsafe fn driver_mut<'a>(data: *mut c_void) -> &'a mut Driver {
    &mut *(data as *mut Driver)
}

#[no_mangle]
pub extern "C" fn afl_custom_fuzz(
    data: *mut c_void,
    buf: *mut u8,
    buf_size: usize,
    out_buf: *mut *mut u8,
    _add_buf: *mut u8,
    _add_buf_size: usize,
    max_size: usize,
) -> usize {
    // Safety: `data` comes from `afl_custom_init`; `buf`/`buf_size` bound a
    // host-owned input buffer valid for the call's duration; `out_buf` is a
    // valid out-parameter the host reads immediately after this returns.
    unsafe {
        let driver = driver_mut(data);
        let input = slice::from_raw_parts(buf, buf_size);
        match driver.fuzz(input) {
            Some(output) if output.len() <= max_size => {
                *out_buf = output.as_ptr() as *mut u8;
                output.len()
            }
            _ => {
                *out_buf = buf;
                buf_size
            }
        }
    }
}

#[no_mangle]
pub extern "C" fn afl_custom_havoc_mutation(
    data: *mut c_void,
    buf: *mut u8,
    buf_size: usize,
    out_buf: *mut *mut u8,
    max_size: usize,
) -> usize {
    // Safety: see `afl_custom_fuzz`.
    unsafe {
        let driver = driver_mut(data);
        let input = slice::from_raw_parts(buf, buf_size);
        match driver.havoc(input) {
            Some(output) if output.len() <= max_size => {
                *out_buf = output.as_ptr() as *mut u8;
                output.len()
            }
            _ => {
                *out_buf = buf;
                buf_size
            }
        }
    }
}

#[no_mangle]
pub extern "C" fn afl_custom_havoc_mutation_probability(data: *mut c_void) -> u8 {
    // Safety: `data` comes from `afl_custom_init`.
    let driver = unsafe { driver_mut(data) };
    driver.havoc_probability() as u8
}

#[no_mangle]
pub extern "C" fn afl_custom_queue_get(data: *mut c_void, filename: *const c_char) -> u8 {
    // Safety: `data` comes from `afl_custom_init`; `filename` is a
    // host-owned, NUL-terminated path valid for the call's duration.
    unsafe {
        let driver = driver_mut(data);
        let Ok(path) = CStr::from_ptr(filename).to_str() else {
            return 1;
        };
        let Ok(bytes) = std::fs::read(path) else {
            return 1;
        };
        driver.queue_filter(&bytes) as u8
    }
}

#[no_mangle]
pub extern "C" fn afl_custom_fuzz_count(data: *mut c_void, buf: *const u8, buf_size: usize) -> u32 {
    // Safety: `data` comes from `afl_custom_init`; `buf`/`buf_size` bound a
    // host-owned input buffer valid for the call's duration.
    unsafe {
        let driver = driver_mut(data);
        let input = slice::from_raw_parts(buf, buf_size);
        driver.fuzz_count(input)
    }
}

#[no_mangle]
pub extern "C" fn afl_custom_describe(data: *mut c_void, _max_description_len: usize) -> *const c_char {
    // Safety: `data` comes from `afl_custom_init`. The returned pointer
    // aliases `driver.describe_buffer` and is only valid until the next
    // call into this driver; that matches AFL++'s documented contract that
    // `describe` output is consumed immediately.
    unsafe {
        let driver = driver_mut(data);
        driver.describe().as_ptr()
    }
}

#[no_mangle]
pub extern "C" fn afl_custom_init_trim(data: *mut c_void, buf: *mut u8, buf_size: usize) -> u32 {
    // Safety: `data` comes from `afl_custom_init`; `buf`/`buf_size` bound a
    // host-owned input buffer valid for the call's duration.
    unsafe {
        let driver = driver_mut(data);
        let input = slice::from_raw_parts(buf, buf_size);
        driver.init_trim(input).unwrap_or(0)
    }
}

#[no_mangle]
pub extern "C" fn afl_custom_trim(data: *mut c_void, out_buf: *mut *mut u8) -> usize {
    // Safety: `data` comes from `afl_custom_init`; `out_buf` is a valid
    // out-parameter the host reads immediately after this returns.
    unsafe {
        let driver = driver_mut(data);
        match driver.trim() {
            Some(output) => {
                *out_buf = output.as_ptr() as *mut u8;
                output.len()
            }
            None => {
                *out_buf = ptr::null_mut();
                0
            }
        }
    }
}

#[no_mangle]
pub extern "C" fn afl_custom_post_trim(data: *mut c_void, success: u8) -> c_int {
    // Safety: `data` comes from `afl_custom_init`.
    let driver = unsafe { driver_mut(data) };
    driver.post_trim(success != 0) as c_int
}

#[no_mangle]
pub extern "C" fn afl_custom_deinit(data: *mut c_void) {
    if data.is_null() {
        return;
    }
    // Safety: `data` is a pointer produced by `Box::into_raw` in
    // `afl_custom_init` and the host calls this exactly once, after which
    // it never dereferences `data` again.
    unsafe {
        let driver = Box::from_raw(data as *mut Driver);
        driver.deinit();
    }
}
