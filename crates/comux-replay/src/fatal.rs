//! Centralized fatal-error handling for the replay orchestrator.
//!
//! Any operating-system or resource error other than the explicitly-handled
//! remote-close set (`EPIPE`, `ECONNRESET`, zero-byte read) is fatal for the
//! whole process: log one line carrying errno/strerror and exit with code
//! 24060. No recovery is attempted — the fuzzer host re-invokes.

/// Fatal exit status for every category-3 error (§7).
pub const FATAL_EXIT_CODE: i32 = 24060;

/// Log `context` and terminate. `immediate` selects `_exit` over the
/// ordinary `process::exit`, per `LIB_EXIT_IMMEDIATE`.
pub fn fatal_message(context: &str, immediate: bool) -> ! {
    println!("FATAL: {context}");
    tracing::error!(context, "fatal error, terminating");
    terminate(FATAL_EXIT_CODE, immediate)
}

/// Same as `fatal_message`, formatting an `io::Error`'s errno/strerror in.
pub fn fatal_os_error(context: &str, immediate: bool, err: std::io::Error) -> ! {
    let errno = err.raw_os_error().unwrap_or(-1);
    fatal_message(&format!("{context}: {err} (errno {errno})"), immediate)
}

/// The orchestrator's only termination path.
pub fn terminate(code: i32, immediate: bool) -> ! {
    if immediate {
        // Safety: _exit takes only the status code and never returns;
        // skipping atexit/stdio flush is LIB_EXIT_IMMEDIATE's documented
        // contract.
        unsafe { libc::_exit(code) }
    } else {
        std::process::exit(code)
    }
}

/// True for the remote-close error set that §4.3/§4.4 treat as an expected
/// state transition rather than a fatal error.
pub fn is_remote_close(err: &std::io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EPIPE) | Some(libc::ECONNRESET))
        || err.kind() == std::io::ErrorKind::ConnectionReset
}
