//! Replay orchestrator configuration.
//!
//! Resolution order: environment variables → defaults. There is no config
//! file here — this crate links into an arbitrary target process rather
//! than running as its own daemon, so the only knobs a caller has are the
//! environment it sets before the target starts.

use std::path::PathBuf;

/// Where `LIB_LOG` sends tracing output: `1` for stdout, `2` for stderr,
/// anything else is a file path to append to. Unset means logging stays
/// off — the host process did not ask for a backend on its behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Stdout,
    Stderr,
    File(PathBuf),
}

impl LogSink {
    fn from_env_value(v: &str) -> Self {
        match v {
            "1" => LogSink::Stdout,
            "2" => LogSink::Stderr,
            path => LogSink::File(PathBuf::from(path)),
        }
    }
}

/// Runtime knobs for the replay orchestrator, read once at manifest-replay
/// start time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayConfig {
    /// `LIB_LOG` — where to send tracing output from this crate, or `None`
    /// to leave logging disabled.
    pub log: Option<LogSink>,
    /// `LIB_NO_WAIT` — do not block waiting for a response chunk even when
    /// a chunk's `AWAIT_RESPONSE` flag is set.
    pub no_wait: bool,
    /// `LIB_SEND_BUFFSIZE` — SO_SNDBUF override in bytes. 0 = leave the OS
    /// default in place.
    pub send_buffsize: usize,
    /// `LIB_RECV_BUFFSIZE` — SO_RCVBUF override in bytes. 0 = leave the OS
    /// default in place.
    pub recv_buffsize: usize,
    /// `LIB_EXIT_IMMEDIATE` — call `_exit` the instant replay completes
    /// instead of returning control to the host process.
    pub exit_immediate: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            log: None,
            no_wait: false,
            send_buffsize: 0,
            recv_buffsize: 0,
            exit_immediate: false,
        }
    }
}

impl ReplayConfig {
    /// Build a config from the current process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LIB_LOG") {
            self.log = Some(LogSink::from_env_value(&v));
        }
        if let Ok(v) = std::env::var("LIB_NO_WAIT") {
            self.no_wait = is_truthy(&v);
        }
        if let Ok(v) = std::env::var("LIB_SEND_BUFFSIZE") {
            if let Ok(n) = v.parse() {
                self.send_buffsize = n;
            }
        }
        if let Ok(v) = std::env::var("LIB_RECV_BUFFSIZE") {
            if let Ok(n) = v.parse() {
                self.recv_buffsize = n;
            }
        }
        if let Ok(v) = std::env::var("LIB_EXIT_IMMEDIATE") {
            self.exit_immediate = is_truthy(&v);
        }
    }
}

fn is_truthy(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

/// Install a `tracing` subscriber if `LIB_LOG` asked for one, writing to
/// whichever sink it named. Idempotent — safe to call from multiple
/// activation hooks.
pub fn init_logging(config: &ReplayConfig) {
    use std::sync::Once;
    static INIT: Once = Once::new();
    let Some(sink) = &config.log else {
        return;
    };
    match sink {
        LogSink::Stdout => INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_writer(std::io::stdout)
                .try_init();
        }),
        LogSink::Stderr => INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_writer(std::io::stderr)
                .try_init();
        }),
        LogSink::File(path) => {
            if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
                INIT.call_once(|| {
                    let _ = tracing_subscriber::fmt()
                        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                        .with_writer(std::sync::Mutex::new(file))
                        .try_init();
                });
            }
        }
    }
}
