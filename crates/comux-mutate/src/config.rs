//! Mutator configuration (§6) — environment-driven, read once at `init`.

use std::path::PathBuf;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FUZZ_MIN: usize = 512;
pub const DEFAULT_FUZZ_MAX: usize = 32_768;
pub const MAX_DICTS: usize = 32;

/// Where `MUT_LOG` sends tracing output: `1` for stdout, `2` for stderr,
/// anything else is a file path to append to. Unset means logging stays
/// off.
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

#[derive(Debug, Clone)]
pub struct MutateConfig {
    pub log: Option<LogSink>,
    pub debug: bool,
    pub fuzz_min: usize,
    pub fuzz_max: usize,
    /// `None` means unlimited trim steps; `Some(n)` overrides the default
    /// per-run step cap.
    pub trim_max: Option<usize>,
    pub dict_paths: Vec<PathBuf>,
}

impl Default for MutateConfig {
    fn default() -> Self {
        Self {
            log: None,
            debug: false,
            fuzz_min: DEFAULT_FUZZ_MIN,
            fuzz_max: DEFAULT_FUZZ_MAX,
            trim_max: None,
            dict_paths: Vec::new(),
        }
    }
}

impl MutateConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MUT_LOG") {
            self.log = Some(LogSink::from_env_value(&v));
        }
        if let Ok(v) = std::env::var("MUT_DEBUG") {
            self.debug = is_truthy(&v) && self.log.is_some();
        }
        if let Ok(v) = std::env::var("MUT_FUZZ_MIN") {
            if let Ok(n) = v.parse() {
                self.fuzz_min = n;
            }
        }
        if let Ok(v) = std::env::var("MUT_FUZZ_MAX") {
            if let Ok(n) = v.parse() {
                self.fuzz_max = n;
            }
        }
        if let Ok(v) = std::env::var("MUT_TRIM_MAX") {
            if let Ok(n) = v.parse::<i64>() {
                self.trim_max = if n < 0 { None } else { Some(n as usize) };
            }
        }
        if let Ok(v) = std::env::var("MUT_DICT") {
            self.dict_paths = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .take(MAX_DICTS)
                .map(PathBuf::from)
                .collect();
        }
    }
}

fn is_truthy(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

static LOGGING: Once = Once::new();

pub fn init_logging(config: &MutateConfig) {
    let Some(sink) = &config.log else {
        return;
    };
    match sink {
        LogSink::Stdout => LOGGING.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_writer(std::io::stdout)
                .try_init();
        }),
        LogSink::Stderr => LOGGING.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_writer(std::io::stderr)
                .try_init();
        }),
        LogSink::File(path) => {
            if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
                LOGGING.call_once(|| {
                    let _ = tracing_subscriber::fmt()
                        .with_env_filter(EnvFilter::from_default_env())
                        .with_writer(std::sync::Mutex::new(file))
                        .try_init();
                });
            }
        }
    }
}
