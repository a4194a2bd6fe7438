//! Mutator driver (C9) — the stateful, safe-Rust core that `ffi.rs` exposes
//! across the AFL++ custom-mutator ABI boundary. One `Driver` is created per
//! `afl_custom_init` call and lives for the lifetime of the fuzzing run.

use std::io::Cursor;

use comux_core::codec;
use comux_core::validate;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::MutateConfig;
use crate::dict::Dictionary;
use crate::strategy::{self, Strategy};
use crate::trim::{TrimState, DEFAULT_MAX_STEPS};

pub struct Driver {
    config: MutateConfig,
    rng: StdRng,
    dicts: Vec<Dictionary>,
    reusable_output_buffer: Vec<u8>,
    describe_buffer: std::ffi::CString,
    override_strategy: Option<Strategy>,
    last_fuzz_count: usize,
    last_strategy: Option<Strategy>,
    trimmer: Option<ActiveTrim>,
}

struct ActiveTrim {
    manifest: comux_core::Manifest,
    state: TrimState,
}

impl Driver {
    pub fn new(seed: u64, config: MutateConfig) -> Self {
        crate::config::init_logging(&config);
        let dicts = config
            .dict_paths
            .iter()
            .filter_map(|path| match Dictionary::load(path) {
                Ok(d) => Some(d),
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "skipping unloadable dictionary");
                    None
                }
            })
            .collect();
        Self {
            rng: StdRng::seed_from_u64(seed),
            dicts,
            reusable_output_buffer: Vec::new(),
            describe_buffer: std::ffi::CString::default(),
            override_strategy: None,
            last_fuzz_count: config.fuzz_min,
            last_strategy: None,
            config,
            trimmer: None,
        }
    }

    /// Force every subsequent `fuzz` call to apply exactly `strategy`, or
    /// clear the override. Used by `afl_custom_havoc_mutation`.
    pub fn set_override(&mut self, strategy: Option<Strategy>) {
        self.override_strategy = strategy;
    }

    /// Parse, mutate, and re-encode `input`. Returns `None` when the input
    /// doesn't parse, no strategy was eligible, or the result fails to
    /// re-encode — callers should emit `input` unchanged in that case.
    pub fn fuzz(&mut self, input: &[u8]) -> Option<&[u8]> {
        let manifest = codec::decode(&mut Cursor::new(input)).ok()?;
        let (mutated, strategy) =
            strategy::select_and_apply(&manifest, &mut self.rng, &self.dicts, self.override_strategy)?;
        if validate::validate_manifest(&mutated).is_err() {
            return None;
        }
        tracing::debug!(strategy = strategy.label(), "applied mutation strategy");
        self.last_strategy = Some(strategy);
        self.reusable_output_buffer = codec::encode(&mutated);
        Some(&self.reusable_output_buffer)
    }

    /// `havoc`: the host's generic byte-level mutation slot. Always forces
    /// `CHUNK_DATA_HAVOC` regardless of any standing override.
    pub fn havoc(&mut self, input: &[u8]) -> Option<&[u8]> {
        let manifest = codec::decode(&mut Cursor::new(input)).ok()?;
        let (mutated, strategy) = strategy::select_and_apply(
            &manifest,
            &mut self.rng,
            &self.dicts,
            Some(Strategy::ChunkDataHavoc),
        )?;
        if validate::validate_manifest(&mutated).is_err() {
            return None;
        }
        self.last_strategy = Some(strategy);
        self.reusable_output_buffer = codec::encode(&mutated);
        Some(&self.reusable_output_buffer)
    }

    pub fn havoc_probability(&self) -> u32 {
        100
    }

    /// `queue_filter`: whether this input should be kept in the fuzzing
    /// corpus. Parses and validates the manifest without mutating it.
    pub fn queue_filter(&self, input: &[u8]) -> bool {
        let Ok(manifest) = codec::decode(&mut Cursor::new(input)) else {
            return false;
        };
        validate::validate_manifest(&manifest).is_ok()
    }

    /// §4.8: a suggested iteration count derived from the input's shape and
    /// the previous count, clamped into `[fuzz_min, fuzz_max]`.
    pub fn fuzz_count(&mut self, input: &[u8]) -> u32 {
        let fuzz_min = self.config.fuzz_min;
        let fuzz_max = self.config.fuzz_max;

        let Ok(manifest) = codec::decode(&mut Cursor::new(input)) else {
            self.last_fuzz_count = fuzz_min;
            return fuzz_min as u32;
        };

        let num_conns = manifest.header.num_conns as usize;
        let num_chunks = manifest.header.num_chunks as usize;

        let mut count = fuzz_min.max(self.last_fuzz_count);

        if num_conns > 1 {
            count = count.saturating_mul(num_conns.max(3));
        } else if count >= fuzz_max / 2 {
            count /= 2;
        }

        let chunk_factor = num_chunks as i64 - num_conns as i64;
        if chunk_factor > 0 {
            count = count.saturating_mul((chunk_factor as usize).max(3));
        } else if count >= fuzz_max / 2 {
            count /= 2;
        }

        let count = count.clamp(fuzz_min, fuzz_max);
        self.last_fuzz_count = count;
        count as u32
    }

    /// The label of the most-recently-applied strategy, for the host to
    /// name output artifacts. Falls back to a placeholder before any
    /// `fuzz`/`havoc` call has succeeded.
    pub fn describe(&mut self) -> &std::ffi::CStr {
        let label = self
            .last_strategy
            .map(|s| Strategy::label(&s))
            .unwrap_or("comux-mutate");
        self.describe_buffer =
            std::ffi::CString::new(label).unwrap_or_else(|_| std::ffi::CString::default());
        &self.describe_buffer
    }

    /// `init_trim`: begin trimming `input`'s first chunk with a nonempty
    /// payload. Returns the initial step count the host should expect.
    pub fn init_trim(&mut self, input: &[u8]) -> Option<u32> {
        let manifest = codec::decode(&mut Cursor::new(input)).ok()?;
        let target_chunk = manifest
            .chunks
            .iter()
            .position(|c| !c.payload.is_empty())?;
        let max_steps = self.config.trim_max.unwrap_or(DEFAULT_MAX_STEPS);
        let payload = manifest.chunks[target_chunk].payload.clone();
        let state = TrimState::new(target_chunk, payload, max_steps);
        let steps = state.trim_steps() as u32;
        self.trimmer = Some(ActiveTrim { manifest, state });
        Some(steps)
    }

    /// `trim`: produce the next candidate encoding, or `None` once the
    /// trim run is finished.
    pub fn trim(&mut self) -> Option<&[u8]> {
        let active = self.trimmer.as_mut()?;
        let candidate_payload = active.state.step(&mut self.rng)?.to_vec();
        let mut candidate = active.manifest.clone();
        candidate.chunks[active.state.target_chunk].payload = candidate_payload.clone();
        candidate.chunks[active.state.target_chunk].len = candidate_payload.len() as u64;
        self.reusable_output_buffer = codec::encode(&candidate);
        Some(&self.reusable_output_buffer)
    }

    /// `post_trim`: the host's verdict on the most recent `trim()` call.
    /// Returns whether trimming should continue.
    pub fn post_trim(&mut self, success: bool) -> bool {
        let Some(active) = self.trimmer.as_mut() else {
            return false;
        };
        active.state.post_step(success);
        if active.state.should_terminate_early() {
            self.finish_trim();
            return false;
        }
        true
    }

    fn finish_trim(&mut self) {
        if let Some(active) = self.trimmer.take() {
            let mut manifest = active.manifest;
            let target = active.state.target_chunk;
            let final_payload = active.state.into_result();
            manifest.chunks[target].len = final_payload.len() as u64;
            manifest.chunks[target].payload = final_payload;
            self.reusable_output_buffer = codec::encode(&manifest);
        }
    }

    pub fn deinit(self) {}
}
