//! Trimmer (C7) — shrinks a chunk's payload across repeated `trim`/
//! `post_trim` calls while the fuzzer host confirms each step still
//! reproduces the behavior of interest.
//!
//! Mirrors the fraction-of-remaining-bytes-per-step shape of a classic
//! AFL++ custom trimmer: each step proposes omitting a fixed number of
//! random byte positions from the target chunk's payload, and only commits
//! the omission once the host reports success via `post_step`.

use rand::seq::index::sample;
use rand::Rng;

/// Hard ceiling on the number of steps a single trim run will take,
/// regardless of how small `bytes_per_step` ends up being. Keeps trimming
/// bounded on pathologically large payloads.
pub const DEFAULT_MAX_STEPS: usize = 2500;

#[derive(Debug, Clone)]
pub struct TrimState {
    /// Index of the chunk being trimmed within the manifest's chunk list.
    pub target_chunk: usize,
    /// Current best-known-good payload for the target chunk.
    baseline: Vec<u8>,
    /// Candidate payload proposed by the most recent `step()`.
    pending: Option<Vec<u8>>,
    bytes_per_step: usize,
    trim_steps: usize,
    trim_count: usize,
    success_count: usize,
}

impl TrimState {
    /// Begin trimming `payload`. `bytes_per_step` is 2.5% of the payload
    /// length (minimum 1); `trim_steps` is how many times that many bytes
    /// can be removed before the payload is exhausted, clamped to
    /// `[0, max_steps]`.
    pub fn new(target_chunk: usize, payload: Vec<u8>, max_steps: usize) -> Self {
        let len = payload.len();
        let bytes_per_step = ((len as f64 * 0.025).floor() as usize).max(1);
        let raw_steps = len / bytes_per_step;
        let trim_steps = raw_steps.saturating_sub(1).min(max_steps);
        Self {
            target_chunk,
            baseline: payload,
            pending: None,
            bytes_per_step,
            trim_steps,
            trim_count: 0,
            success_count: 0,
        }
    }

    pub fn trim_steps(&self) -> usize {
        self.trim_steps
    }

    pub fn trim_count(&self) -> usize {
        self.trim_count
    }

    pub fn current_len(&self) -> usize {
        self.baseline.len()
    }

    /// Propose the next candidate payload: the baseline with
    /// `bytes_per_step` randomly chosen distinct byte positions omitted.
    /// Returns `None` once the step budget (or the payload itself) is
    /// exhausted.
    pub fn step(&mut self, rng: &mut impl Rng) -> Option<&[u8]> {
        if self.trim_count >= self.trim_steps || self.baseline.len() <= self.bytes_per_step {
            return None;
        }
        let omit_count = self.bytes_per_step.min(self.baseline.len());
        let omitted = sample(rng, self.baseline.len(), omit_count);
        let mut omit_mask = vec![false; self.baseline.len()];
        for idx in omitted.iter() {
            omit_mask[idx] = true;
        }
        let candidate: Vec<u8> = self
            .baseline
            .iter()
            .enumerate()
            .filter(|(i, _)| !omit_mask[*i])
            .map(|(_, &b)| b)
            .collect();
        self.trim_count += 1;
        self.pending = Some(candidate);
        self.pending.as_deref()
    }

    /// Record the host's verdict on the most recent `step()`'s candidate:
    /// commit it as the new baseline on success, discard it on failure.
    pub fn post_step(&mut self, success: bool) {
        let Some(candidate) = self.pending.take() else {
            return;
        };
        if success {
            self.baseline = candidate;
            self.success_count += 1;
        }
    }

    /// Whether the run should stop early: after a minimum number of steps
    /// (`max(100, 25% of trim_steps)`), a success rate below 10% means
    /// further trimming is unlikely to pay off.
    pub fn should_terminate_early(&self) -> bool {
        let min_steps = self.trim_steps / 4;
        let min_steps = min_steps.max(100).min(self.trim_steps);
        if self.trim_count < min_steps {
            return false;
        }
        let rate = self.success_count as f64 / self.trim_count as f64;
        rate < 0.10
    }

    /// The final trimmed payload, after the run ends (by exhaustion or
    /// early termination).
    pub fn into_result(self) -> Vec<u8> {
        self.baseline
    }
}
