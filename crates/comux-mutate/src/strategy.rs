//! Mutator strategies (C6) — S1 through S6 from §4.5.
//!
//! Each strategy transforms a parsed candidate `Manifest` and reports
//! whether it was eligible and applied. The selection loop
//! (`select_and_apply`) tries eligible strategies in random order until one
//! succeeds or the set is exhausted.

use comux_core::wire::AWAIT_RESPONSE;
use comux_core::{Chunk, Manifest};
use rand::Rng;

use crate::dict::Dictionary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ChunkDataHavoc,
    ChunkDataExtra,
    ChunkSchedBump,
    ChunkSplit,
    ChunkSplice,
    ChunkDictSwap,
}

impl Strategy {
    pub const ALL: [Strategy; 6] = [
        Strategy::ChunkDataHavoc,
        Strategy::ChunkDataExtra,
        Strategy::ChunkSchedBump,
        Strategy::ChunkSplit,
        Strategy::ChunkSplice,
        Strategy::ChunkDictSwap,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Strategy::ChunkDataHavoc => "CHUNK_DATA_HAVOC",
            Strategy::ChunkDataExtra => "CHUNK_DATA_EXTRA",
            Strategy::ChunkSchedBump => "CHUNK_SCHED_BUMP",
            Strategy::ChunkSplit => "CHUNK_SPLIT",
            Strategy::ChunkSplice => "CHUNK_SPLICE",
            Strategy::ChunkDictSwap => "CHUNK_DICT_SWAP",
        }
    }
}

/// Try strategies in random order (or just `forced`, for `havoc()`'s
/// override) until one applies; restore manifest invariants and strip
/// `NO_SHUTDOWN` before returning. `None` means every eligible strategy was
/// exhausted — the caller emits the input unchanged.
pub fn select_and_apply(
    m: &Manifest,
    rng: &mut impl Rng,
    dicts: &[Dictionary],
    forced: Option<Strategy>,
) -> Option<(Manifest, Strategy)> {
    let mut candidates: Vec<Strategy> = match forced {
        Some(s) => vec![s],
        None => Strategy::ALL.to_vec(),
    };

    while !candidates.is_empty() {
        let pick = rng.gen_range(0..candidates.len());
        let strategy = candidates.remove(pick);
        let mut candidate = m.clone();
        if apply(strategy, &mut candidate, rng, dicts) {
            restore_connection_coverage(&mut candidate);
            strip_no_shutdown(&mut candidate);
            return Some((candidate, strategy));
        }
    }
    None
}

fn apply(strategy: Strategy, m: &mut Manifest, rng: &mut impl Rng, dicts: &[Dictionary]) -> bool {
    match strategy {
        Strategy::ChunkDataHavoc => chunk_data_havoc(m, rng),
        Strategy::ChunkDataExtra => chunk_data_extra(m, rng),
        Strategy::ChunkSchedBump => chunk_sched_bump(m, rng),
        Strategy::ChunkSplit => chunk_split(m, rng),
        Strategy::ChunkSplice => chunk_splice(m, rng),
        Strategy::ChunkDictSwap => chunk_dict_swap(m, rng, dicts),
    }
}

/// After S5 possibly drops a connection's last chunk, compact `conn_id`
/// values to a dense `[0, new_num_conns)` range so invariant 3 holds again.
pub fn restore_connection_coverage(m: &mut Manifest) {
    let num_conns = m.header.num_conns;
    let mut referenced = vec![false; num_conns as usize];
    for c in &m.chunks {
        referenced[c.conn_id as usize] = true;
    }
    if referenced.iter().all(|&seen| seen) {
        return;
    }

    let mut remap = vec![0u32; num_conns as usize];
    let mut next_id = 0u32;
    for (old_id, &seen) in referenced.iter().enumerate() {
        if seen {
            remap[old_id] = next_id;
            next_id += 1;
        }
    }
    for c in &mut m.chunks {
        c.conn_id = remap[c.conn_id as usize];
    }
    m.header.num_conns = next_id.max(1);
}

/// §4.5: strip `NO_SHUTDOWN` from every chunk before emission, regardless
/// of which strategy ran.
pub fn strip_no_shutdown(m: &mut Manifest) {
    for c in &mut m.chunks {
        c.flags &= !comux_core::wire::NO_SHUTDOWN;
    }
}

// ---------------------------------------------------------------------
// S1 — CHUNK_DATA_HAVOC
// ---------------------------------------------------------------------

const INTERESTING_8: [i8; 9] = [-128, -1, 0, 1, 16, 32, 64, 100, 127];
const INTERESTING_16: [i16; 10] = [-32768, -129, 128, 255, 256, 512, 1000, 1024, 4096, 32767];
const INTERESTING_32: [i32; 8] = [
    i32::MIN,
    -100_663_046,
    -32769,
    32768,
    65535,
    65536,
    100_663_045,
    i32::MAX,
];
const INTERESTING_64: [i64; 6] = [
    i64::MIN,
    i32::MIN as i64 - 1,
    i32::MIN as i64,
    i32::MAX as i64,
    i32::MAX as i64 + 1,
    i64::MAX,
];

pub fn chunk_data_havoc(m: &mut Manifest, rng: &mut impl Rng) -> bool {
    if m.chunks.is_empty() {
        return false;
    }
    let idx = rng.gen_range(0..m.chunks.len());
    havoc_one(&mut m.chunks[idx].payload, rng);
    true
}

fn havoc_one(payload: &mut Vec<u8>, rng: &mut impl Rng) {
    if payload.is_empty() {
        return;
    }
    match rng.gen_range(0..12u8) {
        0 => bitflip(payload, rng),
        1 => set_interesting_8(payload, rng),
        2 => set_interesting_16(payload, rng),
        3 => set_interesting_32(payload, rng),
        4 => set_interesting_64(payload, rng),
        5 => arith_8(payload, rng, true),
        6 => arith_8(payload, rng, false),
        7 => arith_16(payload, rng, true),
        8 => arith_16(payload, rng, false),
        9 => arith_32(payload, rng, true),
        10 => arith_32(payload, rng, false),
        _ => xor_byte(payload, rng),
    }
}

fn bitflip(payload: &mut [u8], rng: &mut impl Rng) {
    let i = rng.gen_range(0..payload.len());
    let bit = rng.gen_range(0..8u32);
    payload[i] ^= 1 << bit;
}

fn set_interesting_8(payload: &mut [u8], rng: &mut impl Rng) {
    let i = rng.gen_range(0..payload.len());
    payload[i] = INTERESTING_8[rng.gen_range(0..INTERESTING_8.len())] as u8;
}

fn set_interesting_16(payload: &mut [u8], rng: &mut impl Rng) {
    if payload.len() < 2 {
        return set_interesting_8(payload, rng);
    }
    let i = rng.gen_range(0..=payload.len() - 2);
    let v = INTERESTING_16[rng.gen_range(0..INTERESTING_16.len())] as u16;
    let bytes = if rng.gen_bool(0.5) {
        v.to_le_bytes()
    } else {
        v.to_be_bytes()
    };
    payload[i..i + 2].copy_from_slice(&bytes);
}

fn set_interesting_32(payload: &mut [u8], rng: &mut impl Rng) {
    if payload.len() < 4 {
        return set_interesting_16(payload, rng);
    }
    let i = rng.gen_range(0..=payload.len() - 4);
    let v = INTERESTING_32[rng.gen_range(0..INTERESTING_32.len())] as u32;
    let bytes = if rng.gen_bool(0.5) {
        v.to_le_bytes()
    } else {
        v.to_be_bytes()
    };
    payload[i..i + 4].copy_from_slice(&bytes);
}

fn set_interesting_64(payload: &mut [u8], rng: &mut impl Rng) {
    if payload.len() < 8 {
        return set_interesting_32(payload, rng);
    }
    let i = rng.gen_range(0..=payload.len() - 8);
    let v = INTERESTING_64[rng.gen_range(0..INTERESTING_64.len())] as u64;
    let bytes = if rng.gen_bool(0.5) {
        v.to_le_bytes()
    } else {
        v.to_be_bytes()
    };
    payload[i..i + 8].copy_from_slice(&bytes);
}

fn arith_8(payload: &mut [u8], rng: &mut impl Rng, add: bool) {
    let i = rng.gen_range(0..payload.len());
    let delta = rng.gen_range(1..=35u8);
    payload[i] = if add {
        payload[i].wrapping_add(delta)
    } else {
        payload[i].wrapping_sub(delta)
    };
}

fn arith_16(payload: &mut [u8], rng: &mut impl Rng, add: bool) {
    if payload.len() < 2 {
        return arith_8(payload, rng, add);
    }
    let i = rng.gen_range(0..=payload.len() - 2);
    let be = rng.gen_bool(0.5);
    let mut arr = [0u8; 2];
    arr.copy_from_slice(&payload[i..i + 2]);
    let mut v = if be {
        u16::from_be_bytes(arr)
    } else {
        u16::from_le_bytes(arr)
    };
    let delta = rng.gen_range(1..=35u16);
    v = if add {
        v.wrapping_add(delta)
    } else {
        v.wrapping_sub(delta)
    };
    let out = if be { v.to_be_bytes() } else { v.to_le_bytes() };
    payload[i..i + 2].copy_from_slice(&out);
}

fn arith_32(payload: &mut [u8], rng: &mut impl Rng, add: bool) {
    if payload.len() < 4 {
        return arith_16(payload, rng, add);
    }
    let i = rng.gen_range(0..=payload.len() - 4);
    let be = rng.gen_bool(0.5);
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&payload[i..i + 4]);
    let mut v = if be {
        u32::from_be_bytes(arr)
    } else {
        u32::from_le_bytes(arr)
    };
    let delta = rng.gen_range(1..=35u32);
    v = if add {
        v.wrapping_add(delta)
    } else {
        v.wrapping_sub(delta)
    };
    let out = if be { v.to_be_bytes() } else { v.to_le_bytes() };
    payload[i..i + 4].copy_from_slice(&out);
}

fn xor_byte(payload: &mut [u8], rng: &mut impl Rng) {
    let i = rng.gen_range(0..payload.len());
    payload[i] ^= rng.gen_range(1..=255u8);
}

// ---------------------------------------------------------------------
// S2 — CHUNK_DATA_EXTRA
// ---------------------------------------------------------------------

pub fn chunk_data_extra(m: &mut Manifest, rng: &mut impl Rng) -> bool {
    if m.chunks.is_empty() {
        return false;
    }
    let idx = rng.gen_range(0..m.chunks.len());
    let payload = &mut m.chunks[idx].payload;
    if payload.len() < 2 {
        return true;
    }
    if rng.gen_bool(0.5) {
        reverse_random_range(payload, rng);
    } else {
        swap_two_positions(payload, rng);
    }
    true
}

fn reverse_random_range(payload: &mut [u8], rng: &mut impl Rng) {
    let len = payload.len();
    let a = rng.gen_range(0..len);
    let b = rng.gen_range(0..len);
    let (lo, hi) = (a.min(b), a.max(b));
    payload[lo..=hi].reverse();
}

fn swap_two_positions(payload: &mut [u8], rng: &mut impl Rng) {
    let len = payload.len();
    let a = rng.gen_range(0..len);
    let mut b = rng.gen_range(0..len);
    while b == a {
        b = rng.gen_range(0..len);
    }
    payload.swap(a, b);
}

// ---------------------------------------------------------------------
// Shared scheduling-interval helpers for S3/S4
// ---------------------------------------------------------------------

/// Open interval `(prev, next)` of same-connection neighbor scheds around
/// `m.chunks[idx]`, using `i64::MIN`/`i64::MAX` for a missing neighbor.
fn sched_interval(m: &Manifest, idx: usize) -> (i64, i64) {
    let conn_id = m.chunks[idx].conn_id;
    let sched = m.chunks[idx].sched as i64;
    let mut prev = i64::MIN;
    let mut next = i64::MAX;
    for (j, c) in m.chunks.iter().enumerate() {
        if j == idx || c.conn_id != conn_id {
            continue;
        }
        let s = c.sched as i64;
        if s < sched && s > prev {
            prev = s;
        }
        if s > sched && s < next {
            next = s;
        }
    }
    (prev, next)
}

/// Number of distinct integers strictly between `lo` and `hi`. A missing
/// neighbor (`i64::MIN`/`i64::MAX`) is treated as bounded by the valid
/// `u32` sched range, not by the raw sentinel: subtracting straight
/// against `i64::MIN`/`i64::MAX` would overflow-and-saturate to a bogus
/// `i64::MAX` width even when the real gap against the sched range is
/// tiny or zero.
fn interval_width(lo: i64, hi: i64) -> i64 {
    let lo_eff = if lo == i64::MIN { -1 } else { lo };
    let hi_eff = if hi == i64::MAX { u32::MAX as i64 + 1 } else { hi };
    (hi_eff - lo_eff - 1).max(0)
}

// ---------------------------------------------------------------------
// S3 — CHUNK_SCHED_BUMP
// ---------------------------------------------------------------------

/// Window used to bound sampling when a neighbor bound is missing (no
/// earlier/later chunk on that connection). Arbitrary but large enough to
/// never collide with realistic manifest sched ranges in practice.
const UNBOUNDED_WINDOW: i64 = 1_000_000;

pub fn chunk_sched_bump(m: &mut Manifest, rng: &mut impl Rng) -> bool {
    if m.header.num_conns < 2 {
        return false;
    }

    let mut eligible = Vec::new();
    for idx in 0..m.chunks.len() {
        let (lo, hi) = sched_interval(m, idx);
        if interval_width(lo, hi) >= 2 {
            eligible.push(idx);
        }
    }
    if eligible.is_empty() {
        return false;
    }

    let idx = eligible[rng.gen_range(0..eligible.len())];
    let (lo, hi) = sched_interval(m, idx);
    let current = m.chunks[idx].sched as i64;

    let lo_eff = if lo == i64::MIN {
        (current - UNBOUNDED_WINDOW).max(0)
    } else {
        lo
    };
    let hi_eff = if hi == i64::MAX {
        (current + UNBOUNDED_WINDOW).min(u32::MAX as i64)
    } else {
        hi
    };

    let new_sched = loop {
        let candidate = rng.gen_range((lo_eff + 1)..hi_eff);
        if candidate != current {
            break candidate;
        }
    };
    m.chunks[idx].sched = new_sched as u32;
    true
}

// ---------------------------------------------------------------------
// S4 — CHUNK_SPLIT
// ---------------------------------------------------------------------

pub fn chunk_split(m: &mut Manifest, rng: &mut impl Rng) -> bool {
    let mut eligible = Vec::new();
    for idx in 0..m.chunks.len() {
        if m.chunks[idx].payload.len() < 2 {
            continue;
        }
        let (lo, hi) = sched_interval(m, idx);
        if interval_width(lo, hi) >= 2 {
            eligible.push(idx);
        }
    }
    if eligible.is_empty() {
        return false;
    }

    let idx = eligible[rng.gen_range(0..eligible.len())];
    let (lo, hi) = sched_interval(m, idx);
    let original_sched = m.chunks[idx].sched as i64;

    let mut new_original = original_sched;
    let mut new_second = new_original + 1;
    while hi != i64::MAX && new_second >= hi {
        new_original -= 1;
        new_second -= 1;
        if (lo != i64::MIN && new_original <= lo) || new_original < 0 {
            // No integer slot fits between the neighbors; give up rather
            // than wrap a negative value into a u32 below.
            return false;
        }
    }
    if new_original < 0 || new_second > u32::MAX as i64 {
        return false;
    }

    let payload = std::mem::take(&mut m.chunks[idx].payload);
    let split_pos = rng.gen_range(1..=payload.len() - 1);
    let (first_half, second_half) = payload.split_at(split_pos);

    let conn_id = m.chunks[idx].conn_id;
    let original_flags = m.chunks[idx].flags;
    let await_flag = original_flags & AWAIT_RESPONSE;
    let remaining_flags = original_flags & !AWAIT_RESPONSE;

    m.chunks[idx].payload = first_half.to_vec();
    m.chunks[idx].len = first_half.len() as u64;
    m.chunks[idx].sched = new_original as u32;
    m.chunks[idx].flags = remaining_flags;

    let second_chunk = Chunk {
        conn_id,
        len: second_half.len() as u64,
        sched: new_second as u32,
        flags: remaining_flags | await_flag,
        payload: second_half.to_vec(),
        offset: 0,
    };
    m.chunks.insert(idx + 1, second_chunk);
    m.header.num_chunks = m.chunks.len() as u32;
    true
}

// ---------------------------------------------------------------------
// S5 — CHUNK_SPLICE
// ---------------------------------------------------------------------

pub fn chunk_splice(m: &mut Manifest, rng: &mut impl Rng) -> bool {
    let mut pairs = Vec::new();
    for conn_id in 0..m.header.num_conns {
        let mut members: Vec<usize> = m
            .chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.conn_id == conn_id)
            .map(|(i, _)| i)
            .collect();
        members.sort_by_key(|&i| (m.chunks[i].sched, i));
        for w in members.windows(2) {
            pairs.push((w[0], w[1]));
        }
    }
    if pairs.is_empty() {
        return false;
    }

    let (a, b) = pairs[rng.gen_range(0..pairs.len())];
    let removed_payload = m.chunks[b].payload.clone();
    let removed_flags = m.chunks[b].flags;
    m.chunks.remove(b);
    let a_index = if b < a { a - 1 } else { a };

    m.chunks[a_index].payload.extend_from_slice(&removed_payload);
    m.chunks[a_index].len = m.chunks[a_index].payload.len() as u64;
    if removed_flags & AWAIT_RESPONSE != 0 {
        m.chunks[a_index].flags |= AWAIT_RESPONSE;
    }
    m.header.num_chunks = m.chunks.len() as u32;
    true
}

// ---------------------------------------------------------------------
// S6 — CHUNK_DICT_SWAP
// ---------------------------------------------------------------------

pub fn chunk_dict_swap(m: &mut Manifest, rng: &mut impl Rng, dicts: &[Dictionary]) -> bool {
    if dicts.is_empty() || m.chunks.is_empty() {
        return false;
    }
    let dict = &dicts[rng.gen_range(0..dicts.len())];
    let chunk_idx = rng.gen_range(0..m.chunks.len());
    let payload = &mut m.chunks[chunk_idx].payload;

    let Some((pos, matched_len)) = find_first_dict_word(payload, dict) else {
        return true;
    };

    let matched = payload[pos..pos + matched_len].to_vec();
    let Some(replacement) = dict.random_distinct_from(&matched, rng) else {
        return true;
    };
    let replacement = replacement.to_vec();

    payload.splice(pos..pos + matched_len, replacement);
    m.chunks[chunk_idx].len = m.chunks[chunk_idx].payload.len() as u64;
    true
}

fn find_first_dict_word(payload: &[u8], dict: &Dictionary) -> Option<(usize, usize)> {
    for start in 0..payload.len() {
        for entry in dict.entries() {
            let word = entry.as_ref();
            if !word.is_empty() && payload[start..].starts_with(word) {
                return Some((start, word.len()));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn chunk(conn_id: u32, sched: u32, flags: u32, payload: &[u8]) -> Chunk {
        Chunk {
            conn_id,
            len: payload.len() as u64,
            sched,
            flags,
            payload: payload.to_vec(),
            offset: 0,
        }
    }

    fn manifest(num_conns: u32, chunks: Vec<Chunk>) -> Manifest {
        Manifest {
            header: comux_core::Header {
                version: 0,
                num_conns,
                num_chunks: chunks.len() as u32,
            },
            chunks,
        }
    }

    fn same_conn_sequence(m: &Manifest, conn_id: u32) -> Vec<(u32, Vec<u8>)> {
        let mut members: Vec<&Chunk> = m.chunks.iter().filter(|c| c.conn_id == conn_id).collect();
        members.sort_by_key(|c| c.sched);
        members.into_iter().map(|c| (c.sched, c.payload.clone())).collect()
    }

    #[test]
    fn havoc_is_noop_on_empty_payload_but_still_applies() {
        let m = manifest(1, vec![chunk(0, 0, 0, b"")]);
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut candidate = m.clone();
        assert!(chunk_data_havoc(&mut candidate, &mut rng));
        assert_eq!(candidate, m);
    }

    #[test]
    fn havoc_mutates_some_byte() {
        let m = manifest(1, vec![chunk(0, 0, 0, b"abcdefgh")]);
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut changed = false;
        for seed in 0..50 {
            let mut candidate = m.clone();
            let mut r = rand::rngs::StdRng::seed_from_u64(seed);
            chunk_data_havoc(&mut candidate, &mut r);
            if candidate.chunks[0].payload != m.chunks[0].payload {
                changed = true;
                break;
            }
        }
        let _ = &mut rng;
        assert!(changed);
    }

    #[test]
    fn sched_bump_requires_two_connections() {
        let m = manifest(1, vec![chunk(0, 0, 0, b"x")]);
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut candidate = m.clone();
        assert!(!chunk_sched_bump(&mut candidate, &mut rng));
    }

    #[test]
    fn split_produces_two_chunks_with_flag_transferred() {
        let m = manifest(
            1,
            vec![chunk(0, 5, AWAIT_RESPONSE, b"0123456789")],
        );
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let mut candidate = m.clone();
        assert!(chunk_split(&mut candidate, &mut rng));
        assert_eq!(candidate.chunks.len(), 2);
        assert_eq!(candidate.chunks[0].conn_id, 0);
        assert_eq!(candidate.chunks[1].conn_id, 0);
        assert_eq!(
            candidate.chunks[0].payload.len() + candidate.chunks[1].payload.len(),
            10
        );
        assert_eq!(candidate.chunks[0].flags & AWAIT_RESPONSE, 0);
        assert_eq!(candidate.chunks[1].flags & AWAIT_RESPONSE, AWAIT_RESPONSE);
    }

    #[test]
    fn splice_merges_adjacent_same_connection_chunks() {
        let m = manifest(
            1,
            vec![
                chunk(0, 1, 0, b"A"),
                chunk(0, 2, AWAIT_RESPONSE, b"B"),
            ],
        );
        let mut rng = rand::rngs::StdRng::seed_from_u64(9);
        let mut candidate = m.clone();
        assert!(chunk_splice(&mut candidate, &mut rng));
        assert_eq!(candidate.chunks.len(), 1);
        assert_eq!(candidate.chunks[0].payload, b"AB");
        assert_eq!(candidate.chunks[0].flags & AWAIT_RESPONSE, AWAIT_RESPONSE);
    }

    #[test]
    fn splice_requires_a_connection_with_two_chunks() {
        let m = manifest(2, vec![chunk(0, 0, 0, b"A"), chunk(1, 0, 0, b"B")]);
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut candidate = m.clone();
        assert!(!chunk_splice(&mut candidate, &mut rng));
    }

    #[test]
    fn scheduling_order_preserved_by_sched_bump() {
        let m = manifest(
            2,
            vec![
                chunk(0, 1, 0, b"a"),
                chunk(0, 10, 0, b"b"),
                chunk(1, 0, 0, b"c"),
            ],
        );
        let before = same_conn_sequence(&m, 0);
        let mut candidate = m.clone();
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        chunk_sched_bump(&mut candidate, &mut rng);
        let after_payloads: Vec<Vec<u8>> = same_conn_sequence(&candidate, 0)
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        let before_payloads: Vec<Vec<u8>> = before.into_iter().map(|(_, p)| p).collect();
        assert_eq!(before_payloads, after_payloads);
    }

    #[test]
    fn dict_swap_replaces_exactly_one_word() {
        let dir = std::env::temp_dir().join(format!("comux-strategy-dict-{}", std::process::id()));
        std::fs::write(&dir, "cat\ndog\n").unwrap();
        let dict = Dictionary::load(&dir).unwrap();
        let m = manifest(1, vec![chunk(0, 0, 0, b"a cat sat")]);
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let mut candidate = m.clone();
        assert!(chunk_dict_swap(&mut candidate, &mut rng, &[dict]));
        assert_eq!(candidate.chunks[0].payload, b"a dog sat");
        let _ = std::fs::remove_file(&dir);
    }

    #[test]
    fn dict_swap_ineligible_without_dictionaries() {
        let m = manifest(1, vec![chunk(0, 0, 0, b"a cat sat")]);
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let mut candidate = m.clone();
        assert!(!chunk_dict_swap(&mut candidate, &mut rng, &[]));
    }

    #[test]
    fn restore_connection_coverage_compacts_gaps() {
        let mut m = manifest(3, vec![chunk(0, 0, 0, b"x"), chunk(2, 0, 0, b"y")]);
        restore_connection_coverage(&mut m);
        assert_eq!(m.header.num_conns, 2);
        assert_eq!(m.chunks[0].conn_id, 0);
        assert_eq!(m.chunks[1].conn_id, 1);
    }

    #[test]
    fn select_and_apply_respects_forced_strategy() {
        let m = manifest(1, vec![chunk(0, 0, 0, b"abc")]);
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let (_candidate, strategy) =
            select_and_apply(&m, &mut rng, &[], Some(Strategy::ChunkDataHavoc)).unwrap();
        assert_eq!(strategy, Strategy::ChunkDataHavoc);
    }

    #[test]
    fn select_and_apply_strips_no_shutdown() {
        use comux_core::wire::NO_SHUTDOWN;
        let m = manifest(1, vec![chunk(0, 0, NO_SHUTDOWN, b"abc")]);
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let (candidate, _) =
            select_and_apply(&m, &mut rng, &[], Some(Strategy::ChunkDataHavoc)).unwrap();
        assert!(candidate.chunks.iter().all(|c| c.flags & NO_SHUTDOWN == 0));
    }
}
