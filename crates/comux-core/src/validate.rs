//! Manifest validation — a pure, independent check over an in-memory
//! `Manifest`, separate from the decoder.
//!
//! The decoder (`codec::decode`) validates a *byte stream* eagerly, field by
//! field, and reports precisely which field of which record was malformed.
//! This module validates a *manifest value* that may never have gone
//! through `decode` at all — the mutator builds and reshapes manifests
//! directly — so it re-checks the same invariants from scratch rather than
//! trusting that a value in this shape was already validated once.
//!
//! Diagnostics here are plain strings, not a typed error enum: callers
//! (the CLI, the mutator's debug logging) just want a human-readable reason
//! a candidate manifest was rejected, not a kind to branch on.

use crate::codec::{Chunk, Header, Manifest};
use crate::wire::{
    KNOWN_FLAGS_MASK, MAX_NUM_CHUNKS, MAX_NUM_CONNS, MIN_NUM_CHUNKS, MIN_NUM_CONNS,
};

/// Check the two header-level range invariants.
pub fn validate_header(h: &Header) -> Result<(), String> {
    if !(MIN_NUM_CONNS..=MAX_NUM_CONNS).contains(&h.num_conns) {
        return Err(format!(
            "num_conns {} out of range [{}, {}]",
            h.num_conns, MIN_NUM_CONNS, MAX_NUM_CONNS
        ));
    }
    if !(MIN_NUM_CHUNKS..=MAX_NUM_CHUNKS).contains(&h.num_chunks) {
        return Err(format!(
            "num_chunks {} out of range [{}, {}]",
            h.num_chunks, MIN_NUM_CHUNKS, MAX_NUM_CHUNKS
        ));
    }
    Ok(())
}

/// Check a single chunk against the header it belongs to: conn_id range and
/// the flags bit-mask. Unlike the decoder, which strips unknown flag bits
/// silently, validation treats them as a rejection reason.
pub fn validate_chunk(h: &Header, c: &Chunk) -> Result<(), String> {
    if c.conn_id >= h.num_conns {
        return Err(format!(
            "conn_id {} out of range [0, {})",
            c.conn_id, h.num_conns
        ));
    }
    if c.flags & !KNOWN_FLAGS_MASK != 0 {
        return Err(format!(
            "flags {:#x} contain bits outside the known mask {:#x}",
            c.flags, KNOWN_FLAGS_MASK
        ));
    }
    Ok(())
}

/// Full manifest validation: header ranges, per-chunk checks, chunk-count
/// agreement (the decoder permits `chunks.len() != header.num_chunks` on a
/// truncated stream — this layer does not), and connection coverage (every
/// declared connection id in `[0, num_conns)` must be referenced by at
/// least one chunk).
pub fn validate_manifest(m: &Manifest) -> Result<(), String> {
    validate_header(&m.header)?;

    if m.chunks.len() as u32 != m.header.num_chunks {
        return Err(format!(
            "header declares {} chunks but manifest has {}",
            m.header.num_chunks,
            m.chunks.len()
        ));
    }

    for (index, c) in m.chunks.iter().enumerate() {
        validate_chunk(&m.header, c)
            .map_err(|reason| format!("chunk {}: {}", index, reason))?;
    }

    let mut referenced = vec![false; m.header.num_conns as usize];
    for c in &m.chunks {
        if let Some(slot) = referenced.get_mut(c.conn_id as usize) {
            *slot = true;
        }
    }
    if let Some(conn_id) = referenced.iter().position(|&seen| !seen) {
        return Err(format!(
            "connection id {} is never referenced by any chunk",
            conn_id
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Chunk, Header, Manifest};

    fn chunk(conn_id: u32, flags: u32) -> Chunk {
        Chunk {
            conn_id,
            len: 0,
            sched: 0,
            flags,
            payload: Vec::new(),
            offset: 0,
        }
    }

    fn header(num_conns: u32, num_chunks: u32) -> Header {
        Header {
            version: 0,
            num_conns,
            num_chunks,
        }
    }

    #[test]
    fn valid_manifest_passes() {
        let m = Manifest {
            header: header(2, 2),
            chunks: vec![chunk(0, 0), chunk(1, 0x1)],
        };
        assert!(validate_manifest(&m).is_ok());
    }

    #[test]
    fn rejects_num_conns_out_of_range() {
        assert!(validate_header(&header(0, 1)).is_err());
        assert!(validate_header(&header(MAX_NUM_CONNS + 1, 1)).is_err());
    }

    #[test]
    fn rejects_chunk_count_mismatch() {
        let m = Manifest {
            header: header(1, 2),
            chunks: vec![chunk(0, 0)],
        };
        assert!(validate_manifest(&m).is_err());
    }

    #[test]
    fn rejects_unknown_flag_bits() {
        let m = Manifest {
            header: header(1, 1),
            chunks: vec![chunk(0, 0x8000)],
        };
        let err = validate_manifest(&m).unwrap_err();
        assert!(err.contains("flags"));
    }

    #[test]
    fn rejects_missing_connection_coverage() {
        let m = Manifest {
            header: header(2, 1),
            chunks: vec![chunk(0, 0)],
        };
        let err = validate_manifest(&m).unwrap_err();
        assert!(err.contains("connection id 1"));
    }

    #[test]
    fn rejects_conn_id_out_of_range() {
        let m = Manifest {
            header: header(1, 1),
            chunks: vec![chunk(7, 0)],
        };
        assert!(validate_manifest(&m).is_err());
    }
}
