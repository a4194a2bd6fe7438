//! Little-endian fixed-width integer packing and bounded read/write helpers.
//!
//! Every multi-byte field on the wire is little-endian with no padding.
//! These are free functions, not a trait, because the manifest codec needs
//! precise control over *where* a short read is discovered (see
//! `codec::ParseError`'s field-by-field taxonomy) rather than a single
//! opaque `Read::read_exact` failure.

/// Result of an attempt to encode into a caller-supplied buffer.
///
/// Mirrors the `encode_into(buf, max) -> written | needed_if_insufficient`
/// contract from the manifest codec spec: callers that don't know the
/// output size up front get told exactly how many bytes they need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeInto {
    /// Encoding succeeded; this many bytes were written.
    Written(usize),
    /// The buffer was too small; this many bytes are needed.
    Needed(usize),
}

/// Read a u32 from the front of `buf` if at least 4 bytes are available.
pub fn read_u32_le(buf: &[u8]) -> Option<u32> {
    let arr: [u8; 4] = buf.get(0..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(arr))
}

/// Read a u64 from the front of `buf` if at least 8 bytes are available.
pub fn read_u64_le(buf: &[u8]) -> Option<u64> {
    let arr: [u8; 8] = buf.get(0..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(arr))
}

pub fn write_u32_le(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn write_u64_le(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}
