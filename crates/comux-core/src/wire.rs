//! comux wire format — on-wire layout for the manifest container.
//!
//! These constants and field orders ARE the protocol. There is a single
//! current version; changing field order or width here is a breaking
//! change. All integers are little-endian, there is no padding, and no
//! alignment is assumed — records are packed byte sequences, not
//! `#[repr(C)]` overlays, because the decoder must discover and report
//! validation failures in a precise field order (see `codec::ParseError`).

use static_assertions::const_assert_eq;

/// Magic literal identifying a comux manifest. ASCII, no trailing NUL.
pub const MAGIC: [u8; 8] = *b"comux!!!";

/// The only wire-format version this implementation recognizes.
pub const CURRENT_VERSION: u32 = 0;

/// Header size in bytes: magic(8) + version(4) + num_conns(4) + num_chunks(4).
pub const HEADER_LEN: usize = 20;

/// Chunk record header size in bytes: conn_id(4) + len(8) + sched(4) + flags(4).
pub const CHUNK_RECORD_LEN: usize = 20;

const_assert_eq!(HEADER_LEN, 8 + 4 + 4 + 4);
const_assert_eq!(CHUNK_RECORD_LEN, 4 + 8 + 4 + 4);

/// Minimum/maximum number of logical connections a manifest may declare.
pub const MIN_NUM_CONNS: u32 = 1;
pub const MAX_NUM_CONNS: u32 = 4096;

/// Minimum/maximum number of chunk records a manifest may declare.
pub const MIN_NUM_CHUNKS: u32 = 1;
pub const MAX_NUM_CHUNKS: u32 = 8192;

/// Maximum payload length for a single chunk. Larger declared lengths are
/// clamped when read.
pub const MAX_CHUNK_LEN: u64 = 524_288;

/// `flags` bit: the worker should read and forward a response after sending.
pub const AWAIT_RESPONSE: u32 = 0x1;

/// `flags` bit: do not half-close the connection after the final chunk.
pub const NO_SHUTDOWN: u32 = 0x2;

/// All flag bits recognized by this version. Bits outside this mask are
/// stripped (never errored on) by the codec; the validator is the layer
/// that rejects them.
pub const KNOWN_FLAGS_MASK: u32 = AWAIT_RESPONSE | NO_SHUTDOWN;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_is_eight_ascii_bytes() {
        assert_eq!(MAGIC.len(), 8);
        assert!(MAGIC.iter().all(|b| b.is_ascii()));
    }

    #[test]
    fn flag_bits_do_not_overlap() {
        assert_eq!(AWAIT_RESPONSE & NO_SHUTDOWN, 0);
        assert_eq!(KNOWN_FLAGS_MASK, 0x3);
    }
}
