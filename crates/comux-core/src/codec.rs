//! Manifest codec — byte-exact (de)serialization of the comux container
//! format described in the wire module.
//!
//! `decode` is the general-purpose entry point: it loads every chunk's
//! payload eagerly into an owned buffer, which is what the validator,
//! mutator, and trimmer all want to operate on. `decode_headers` is a
//! second, narrower entry point used by the replay orchestrator: it reads
//! only the fixed-size per-chunk record headers and records each payload's
//! stream offset, letting the orchestrator's controller thread scan a
//! manifest without buffering megabytes of chunk data it may never need to
//! touch on the controller thread (workers read their own payload later).

use std::io::{Read, Seek, SeekFrom};

use crate::bytes_le::{read_u32_le, read_u64_le, write_u32_le, write_u64_le, EncodeInto};
use crate::wire::{
    CHUNK_RECORD_LEN, HEADER_LEN, MAGIC, MAX_CHUNK_LEN, MAX_NUM_CHUNKS, MAX_NUM_CONNS,
    MIN_NUM_CHUNKS, MIN_NUM_CONNS,
};

/// Fixed-size manifest header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub num_conns: u32,
    pub num_chunks: u32,
}

/// A single decoded chunk: its record-header fields plus owned payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub conn_id: u32,
    /// Actual payload length after clamping — see `wire::MAX_CHUNK_LEN`.
    pub len: u64,
    pub sched: u32,
    pub flags: u32,
    pub payload: Vec<u8>,
    /// Stream offset (from the start of the source) where this chunk's
    /// payload begins. Set by both decode entry points; meaningful only
    /// when re-seeking the same source, as the replay orchestrator does.
    pub offset: u64,
}

/// A decoded manifest: header plus its chunk records in array order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub header: Header,
    pub chunks: Vec<Chunk>,
}

/// Header-only record, produced by `decode_headers`. Carries the offset the
/// orchestrator needs to seek back and read the payload later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeaderMeta {
    pub conn_id: u32,
    /// Declared length, clamped to `wire::MAX_CHUNK_LEN`.
    pub len: u64,
    pub sched: u32,
    pub flags: u32,
    pub offset: u64,
}

/// Parse error taxonomy, in the order the decoder discovers them. Different
/// callers recover differently on different kinds — the mutator synthesizes
/// a fresh manifest on any of these, the orchestrator aborts the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected end of input at offset {offset}")]
    Eof { offset: u64 },

    #[error("bad magic: expected {expected:02x?}, found {found:02x?}")]
    BadMagic { expected: [u8; 8], found: [u8; 8] },

    #[error("unsupported manifest version {0}")]
    BadVersion(u32),

    #[error("num_conns {0} out of range [{}, {}]", MIN_NUM_CONNS, MAX_NUM_CONNS)]
    BadNumConns(u32),

    #[error("num_chunks {0} out of range [{}, {}]", MIN_NUM_CHUNKS, MAX_NUM_CHUNKS)]
    BadNumChunks(u32),

    #[error("chunk {index}: bad conn_id (got {conn_id:?}, num_conns {num_conns})")]
    BadConnId {
        index: usize,
        /// `None` when the record was truncated before conn_id could be read.
        conn_id: Option<u32>,
        num_conns: u32,
    },

    #[error("chunk {index}: len field truncated")]
    BadConnLen { index: usize },

    #[error("chunk {index}: sched field truncated")]
    BadConnSched { index: usize },

    #[error("chunk {index}: flags field truncated")]
    BadConnFlags { index: usize },

    #[error("chunk {index}: declared len {declared} but only {actual} bytes present")]
    ConnLenMismatch {
        index: usize,
        declared: u64,
        actual: u64,
    },

    #[error("I/O error: {0}")]
    Io(String),
}

fn io_err(e: std::io::Error) -> ParseError {
    ParseError::Io(e.to_string())
}

/// Read up to `buf.len()` bytes, returning the number actually read before
/// hitting EOF. Unlike `Read::read_exact`, a short read is not itself an
/// error — the caller decides what a short read at this particular point
/// in the format means (clean EOF vs a specific truncated-field kind).
fn read_some<R: Read>(r: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

fn classify_short_record(index: usize, n: usize, num_conns: u32) -> ParseError {
    if n < 4 {
        ParseError::BadConnId {
            index,
            conn_id: None,
            num_conns,
        }
    } else if n < 12 {
        ParseError::BadConnLen { index }
    } else if n < 16 {
        ParseError::BadConnSched { index }
    } else {
        ParseError::BadConnFlags { index }
    }
}

fn parse_header<R: Read + Seek>(r: &mut R) -> Result<Header, ParseError> {
    let start = r.stream_position().map_err(io_err)?;
    let mut buf = [0u8; HEADER_LEN];
    let n = read_some(r, &mut buf).map_err(io_err)?;
    if n < HEADER_LEN {
        return Err(ParseError::Eof {
            offset: start + n as u64,
        });
    }

    let mut found = [0u8; 8];
    found.copy_from_slice(&buf[0..8]);
    if found != MAGIC {
        return Err(ParseError::BadMagic {
            expected: MAGIC,
            found,
        });
    }

    let version = read_u32_le(&buf[8..12]).unwrap();
    let num_conns = read_u32_le(&buf[12..16]).unwrap();
    let num_chunks = read_u32_le(&buf[16..20]).unwrap();

    if version != crate::wire::CURRENT_VERSION {
        return Err(ParseError::BadVersion(version));
    }
    if !(MIN_NUM_CONNS..=MAX_NUM_CONNS).contains(&num_conns) {
        return Err(ParseError::BadNumConns(num_conns));
    }
    if !(MIN_NUM_CHUNKS..=MAX_NUM_CHUNKS).contains(&num_chunks) {
        return Err(ParseError::BadNumChunks(num_chunks));
    }

    Ok(Header {
        version,
        num_conns,
        num_chunks,
    })
}

/// Decode a complete manifest, loading every chunk's payload into an owned
/// buffer. If the stream ends cleanly at a record boundary before
/// `num_chunks` records have been read, decoding still succeeds with the
/// chunks seen so far (§4.1 truncation policy) — callers that need
/// chunk-count agreement use `validate::validate_manifest`.
pub fn decode<R: Read + Seek>(r: &mut R) -> Result<Manifest, ParseError> {
    let header = parse_header(r)?;
    let mut chunks = Vec::new();

    for index in 0..header.num_chunks as usize {
        let mut rec = [0u8; CHUNK_RECORD_LEN];
        let n = read_some(r, &mut rec).map_err(io_err)?;
        if n == 0 {
            break;
        }
        if n < CHUNK_RECORD_LEN {
            return Err(classify_short_record(index, n, header.num_conns));
        }

        let conn_id = read_u32_le(&rec[0..4]).unwrap();
        let declared_len = read_u64_le(&rec[4..12]).unwrap();
        let sched = read_u32_le(&rec[12..16]).unwrap();
        let flags = read_u32_le(&rec[16..20]).unwrap();

        if conn_id >= header.num_conns {
            return Err(ParseError::BadConnId {
                index,
                conn_id: Some(conn_id),
                num_conns: header.num_conns,
            });
        }

        let offset = r.stream_position().map_err(io_err)?;
        let clamped = declared_len.min(MAX_CHUNK_LEN);
        let mut payload = vec![0u8; clamped as usize];
        let actual = read_some(r, &mut payload).map_err(io_err)? as u64;
        payload.truncate(actual as usize);

        if actual < clamped {
            return Err(ParseError::ConnLenMismatch {
                index,
                declared: declared_len,
                actual,
            });
        }

        chunks.push(Chunk {
            conn_id,
            len: actual,
            sched,
            flags,
            payload,
            offset,
        });
    }

    Ok(Manifest { header, chunks })
}

/// Decode only the header and per-chunk record headers, skipping over
/// payload bytes with a seek instead of reading them. Used by the replay
/// orchestrator's controller thread, which needs ordering and offsets but
/// defers the actual payload read to each chunk's worker.
pub fn decode_headers<R: Read + Seek>(r: &mut R) -> Result<(Header, Vec<ChunkHeaderMeta>), ParseError> {
    let header = parse_header(r)?;
    let mut metas = Vec::new();

    for index in 0..header.num_chunks as usize {
        let mut rec = [0u8; CHUNK_RECORD_LEN];
        let n = read_some(r, &mut rec).map_err(io_err)?;
        if n == 0 {
            break;
        }
        if n < CHUNK_RECORD_LEN {
            return Err(classify_short_record(index, n, header.num_conns));
        }

        let conn_id = read_u32_le(&rec[0..4]).unwrap();
        let declared_len = read_u64_le(&rec[4..12]).unwrap();
        let sched = read_u32_le(&rec[12..16]).unwrap();
        let flags = read_u32_le(&rec[16..20]).unwrap();

        if conn_id >= header.num_conns {
            return Err(ParseError::BadConnId {
                index,
                conn_id: Some(conn_id),
                num_conns: header.num_conns,
            });
        }

        let offset = r.stream_position().map_err(io_err)?;
        let clamped = declared_len.min(MAX_CHUNK_LEN);
        r.seek(SeekFrom::Current(clamped as i64)).map_err(io_err)?;

        metas.push(ChunkHeaderMeta {
            conn_id,
            len: clamped,
            sched,
            flags,
            offset,
        });
    }

    Ok((header, metas))
}

/// Read exactly `meta.len` bytes for one chunk, seeking to its recorded
/// offset first. This is the counterpart a worker calls after
/// `decode_headers` to load the payload it was deferred.
pub fn read_chunk_payload<R: Read + Seek>(
    r: &mut R,
    meta: &ChunkHeaderMeta,
) -> std::io::Result<Vec<u8>> {
    r.seek(SeekFrom::Start(meta.offset))?;
    let mut payload = vec![0u8; meta.len as usize];
    let actual = read_some(r, &mut payload)?;
    payload.truncate(actual);
    Ok(payload)
}

/// Total encoded size of `m`, in bytes.
pub fn encoded_len(m: &Manifest) -> usize {
    HEADER_LEN
        + m.chunks
            .iter()
            .map(|c| CHUNK_RECORD_LEN + c.payload.len())
            .sum::<usize>()
}

/// Encode a manifest. Pure function: two calls on structurally identical
/// manifests produce byte-identical output. `num_chunks` is always written
/// as `chunks.len()`, independent of `header.num_chunks` (which only
/// matters for a manifest obtained via a truncated `decode`).
pub fn encode(m: &Manifest) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(m));
    out.extend_from_slice(&MAGIC);
    write_u32_le(&mut out, m.header.version);
    write_u32_le(&mut out, m.header.num_conns);
    write_u32_le(&mut out, m.chunks.len() as u32);

    for c in &m.chunks {
        write_u32_le(&mut out, c.conn_id);
        write_u64_le(&mut out, c.payload.len() as u64);
        write_u32_le(&mut out, c.sched);
        write_u32_le(&mut out, c.flags);
        out.extend_from_slice(&c.payload);
    }

    out
}

/// Encode into a caller-supplied buffer without an intermediate allocation
/// when the buffer is already large enough.
pub fn encode_into(m: &Manifest, buf: &mut [u8]) -> EncodeInto {
    let needed = encoded_len(m);
    if buf.len() < needed {
        return EncodeInto::Needed(needed);
    }
    let bytes = encode(m);
    buf[..needed].copy_from_slice(&bytes);
    EncodeInto::Written(needed)
}
