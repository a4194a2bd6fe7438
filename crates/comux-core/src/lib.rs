//! comux-core — the manifest wire format, codec, and validator shared by
//! every other comux crate.

pub mod bytes_le;
pub mod codec;
pub mod validate;
pub mod wire;

pub use codec::{Chunk, ChunkHeaderMeta, Header, Manifest, ParseError};
