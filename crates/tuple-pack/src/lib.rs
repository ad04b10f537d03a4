//! MessagePack primitives for binary tuples.
//!
//! A tuple is one encoded MessagePack array whose elements are fields. This
//! crate provides the three capabilities the update engine consumes:
//!
//! - [`Reader`] — a zero-copy cursor: probe types, read scalars and headers,
//!   skip whole values, capture one encoded value verbatim as a span.
//! - [`Writer`] plus the `sizeof_*` helpers — exact encoded sizes up front,
//!   then writes into a caller-sized output slice (two-phase store contract).
//! - [`Builder`] — growable encode helpers for constructing tuples.

pub mod builder;
pub mod error;
pub mod reader;
pub mod writer;

pub use builder::Builder;
pub use error::PackError;
pub use reader::{MpType, Reader};
pub use writer::{
    sizeof_array_hdr, sizeof_f32, sizeof_f64, sizeof_int, sizeof_map_hdr, sizeof_str_hdr,
    sizeof_uint, Writer,
};
