//! Codec error type.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum PackError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("expected an array")]
    NotArr,
    #[error("expected a map")]
    NotMap,
    #[error("expected a string")]
    NotStr,
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
    #[error("unsupported MessagePack marker 0x{0:02x}")]
    BadMarker(u8),
}
