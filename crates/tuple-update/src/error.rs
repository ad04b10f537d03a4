//! Engine error kinds.
//!
//! Every failure is detected at decode or application time and unwinds the
//! whole call; the error value is the diagnostic the caller's sink receives.
//! The engine itself never prints or logs.

use thiserror::Error;
use tuple_pack::PackError;

#[derive(Debug, Error, PartialEq)]
pub enum UpdateError {
    /// Malformed operation envelope.
    #[error("illegal parameters, {0}")]
    IllegalParams(&'static str),

    /// Unrecognized opcode, or wrong argument count for the opcode.
    #[error("unknown UPDATE operation")]
    UnknownUpdateOp,

    /// An argument's encoded type does not match what the opcode requires.
    #[error("argument type in operation '{opcode}' on field {field} does not match field type: expected {expected}")]
    ArgType {
        opcode: char,
        field: String,
        expected: &'static str,
    },

    #[error("field {0} was not found in the tuple")]
    NoSuchFieldNo(i64),

    #[error("field \"{0}\" was not found in the tuple")]
    NoSuchFieldName(String),

    /// Arithmetic result outside the representable 64-bit ranges.
    #[error("integer overflow in operation '{opcode}' on field {field}")]
    IntegerOverflow { opcode: char, field: String },

    #[error("SPLICE error on field {field}: {reason}")]
    Splice {
        field: String,
        reason: &'static str,
    },

    /// Two operations terminate at the same path.
    #[error("field {field}: double update of the same field")]
    DoubleUpdate { field: String },

    /// Malformed path syntax, or path deeper than the supported ceiling.
    #[error("field {field}: invalid JSON in position {pos}")]
    BadJsonPath { field: String, pos: usize },

    /// A keyed delete asked for more than one field.
    #[error("field {field}: can delete only 1 field from a map in a row")]
    DeleteTooMany { field: String },

    /// Insertion would create a duplicate map key.
    #[error("field {field}: the key exists already")]
    DuplicateKey { field: String },

    /// Structural mismatch between the path and the tuple contents.
    #[error("field {field}: {reason}")]
    Field { field: String, reason: String },

    /// Malformed MessagePack in the tuple or the operation batch.
    #[error(transparent)]
    Pack(#[from] PackError),
}

impl UpdateError {
    /// Whether upsert's `suppress_errors` mode may skip the failed
    /// operation and keep the rest of the batch.
    ///
    /// Decode-class failures (malformed envelope, unknown opcode, bad path
    /// syntax, broken MessagePack) stay fatal; application-class failures
    /// are per-operation and suppressible.
    pub fn is_suppressible(&self) -> bool {
        !matches!(
            self,
            UpdateError::IllegalParams(_)
                | UpdateError::UnknownUpdateOp
                | UpdateError::BadJsonPath { .. }
                | UpdateError::Pack(_)
        )
    }
}
