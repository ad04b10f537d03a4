//! Tuple update engine over MessagePack.
//!
//! Applies a batch of update operations (`=` `!` `#` `+` `-` `&` `|` `^`
//! `:`) to an encoded tuple without decoding it: untouched fields are
//! copied verbatim and every operation keeps borrowed slices of its
//! input. The output is produced in two passes, an exact size
//! computation followed by a store into a buffer of that size.
//!
//! [`apply_update`] fails on the first bad operation; [`apply_upsert`]
//! can instead skip operations that fail against this particular tuple
//! while still rejecting operations that are malformed in themselves.

mod arith;
mod array;
mod bar;
mod dict;
mod error;
mod field;
mod map;
mod op;
mod path;
mod rope;
mod route;

pub use dict::{field_name_hash, FieldDictionary};
pub use error::UpdateError;
pub use path::MAX_PATH_DEPTH;

use tuple_pack::{Reader, Writer};

use crate::array::ArrayUpdate;
use crate::field::{Rep, UpdateField};

/// Apply an encoded operation batch to an encoded tuple.
///
/// `tuple` must be a MessagePack array of fields and `ops` a MessagePack
/// array of operations. `index_base` shifts every numeric field selector
/// (1 for one-based clients, 0 for zero-based). `dict` resolves top-level
/// field names; use `&()` when names are not supported.
pub fn apply_update(
    tuple: &[u8],
    ops: &[u8],
    index_base: i64,
    dict: &dyn FieldDictionary,
) -> Result<Vec<u8>, UpdateError> {
    execute(tuple, ops, index_base, dict, false)
}

/// Like [`apply_update`], but with upsert semantics when `suppress_errors`
/// is set: operations that are well-formed yet fail against this tuple
/// (missing field, wrong value type, overflow) are skipped, while decode
/// errors still fail the whole batch.
pub fn apply_upsert(
    tuple: &[u8],
    ops: &[u8],
    index_base: i64,
    dict: &dyn FieldDictionary,
    suppress_errors: bool,
) -> Result<Vec<u8>, UpdateError> {
    execute(tuple, ops, index_base, dict, suppress_errors)
}

fn execute(
    tuple: &[u8],
    ops: &[u8],
    index_base: i64,
    dict: &dyn FieldDictionary,
    suppress: bool,
) -> Result<Vec<u8>, UpdateError> {
    let mut root = UpdateField {
        data: tuple,
        rep: Rep::Array(ArrayUpdate::new(tuple)?),
    };

    let mut r = Reader::new(ops);
    let op_count = r.read_arr_hdr()?;
    for _ in 0..op_count {
        let start = r.x;
        let mut op = match op::decode_op(&mut r, index_base, dict) {
            Ok(op) => op,
            Err(e) if suppress && e.is_suppressible() => {
                // Skip the whole operation array and move on.
                r.x = start;
                r.skip()?;
                continue;
            }
            Err(e) => return Err(e),
        };
        match field::do_op(&mut root, &mut op, false) {
            Ok(()) => {}
            Err(e) if suppress && e.is_suppressible() => {}
            Err(e) => return Err(e),
        }
    }

    let size = root.sizeof();
    let mut out = vec![0u8; size];
    let mut w = Writer::new(&mut out);
    root.store(&mut w);
    debug_assert_eq!(w.written(), size);
    Ok(out)
}
