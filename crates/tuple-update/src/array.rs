//! Array update node.
//!
//! Wraps a [`Rope`] of leaves over the array's items; the header is
//! re-encoded at store time since inserts and deletes change the count.

use tuple_pack::{sizeof_array_hdr, Reader, Writer};

use crate::arith;
use crate::error::UpdateError;
use crate::field::{self, Rep, UpdateField};
use crate::op::{OpArg, OpKind, UpdateOp};
use crate::rope::Rope;

pub(crate) struct ArrayUpdate<'a> {
    rope: Rope<'a>,
}

impl<'a> ArrayUpdate<'a> {
    pub fn new(data: &'a [u8]) -> Result<ArrayUpdate<'a>, UpdateError> {
        let mut r = Reader::new(data);
        let count = r.read_arr_hdr()?;
        Ok(ArrayUpdate {
            rope: Rope::from_span(&data[r.x..], count),
        })
    }

    pub fn sizeof(&self) -> usize {
        let mut size = sizeof_array_hdr(self.rope.total());
        for leaf in self.rope.leaves() {
            size += match &leaf.field.rep {
                Rep::Nop => leaf.field.data.len(),
                _ => leaf.field.sizeof(),
            };
        }
        size
    }

    pub fn store(&self, w: &mut Writer<'_>) {
        w.arr_hdr(self.rope.total());
        for leaf in self.rope.leaves() {
            leaf.field.store(w);
        }
    }
}

/// Resolve a possibly negative item selector against the current count.
/// Inserts address one slot past the end, so a negative index counts from
/// `count + 1` and `-1` appends.
fn resolve_index(op: &UpdateOp<'_>, count: u32, insert: bool) -> Result<u32, UpdateError> {
    let no = if op.field_no >= 0 {
        op.field_no
    } else if insert {
        count as i64 + 1 + op.field_no
    } else {
        count as i64 + op.field_no
    };
    let in_range = no >= 0 && (no < count as i64 || (insert && no == count as i64));
    if in_range {
        Ok(no as u32)
    } else {
        Err(op.err_no_such_field())
    }
}

pub(crate) fn do_op<'a>(
    a: &mut ArrayUpdate<'a>,
    op: &mut UpdateOp<'a>,
    applied: bool,
) -> Result<(), UpdateError> {
    if op.key.is_some() {
        return Err(op.err_field("can not update an array by a non-integer index"));
    }
    let count = a.rope.total();
    if !op.is_term() {
        let pos = resolve_index(op, count, false)?;
        let child = a.rope.extract(pos)?;
        op.consume_token()?;
        return field::do_op(child, op, applied);
    }
    match op.opcode.kind() {
        OpKind::Insert => {
            let pos = resolve_index(op, count, true)?;
            a.rope.insert(
                pos,
                UpdateField {
                    data: &[],
                    rep: Rep::Scalar { op: op.clone() },
                },
            )
        }
        OpKind::Delete => {
            let OpArg::Delete { count: del } = op.arg else {
                unreachable!()
            };
            if del == 0 {
                return Err(op.err_field("cannot delete 0 fields"));
            }
            let pos = resolve_index(op, count, false)?;
            let del = del.min(count - pos);
            op.arg = OpArg::Delete { count: del };
            a.rope.delete(pos, del)
        }
        OpKind::Set => {
            let pos = resolve_index(op, count, false)?;
            let child = a.rope.extract(pos)?;
            if !matches!(child.rep, Rep::Nop) {
                return Err(op.err_double());
            }
            child.rep = Rep::Scalar { op: op.clone() };
            Ok(())
        }
        OpKind::Arith | OpKind::Bit | OpKind::Splice => {
            let pos = resolve_index(op, count, false)?;
            let child = a.rope.extract(pos)?;
            if !matches!(child.rep, Rep::Nop) {
                return Err(op.err_double());
            }
            if !applied {
                match op.opcode.kind() {
                    OpKind::Arith => arith::do_arith(op, child.data)?,
                    OpKind::Bit => arith::do_bit(op, child.data)?,
                    OpKind::Splice => arith::do_splice(op, child.data)?,
                    _ => unreachable!(),
                }
            }
            child.rep = Rep::Scalar { op: op.clone() };
            Ok(())
        }
    }
}

/// Give an array node a preconstructed child, leaving the rest untouched.
/// Used when a flat path node splits at an array level.
pub(crate) fn with_child<'a>(
    data: &'a [u8],
    pos: u32,
    child: UpdateField<'a>,
) -> Result<ArrayUpdate<'a>, UpdateError> {
    let mut a = ArrayUpdate::new(data)?;
    let slot = a.rope.extract(pos)?;
    debug_assert_eq!(slot.data.as_ptr(), child.data.as_ptr());
    *slot = child;
    Ok(a)
}
