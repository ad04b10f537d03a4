//! Update tree nodes.
//!
//! Every field of the tuple under update is in one of six states. Untouched
//! fields stay `Nop` and are copied verbatim. A terminal operation turns a
//! field into `Scalar`. The first path operation into a field becomes a
//! `Bar` (the whole path kept flat, no per-level nodes); a second path into
//! the same field splits the bar into real containers and a `Route` for the
//! shared prefix. `Array` and `Map` hold per-child update state.
//!
//! Dispatch convention: `do_op(field, op)` applies `op` to `field`, with
//! the operation's current token (`op.field_no` / `op.key`) selecting a
//! child inside `field` and the lexer holding the rest of the path.
//!
//! `applied` is set when an operation is re-dispatched during a branch
//! split: its argument is already folded against the old value, so the
//! executors must not run again.

use tuple_pack::Writer;

use crate::array::ArrayUpdate;
use crate::bar::BarUpdate;
use crate::error::UpdateError;
use crate::map::MapUpdate;
use crate::op::UpdateOp;
use crate::route::RouteUpdate;
use crate::{array, bar, map, route};

pub(crate) enum Rep<'a> {
    Nop,
    Scalar { op: UpdateOp<'a> },
    Array(ArrayUpdate<'a>),
    Map(MapUpdate<'a>),
    Bar(BarUpdate<'a>),
    Route(RouteUpdate<'a>),
}

pub(crate) struct UpdateField<'a> {
    /// Original encoding of this field.
    pub data: &'a [u8],
    pub rep: Rep<'a>,
}

impl<'a> UpdateField<'a> {
    pub fn nop(data: &'a [u8]) -> UpdateField<'a> {
        UpdateField {
            data,
            rep: Rep::Nop,
        }
    }

    /// Exact encoded size of this field after all updates.
    pub fn sizeof(&self) -> usize {
        match &self.rep {
            Rep::Nop => self.data.len(),
            Rep::Scalar { op } => op.new_field_len,
            Rep::Array(a) => a.sizeof(),
            Rep::Map(m) => m.sizeof(),
            Rep::Bar(b) => b.sizeof(self.data),
            Rep::Route(r) => r.sizeof(self.data),
        }
    }

    /// Write the new encoding; the writer's buffer was sized by [`sizeof`].
    pub fn store(&self, w: &mut Writer<'_>) {
        match &self.rep {
            Rep::Nop => w.raw(self.data),
            Rep::Scalar { op } => crate::op::store_scalar(op, self.data, w),
            Rep::Array(a) => a.store(w),
            Rep::Map(m) => m.store(w),
            Rep::Bar(b) => b.store(self.data, w),
            Rep::Route(r) => r.store(self.data, w),
        }
    }
}

/// Apply one operation to a field.
pub(crate) fn do_op<'a>(
    field: &mut UpdateField<'a>,
    op: &mut UpdateOp<'a>,
    applied: bool,
) -> Result<(), UpdateError> {
    if matches!(field.rep, Rep::Nop) {
        field.rep = Rep::Bar(bar::create(op, field.data, applied)?);
        return Ok(());
    }
    if matches!(field.rep, Rep::Bar(_)) {
        return route::branch_bar(field, op, applied);
    }
    if matches!(field.rep, Rep::Route(_)) {
        return route::do_op(field, op, applied);
    }
    match &mut field.rep {
        Rep::Scalar { .. } => Err(op.err_double()),
        Rep::Array(a) => array::do_op(a, op, applied),
        Rep::Map(m) => map::do_op(m, op, applied),
        _ => unreachable!(),
    }
}
