//! Flat path node.
//!
//! The first operation descending into a field does not build containers
//! for every path level. It walks the encoding once, remembers the byte
//! span of its terminal point and the header of the containing array or
//! map, and becomes a single `Bar` node. Size and store then work on raw
//! byte spans. Only when a second operation enters the same field does the
//! bar split into real container nodes (see the route module).

use tuple_pack::{sizeof_array_hdr, sizeof_map_hdr, sizeof_str_hdr, MpType, Reader, Writer};

use crate::arith;
use crate::error::UpdateError;
use crate::op::{OpArg, OpKind, UpdateOp};

pub(crate) enum BarKind<'a> {
    /// Terminal byte span in the host field's data. Replacements cover the
    /// old value, inserts have `len == 0` at the insertion point, deletes
    /// cover everything removed (keys included for maps).
    Point { offset: usize, len: usize },
    /// Insert (or set) of a key the map does not have.
    NewKey { key: &'a str },
}

pub(crate) struct BarUpdate<'a> {
    /// The operation, argument already folded where it had an executor.
    pub op: UpdateOp<'a>,
    /// Byte offset in `op.path` where the in-field path begins.
    pub path_start: usize,
    parent_offset: usize,
    parent_hdr_len: usize,
    parent_count: u32,
    parent_is_map: bool,
    kind: BarKind<'a>,
}

/// Walk `op`'s remaining path through `data` and build the bar.
pub(crate) fn create<'a>(
    op: &mut UpdateOp<'a>,
    data: &'a [u8],
    applied: bool,
) -> Result<BarUpdate<'a>, UpdateError> {
    let path_start = op.tail_start;
    let mut r = Reader::new(data);
    loop {
        match r.type_of()? {
            MpType::Array => {
                let cont_offset = r.x;
                let count = r.read_arr_hdr()?;
                let hdr_len = r.x - cont_offset;
                if op.key.is_some() {
                    return Err(op.err_field("can not update an array by a non-integer index"));
                }
                if op.is_term() {
                    let kind = terminal_array(op, &mut r, count, applied)?;
                    return Ok(BarUpdate {
                        op: op.clone(),
                        path_start,
                        parent_offset: cont_offset,
                        parent_hdr_len: hdr_len,
                        parent_count: count,
                        parent_is_map: false,
                        kind,
                    });
                }
                if op.field_no >= count as i64 {
                    return Err(op.err_no_such_field());
                }
                for _ in 0..op.field_no {
                    r.skip()?;
                }
                op.consume_token()?;
            }
            MpType::Map => {
                let cont_offset = r.x;
                let count = r.read_map_hdr()?;
                let hdr_len = r.x - cont_offset;
                let Some(key) = op.key else {
                    return Err(op.err_field("can not update a map by a non-string key"));
                };
                if op.is_term() {
                    let kind = terminal_map(op, &mut r, count, key, applied)?;
                    return Ok(BarUpdate {
                        op: op.clone(),
                        path_start,
                        parent_offset: cont_offset,
                        parent_hdr_len: hdr_len,
                        parent_count: count,
                        parent_is_map: true,
                        kind,
                    });
                }
                if !seek_pair(&mut r, count, key)? {
                    return Err(op.err_no_such_field());
                }
                op.consume_token()?;
            }
            _ => return Err(op.err_field("can not update a scalar by path")),
        }
    }
}

/// Position `r` at the value of the pair keyed `key`, if the map has it.
pub(crate) fn seek_pair(r: &mut Reader<'_>, count: u32, key: &str) -> Result<bool, UpdateError> {
    for _ in 0..count {
        let key_start = r.x;
        let hit = r.type_of()? == MpType::Str && r.read_str_bytes()? == key.as_bytes();
        if !hit && r.x == key_start {
            r.skip()?;
        }
        if hit {
            return Ok(true);
        }
        r.skip()?;
    }
    Ok(false)
}

fn terminal_array<'a>(
    op: &mut UpdateOp<'a>,
    r: &mut Reader<'a>,
    count: u32,
    applied: bool,
) -> Result<BarKind<'a>, UpdateError> {
    let index = op.field_no;
    match op.opcode.kind() {
        OpKind::Insert => {
            if index > count as i64 {
                return Err(op.err_no_such_field());
            }
            for _ in 0..index {
                r.skip()?;
            }
            Ok(BarKind::Point {
                offset: r.x,
                len: 0,
            })
        }
        OpKind::Delete => {
            let OpArg::Delete { count: del } = op.arg else {
                unreachable!()
            };
            if del == 0 {
                return Err(op.err_field("cannot delete 0 fields"));
            }
            if index >= count as i64 {
                return Err(op.err_no_such_field());
            }
            for _ in 0..index {
                r.skip()?;
            }
            let start = r.x;
            let del = del.min(count - index as u32);
            for _ in 0..del {
                r.skip()?;
            }
            op.arg = OpArg::Delete { count: del };
            Ok(BarKind::Point {
                offset: start,
                len: r.x - start,
            })
        }
        OpKind::Set | OpKind::Arith | OpKind::Bit | OpKind::Splice => {
            if index >= count as i64 {
                return Err(op.err_no_such_field());
            }
            for _ in 0..index {
                r.skip()?;
            }
            let start = r.x;
            r.skip()?;
            let point = &r.data[start..r.x];
            execute(op, point, applied)?;
            Ok(BarKind::Point {
                offset: start,
                len: point.len(),
            })
        }
    }
}

fn terminal_map<'a>(
    op: &mut UpdateOp<'a>,
    r: &mut Reader<'a>,
    count: u32,
    key: &'a str,
    applied: bool,
) -> Result<BarKind<'a>, UpdateError> {
    let mut found = None;
    {
        let mut probe = r.clone();
        for _ in 0..count {
            let key_start = probe.x;
            let hit =
                probe.type_of()? == MpType::Str && probe.read_str_bytes()? == key.as_bytes();
            if !hit && probe.x == key_start {
                probe.skip()?;
            }
            let val_start = probe.x;
            probe.skip()?;
            if hit {
                found = Some((key_start, val_start, probe.x));
                break;
            }
        }
    }
    match op.opcode.kind() {
        OpKind::Insert => {
            if found.is_some() {
                return Err(op.err_duplicate());
            }
            Ok(BarKind::NewKey { key })
        }
        OpKind::Set => match found {
            Some((_, val_start, val_end)) => {
                Ok(BarKind::Point {
                    offset: val_start,
                    len: val_end - val_start,
                })
            }
            None => Ok(BarKind::NewKey { key }),
        },
        OpKind::Delete => {
            let OpArg::Delete { count: del } = op.arg else {
                unreachable!()
            };
            if del != 1 {
                return Err(op.err_delete1());
            }
            match found {
                Some((key_start, _, val_end)) => Ok(BarKind::Point {
                    offset: key_start,
                    len: val_end - key_start,
                }),
                None => Err(op.err_no_such_field()),
            }
        }
        OpKind::Arith | OpKind::Bit | OpKind::Splice => match found {
            Some((_, val_start, val_end)) => {
                execute(op, &r.data[val_start..val_end], applied)?;
                Ok(BarKind::Point {
                    offset: val_start,
                    len: val_end - val_start,
                })
            }
            None => Err(op.err_no_such_field()),
        },
    }
}

fn execute(op: &mut UpdateOp<'_>, old: &[u8], applied: bool) -> Result<(), UpdateError> {
    if applied {
        return Ok(());
    }
    match op.opcode.kind() {
        OpKind::Arith => arith::do_arith(op, old),
        OpKind::Bit => arith::do_bit(op, old),
        OpKind::Splice => arith::do_splice(op, old),
        _ => Ok(()),
    }
}

impl<'a> BarUpdate<'a> {
    fn hdr_diff(&self, new_count: u32) -> isize {
        let new = if self.parent_is_map {
            sizeof_map_hdr(new_count)
        } else {
            sizeof_array_hdr(new_count)
        };
        new as isize - self.parent_hdr_len as isize
    }

    pub fn sizeof(&self, data: &[u8]) -> usize {
        let base = data.len() as isize;
        let size = match (&self.kind, self.op.opcode.kind()) {
            (BarKind::NewKey { key }, _) => {
                base + (sizeof_str_hdr(key.len()) + key.len() + self.op.new_field_len) as isize
                    + self.hdr_diff(self.parent_count + 1)
            }
            (BarKind::Point { len, .. }, OpKind::Insert) => {
                debug_assert_eq!(*len, 0);
                base + self.op.new_field_len as isize + self.hdr_diff(self.parent_count + 1)
            }
            (BarKind::Point { len, .. }, OpKind::Delete) => {
                let OpArg::Delete { count: del } = self.op.arg else {
                    unreachable!()
                };
                base - *len as isize + self.hdr_diff(self.parent_count - del)
            }
            (BarKind::Point { len, .. }, _) => {
                base - *len as isize + self.op.new_field_len as isize
            }
        };
        size as usize
    }

    pub fn store(&self, data: &[u8], w: &mut Writer<'_>) {
        let hdr_end = self.parent_offset + self.parent_hdr_len;
        let write_hdr = |w: &mut Writer<'_>, n: u32| {
            if self.parent_is_map {
                w.map_hdr(n);
            } else {
                w.arr_hdr(n);
            }
        };
        match (&self.kind, self.op.opcode.kind()) {
            (BarKind::NewKey { key }, _) => {
                w.raw(&data[..self.parent_offset]);
                write_hdr(w, self.parent_count + 1);
                w.str_hdr(key.len());
                w.raw(key.as_bytes());
                crate::op::store_scalar(&self.op, &[], w);
                w.raw(&data[hdr_end..]);
            }
            (BarKind::Point { offset, .. }, OpKind::Insert) => {
                w.raw(&data[..self.parent_offset]);
                write_hdr(w, self.parent_count + 1);
                w.raw(&data[hdr_end..*offset]);
                crate::op::store_scalar(&self.op, &[], w);
                w.raw(&data[*offset..]);
            }
            (BarKind::Point { offset, len }, OpKind::Delete) => {
                let OpArg::Delete { count: del } = self.op.arg else {
                    unreachable!()
                };
                w.raw(&data[..self.parent_offset]);
                write_hdr(w, self.parent_count - del);
                w.raw(&data[hdr_end..*offset]);
                w.raw(&data[offset + len..]);
            }
            (BarKind::Point { offset, len }, _) => {
                w.raw(&data[..*offset]);
                crate::op::store_scalar(&self.op, &data[*offset..offset + len], w);
                w.raw(&data[offset + len..]);
            }
        }
    }
}
