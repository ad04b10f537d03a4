//! Map update node.
//!
//! Pairs are kept as runs of untouched bytes plus per-pair nodes for
//! touched values, in original order; pairs inserted by this update are
//! stored separately and written out right after the header. Only string
//! keys participate in matching, other key types are copied verbatim.

use tuple_pack::{sizeof_map_hdr, sizeof_str_hdr, MpType, Reader, Writer};

use crate::arith;
use crate::error::UpdateError;
use crate::field::{self, Rep, UpdateField};
use crate::op::{OpArg, OpKind, UpdateOp};

enum MapItem<'a> {
    /// `pairs` consecutive untouched pairs, encoded verbatim.
    Untouched { pairs: u32, data: &'a [u8] },
    /// One pair whose value is under update; the key encoding is kept.
    Pair {
        key: &'a [u8],
        key_data: &'a [u8],
        field: UpdateField<'a>,
    },
}

struct NewPair<'a> {
    key: &'a str,
    op: UpdateOp<'a>,
}

pub(crate) struct MapUpdate<'a> {
    /// Pairs surviving from the original encoding.
    count: u32,
    items: Vec<MapItem<'a>>,
    new_pairs: Vec<NewPair<'a>>,
    /// One keyed delete per map per batch.
    key_deleted: bool,
}

/// Where a key lives in the map, if anywhere.
enum Find {
    Touched(usize),
    /// Pair `pair` of the untouched run at `items[item]`, with byte offsets
    /// of its key, value and value end inside the run.
    InRun {
        item: usize,
        pair: u32,
        key_start: usize,
        val_start: usize,
        val_end: usize,
    },
    Missing,
}

impl<'a> MapUpdate<'a> {
    pub fn new(data: &'a [u8]) -> Result<MapUpdate<'a>, UpdateError> {
        let mut r = Reader::new(data);
        let count = r.read_map_hdr()?;
        let items = if count > 0 {
            vec![MapItem::Untouched {
                pairs: count,
                data: &data[r.x..],
            }]
        } else {
            Vec::new()
        };
        Ok(MapUpdate {
            count,
            items,
            new_pairs: Vec::new(),
            key_deleted: false,
        })
    }

    fn position(&self, key: &str) -> Result<Find, UpdateError> {
        for (i, item) in self.items.iter().enumerate() {
            match item {
                MapItem::Pair { key: k, .. } => {
                    if *k == key.as_bytes() {
                        return Ok(Find::Touched(i));
                    }
                }
                MapItem::Untouched { pairs, data } => {
                    let mut r = Reader::new(data);
                    for j in 0..*pairs {
                        let key_start = r.x;
                        let matches = r.type_of()? == MpType::Str
                            && r.read_str_bytes()? == key.as_bytes();
                        if !matches && r.x == key_start {
                            r.skip()?;
                        }
                        let val_start = r.x;
                        r.skip()?;
                        if matches {
                            return Ok(Find::InRun {
                                item: i,
                                pair: j,
                                key_start,
                                val_start,
                                val_end: r.x,
                            });
                        }
                    }
                }
            }
        }
        Ok(Find::Missing)
    }

    fn new_pair(&self, key: &str) -> Option<&NewPair<'a>> {
        self.new_pairs.iter().find(|p| p.key == key)
    }

    /// Turn the found in-run pair into a touched one and return its value
    /// node; splits the run around it.
    fn touch(&mut self, find: &Find) -> &mut UpdateField<'a> {
        match *find {
            Find::Touched(i) => match &mut self.items[i] {
                MapItem::Pair { field, .. } => field,
                MapItem::Untouched { .. } => unreachable!(),
            },
            Find::InRun {
                item,
                pair,
                key_start,
                val_start,
                val_end,
            } => {
                let (pairs, data) = match &self.items[item] {
                    MapItem::Untouched { pairs, data } => (*pairs, *data),
                    MapItem::Pair { .. } => unreachable!(),
                };
                let key_enc = &data[key_start..val_start];
                let touched = MapItem::Pair {
                    key: strip_str_hdr(key_enc),
                    key_data: key_enc,
                    field: UpdateField::nop(&data[val_start..val_end]),
                };
                let mut at = item;
                self.items[at] = touched;
                if pair > 0 {
                    self.items.insert(
                        at,
                        MapItem::Untouched {
                            pairs: pair,
                            data: &data[..key_start],
                        },
                    );
                    at += 1;
                }
                if pair + 1 < pairs {
                    self.items.insert(
                        at + 1,
                        MapItem::Untouched {
                            pairs: pairs - pair - 1,
                            data: &data[val_end..],
                        },
                    );
                }
                match &mut self.items[at] {
                    MapItem::Pair { field, .. } => field,
                    MapItem::Untouched { .. } => unreachable!(),
                }
            }
            Find::Missing => unreachable!(),
        }
    }

    /// Remove the found in-run pair.
    fn remove(&mut self, find: &Find) {
        let Find::InRun {
            item,
            pair,
            key_start,
            val_end,
            ..
        } = *find
        else {
            unreachable!()
        };
        let (pairs, data) = match &self.items[item] {
            MapItem::Untouched { pairs, data } => (*pairs, *data),
            MapItem::Pair { .. } => unreachable!(),
        };
        match (pair > 0, pair + 1 < pairs) {
            (true, true) => {
                self.items[item] = MapItem::Untouched {
                    pairs: pair,
                    data: &data[..key_start],
                };
                self.items.insert(
                    item + 1,
                    MapItem::Untouched {
                        pairs: pairs - pair - 1,
                        data: &data[val_end..],
                    },
                );
            }
            (true, false) => {
                self.items[item] = MapItem::Untouched {
                    pairs: pair,
                    data: &data[..key_start],
                };
            }
            (false, true) => {
                self.items[item] = MapItem::Untouched {
                    pairs: pairs - 1,
                    data: &data[val_end..],
                };
            }
            (false, false) => {
                self.items.remove(item);
            }
        }
        self.count -= 1;
    }

    pub fn sizeof(&self) -> usize {
        let total = self.count + self.new_pairs.len() as u32;
        let mut size = sizeof_map_hdr(total);
        for p in &self.new_pairs {
            size += sizeof_str_hdr(p.key.len()) + p.key.len() + p.op.new_field_len;
        }
        for item in &self.items {
            size += match item {
                MapItem::Untouched { data, .. } => data.len(),
                MapItem::Pair {
                    key_data, field, ..
                } => key_data.len() + field.sizeof(),
            };
        }
        size
    }

    pub fn store(&self, w: &mut Writer<'_>) {
        w.map_hdr(self.count + self.new_pairs.len() as u32);
        for p in &self.new_pairs {
            w.str_hdr(p.key.len());
            w.raw(p.key.as_bytes());
            crate::op::store_scalar(&p.op, &[], w);
        }
        for item in &self.items {
            match item {
                MapItem::Untouched { data, .. } => w.raw(data),
                MapItem::Pair {
                    key_data, field, ..
                } => {
                    w.raw(key_data);
                    field.store(w);
                }
            }
        }
    }
}

fn strip_str_hdr(key_enc: &[u8]) -> &[u8] {
    let mut r = Reader::new(key_enc);
    match r.read_str_bytes() {
        Ok(bytes) => bytes,
        Err(_) => key_enc,
    }
}

pub(crate) fn do_op<'a>(
    m: &mut MapUpdate<'a>,
    op: &mut UpdateOp<'a>,
    applied: bool,
) -> Result<(), UpdateError> {
    let Some(key) = op.key else {
        return Err(op.err_field("can not update a map by a non-string key"));
    };
    if !op.is_term() {
        if m.new_pair(key).is_some() {
            return Err(op.err_double());
        }
        let find = m.position(key)?;
        if matches!(find, Find::Missing) {
            return Err(op.err_no_such_field());
        }
        let child = m.touch(&find);
        op.consume_token()?;
        return field::do_op(child, op, applied);
    }
    match op.opcode.kind() {
        OpKind::Insert => {
            if m.new_pair(key).is_some() || !matches!(m.position(key)?, Find::Missing) {
                return Err(op.err_duplicate());
            }
            m.new_pairs.push(NewPair {
                key,
                op: op.clone(),
            });
            Ok(())
        }
        OpKind::Set => {
            if m.new_pair(key).is_some() {
                return Err(op.err_double());
            }
            match m.position(key)? {
                Find::Missing => {
                    // Setting a missing key inserts it.
                    m.new_pairs.push(NewPair {
                        key,
                        op: op.clone(),
                    });
                    Ok(())
                }
                find => {
                    let child = m.touch(&find);
                    if !matches!(child.rep, Rep::Nop) {
                        return Err(op.err_double());
                    }
                    child.rep = Rep::Scalar { op: op.clone() };
                    Ok(())
                }
            }
        }
        OpKind::Delete => {
            let OpArg::Delete { count } = op.arg else {
                unreachable!()
            };
            if count != 1 || m.key_deleted {
                return Err(op.err_delete1());
            }
            if m.new_pair(key).is_some() {
                return Err(op.err_double());
            }
            match m.position(key)? {
                Find::Missing => Err(op.err_no_such_field()),
                Find::Touched(_) => Err(op.err_double()),
                find => {
                    m.remove(&find);
                    m.key_deleted = true;
                    Ok(())
                }
            }
        }
        OpKind::Arith | OpKind::Bit | OpKind::Splice => {
            if m.new_pair(key).is_some() {
                return Err(op.err_double());
            }
            match m.position(key)? {
                Find::Missing => Err(op.err_no_such_field()),
                find => {
                    let child = m.touch(&find);
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
    }
}

/// Give a map node a preconstructed child for `key`, leaving the rest
/// untouched. Used when a flat path node splits at a map level.
pub(crate) fn with_child<'a>(
    data: &'a [u8],
    key: &'a str,
    child: UpdateField<'a>,
) -> Result<MapUpdate<'a>, UpdateError> {
    let mut m = MapUpdate::new(data)?;
    let find = m.position(key)?;
    debug_assert!(!matches!(find, Find::Missing));
    let slot = m.touch(&find);
    debug_assert_eq!(slot.data.as_ptr(), child.data.as_ptr());
    *slot = child;
    Ok(m)
}
