//! Leaf sequence backing array updates.
//!
//! An array under update is a run of leaves. An untouched leaf spans one or
//! more consecutive fields of the original encoding and keeps their bytes
//! verbatim; a touched leaf covers exactly one field and carries its update
//! node. Lookups split untouched spans lazily, so a handful of operations
//! on a wide tuple touches a handful of leaves.

use tuple_pack::Reader;

use crate::error::UpdateError;
use crate::field::{Rep, UpdateField};

pub(crate) struct Leaf<'a> {
    pub count: u32,
    pub field: UpdateField<'a>,
}

impl<'a> Leaf<'a> {
    fn nop(data: &'a [u8], count: u32) -> Leaf<'a> {
        Leaf {
            count,
            field: UpdateField {
                data,
                rep: Rep::Nop,
            },
        }
    }

    fn is_nop(&self) -> bool {
        matches!(self.field.rep, Rep::Nop)
    }
}

pub(crate) struct Rope<'a> {
    leaves: Vec<Leaf<'a>>,
    total: u32,
}

/// Split `data`, an encoding of `count` consecutive values, before value
/// `k`. Returns the byte prefix covering the first `k` values.
fn split_bytes(data: &[u8], k: u32) -> Result<(&[u8], &[u8]), UpdateError> {
    let mut r = Reader::new(data);
    for _ in 0..k {
        r.skip()?;
    }
    Ok(data.split_at(r.x))
}

impl<'a> Rope<'a> {
    /// Single untouched span covering `count` fields encoded in `data`.
    pub fn from_span(data: &'a [u8], count: u32) -> Rope<'a> {
        let leaves = if count > 0 {
            vec![Leaf::nop(data, count)]
        } else {
            Vec::new()
        };
        Rope {
            leaves,
            total: count,
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn leaves(&self) -> &[Leaf<'a>] {
        &self.leaves
    }

    /// Leaf index and in-leaf offset of field `index`.
    fn locate(&self, index: u32) -> (usize, u32) {
        debug_assert!(index < self.total);
        let mut cum = 0;
        for (i, leaf) in self.leaves.iter().enumerate() {
            if index < cum + leaf.count {
                return (i, index - cum);
            }
            cum += leaf.count;
        }
        unreachable!("index within total bounds")
    }

    /// Single-field leaf holding field `index`, splitting the untouched
    /// span around it if needed.
    pub fn extract(&mut self, index: u32) -> Result<&mut UpdateField<'a>, UpdateError> {
        let (i, off) = self.locate(index);
        let leaf = &self.leaves[i];
        if leaf.count == 1 {
            return Ok(&mut self.leaves[i].field);
        }
        let count = leaf.count;
        let data = leaf.field.data;
        let (head, rest) = split_bytes(data, off)?;
        let (mid, tail) = split_bytes(rest, 1)?;
        let mut at = i;
        self.leaves[at] = Leaf::nop(mid, 1);
        if off > 0 {
            self.leaves.insert(at, Leaf::nop(head, off));
            at += 1;
        }
        if off + 1 < count {
            self.leaves.insert(at + 1, Leaf::nop(tail, count - off - 1));
        }
        Ok(&mut self.leaves[at].field)
    }

    /// Insert `field` so that it becomes field `index`; `index` may equal
    /// the current total to append.
    pub fn insert(&mut self, index: u32, field: UpdateField<'a>) -> Result<(), UpdateError> {
        debug_assert!(index <= self.total);
        let at = if index == self.total {
            self.leaves.len()
        } else {
            let (i, off) = self.locate(index);
            if off == 0 {
                i
            } else {
                // Landing inside an untouched span: split it in two.
                let leaf = &self.leaves[i];
                let count = leaf.count;
                let (head, tail) = split_bytes(leaf.field.data, off)?;
                self.leaves[i] = Leaf::nop(head, off);
                self.leaves.insert(i + 1, Leaf::nop(tail, count - off));
                i + 1
            }
        };
        self.leaves.insert(at, Leaf { count: 1, field });
        self.total += 1;
        Ok(())
    }

    /// Remove `n` fields starting at `index`.
    pub fn delete(&mut self, index: u32, n: u32) -> Result<(), UpdateError> {
        debug_assert!(index + n <= self.total);
        let mut left = n;
        while left > 0 {
            let (i, off) = self.locate(index);
            let leaf = &mut self.leaves[i];
            if leaf.count == 1 {
                self.leaves.remove(i);
                self.total -= 1;
                left -= 1;
                continue;
            }
            debug_assert!(leaf.is_nop());
            let count = leaf.count;
            let take = left.min(count - off);
            let (head, rest) = split_bytes(leaf.field.data, off)?;
            let (_, tail) = split_bytes(rest, take)?;
            match (off > 0, off + take < count) {
                (true, true) => {
                    *leaf = Leaf::nop(head, off);
                    self.leaves.insert(i + 1, Leaf::nop(tail, count - off - take));
                }
                (true, false) => *leaf = Leaf::nop(head, off),
                (false, true) => *leaf = Leaf::nop(tail, count - take),
                (false, false) => {
                    self.leaves.remove(i);
                }
            }
            self.total -= take;
            left -= take;
        }
        Ok(())
    }
}
