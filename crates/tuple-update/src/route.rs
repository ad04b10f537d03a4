//! Route node and branch splitting.
//!
//! A route covers the path prefix shared by several operations: the bytes
//! outside `next_hop` are untouched, so size and store need only the hop's
//! offset. Routes come into being when a second operation enters a field
//! already holding a bar: the shared token prefix becomes (or extends) a
//! route and real container nodes are built at the first diverging token.
//!
//! When an already-executed operation is re-anchored during a split it is
//! re-dispatched with `applied` set, so its folded argument is kept as is.

use tuple_pack::{MpType, Reader, Writer};

use crate::array::{self, ArrayUpdate};
use crate::bar::{self, BarUpdate};
use crate::error::UpdateError;
use crate::field::{self, Rep, UpdateField};
use crate::map::{self, MapUpdate};
use crate::op::UpdateOp;
use crate::path::{PathLexer, PathToken};

pub(crate) struct RouteUpdate<'a> {
    /// Shared path tokens, exactly as written in the originating operation.
    prefix: &'a str,
    /// Byte offset of `next_hop`'s data inside the host field's data.
    hop_offset: usize,
    next_hop: Box<UpdateField<'a>>,
}

impl<'a> RouteUpdate<'a> {
    pub fn sizeof(&self, data: &[u8]) -> usize {
        data.len() - self.next_hop.data.len() + self.next_hop.sizeof()
    }

    pub fn store(&self, data: &[u8], w: &mut Writer<'_>) {
        w.raw(&data[..self.hop_offset]);
        self.next_hop.store(w);
        w.raw(&data[self.hop_offset + self.next_hop.data.len()..]);
    }
}

/// Outcome of matching an operation's path against stored tokens.
enum Cmp<'a> {
    /// All stored tokens matched and the operation goes deeper; its next
    /// token starts at `ns`.
    Follow { ns: usize },
    /// One path is a prefix of the other: same target, twice.
    Double,
    Diverge {
        /// Tokens shared by both paths.
        matched: Vec<PathToken<'a>>,
        /// First differing stored token, its start and the offset right
        /// after it (both in the stored tokens' source string).
        div: PathToken<'a>,
        div_start: usize,
        div_end: usize,
    },
}

fn tokens_eq(a: PathToken<'_>, b: PathToken<'_>) -> bool {
    match (a, b) {
        (PathToken::Index(x), PathToken::Index(y)) => x == y,
        (PathToken::Key(x), PathToken::Key(y)) => x == y,
        _ => false,
    }
}

/// Match `op`'s remaining path against the tokens of `old_src` starting at
/// `old_start`.
fn compare<'a>(
    old_src: &'a str,
    old_start: usize,
    op: &UpdateOp<'a>,
) -> Result<Cmp<'a>, UpdateError> {
    let mut old_lex = PathLexer::at(old_src, old_start, op.index_base);
    let mut new_lex = PathLexer::at(op.path, op.tail_start, op.index_base);
    let mut matched = Vec::new();
    loop {
        let o = old_lex.next_token().map_err(|e| op.err_bad_path(e.pos))?;
        let n = new_lex.next_token().map_err(|e| op.err_bad_path(e.pos))?;
        match (o, n) {
            (None, Some((ns, _))) => return Ok(Cmp::Follow { ns }),
            (Some(_), None) | (None, None) => return Ok(Cmp::Double),
            (Some((os, ot)), Some((_, nt))) => {
                if tokens_eq(ot, nt) {
                    matched.push(ot);
                    continue;
                }
                return Ok(Cmp::Diverge {
                    matched,
                    div: ot,
                    div_start: os,
                    div_end: old_lex.pos(),
                });
            }
        }
    }
}

/// Position `r` at the child selected by `tok` inside the container at its
/// cursor.
fn descend<'a>(
    r: &mut Reader<'a>,
    tok: PathToken<'_>,
    op: &UpdateOp<'_>,
) -> Result<(), UpdateError> {
    match r.type_of()? {
        MpType::Array => {
            let count = r.read_arr_hdr()?;
            let PathToken::Index(i) = tok else {
                return Err(op.err_field("can not update an array by a non-integer index"));
            };
            if i >= count {
                return Err(op.err_no_such_field());
            }
            for _ in 0..i {
                r.skip()?;
            }
            Ok(())
        }
        MpType::Map => {
            let count = r.read_map_hdr()?;
            let PathToken::Key(k) = tok else {
                return Err(op.err_field("can not update a map by a non-string key"));
            };
            if !bar::seek_pair(r, count, k)? {
                return Err(op.err_no_such_field());
            }
            Ok(())
        }
        _ => Err(op.err_field("can not update a scalar by path")),
    }
}

fn container_field<'a>(
    data: &'a [u8],
    op: &UpdateOp<'_>,
) -> Result<UpdateField<'a>, UpdateError> {
    match Reader::new(data).type_of()? {
        MpType::Array => Ok(UpdateField {
            data,
            rep: Rep::Array(ArrayUpdate::new(data)?),
        }),
        MpType::Map => Ok(UpdateField {
            data,
            rep: Rep::Map(MapUpdate::new(data)?),
        }),
        _ => Err(op.err_field("can not update a scalar by path")),
    }
}

/// Split a bar: build containers down to the diverging token, re-anchor the
/// bar's operation there, then re-dispatch the new one into the rebuilt
/// tree. The rebuilt tree is installed before the new operation runs, so a
/// failure of the latter cannot drop the bar's update.
pub(crate) fn branch_bar<'a>(
    host: &mut UpdateField<'a>,
    op: &mut UpdateOp<'a>,
    applied: bool,
) -> Result<(), UpdateError> {
    let cmp = {
        let Rep::Bar(b) = &host.rep else { unreachable!() };
        compare(b.op.path, b.path_start, op)?
    };
    let Cmp::Diverge {
        matched, div_start, ..
    } = cmp
    else {
        return Err(op.err_double());
    };

    let bar: BarUpdate<'a> = match std::mem::replace(&mut host.rep, Rep::Nop) {
        Rep::Bar(b) => b,
        _ => unreachable!(),
    };
    let mut old_op = bar.op;
    let path_start = bar.path_start;

    let mut r = Reader::new(host.data);
    for t in &matched {
        descend(&mut r, *t, op)?;
    }
    let cont_off = r.x;
    let cont_data = r.slice_value()?;
    let mut cont = container_field(cont_data, op)?;

    old_op.lexer = PathLexer::at(old_op.path, div_start, old_op.index_base);
    old_op.consume_token()?;
    field::do_op(&mut cont, &mut old_op, true)?;

    host.rep = if matched.is_empty() {
        cont.rep
    } else {
        Rep::Route(RouteUpdate {
            prefix: &old_op.path[path_start..div_start],
            hop_offset: cont_off,
            next_hop: Box::new(cont),
        })
    };
    field::do_op(host, op, applied)
}

/// Apply an operation to a route: follow it when the whole prefix matches,
/// split the prefix at the diverging token otherwise.
pub(crate) fn do_op<'a>(
    host: &mut UpdateField<'a>,
    op: &mut UpdateOp<'a>,
    applied: bool,
) -> Result<(), UpdateError> {
    let cmp = {
        let Rep::Route(route) = &host.rep else {
            unreachable!()
        };
        compare(route.prefix, 0, op)?
    };
    match cmp {
        Cmp::Follow { ns } => {
            let Rep::Route(route) = &mut host.rep else {
                unreachable!()
            };
            op.lexer = PathLexer::at(op.path, ns, op.index_base);
            op.consume_token()?;
            field::do_op(route.next_hop.as_mut(), op, applied)
        }
        Cmp::Double => Err(op.err_double()),
        Cmp::Diverge {
            matched,
            div,
            div_start,
            div_end,
        } => {
            let route: RouteUpdate<'a> = match std::mem::replace(&mut host.rep, Rep::Nop) {
                Rep::Route(r) => r,
                _ => unreachable!(),
            };

            let mut r = Reader::new(host.data);
            for t in &matched {
                descend(&mut r, *t, op)?;
            }
            let cont_off = r.x;
            let cont_data = r.clone().slice_value()?;

            // Move the old subtree under the diverging token. With prefix
            // tokens remaining it stays a route, shortened; otherwise the
            // hop itself becomes the child.
            descend(&mut r, div, op)?;
            let child_off = r.x;
            let child_data = r.slice_value()?;
            let rest = &route.prefix[div_end..];
            let child = if rest.is_empty() {
                debug_assert_eq!(child_data.as_ptr(), route.next_hop.data.as_ptr());
                *route.next_hop
            } else {
                UpdateField {
                    data: child_data,
                    rep: Rep::Route(RouteUpdate {
                        prefix: rest,
                        hop_offset: route.hop_offset - child_off,
                        next_hop: route.next_hop,
                    }),
                }
            };

            let cont = UpdateField {
                data: cont_data,
                rep: match div {
                    PathToken::Index(i) => {
                        Rep::Array(array::with_child(cont_data, i, child)?)
                    }
                    PathToken::Key(k) => Rep::Map(map::with_child(cont_data, k, child)?),
                },
            };

            host.rep = if matched.is_empty() {
                cont.rep
            } else {
                Rep::Route(RouteUpdate {
                    prefix: &route.prefix[..div_start],
                    hop_offset: cont_off,
                    next_hop: Box::new(cont),
                })
            };
            field::do_op(host, op, applied)
        }
    }
}
