//! Operation decoder.
//!
//! One encoded operation is an array `[opcode, field_selector, arg...]`.
//! Decoding resolves the selector once (index base and dictionary lookups
//! happen here, never deeper in the tree) and captures a typed argument;
//! the opcode enum replaces the original's function-pointer table with an
//! exhaustive match.

use tuple_pack::{MpType, Reader, Writer};

use crate::arith::ArithVal;
use crate::dict::{field_name_hash, FieldDictionary};
use crate::error::UpdateError;
use crate::path::{PathLexer, PathToken};

/// Update opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Set,
    Insert,
    Delete,
    Add,
    Subtract,
    BitAnd,
    BitOr,
    BitXor,
    Splice,
}

/// Dispatch group of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Set,
    Insert,
    Delete,
    Arith,
    Bit,
    Splice,
}

impl Opcode {
    pub fn from_symbol(c: char) -> Option<Opcode> {
        match c {
            '=' => Some(Opcode::Set),
            '!' => Some(Opcode::Insert),
            '#' => Some(Opcode::Delete),
            '+' => Some(Opcode::Add),
            '-' => Some(Opcode::Subtract),
            '&' => Some(Opcode::BitAnd),
            '|' => Some(Opcode::BitOr),
            '^' => Some(Opcode::BitXor),
            ':' => Some(Opcode::Splice),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Opcode::Set => '=',
            Opcode::Insert => '!',
            Opcode::Delete => '#',
            Opcode::Add => '+',
            Opcode::Subtract => '-',
            Opcode::BitAnd => '&',
            Opcode::BitOr => '|',
            Opcode::BitXor => '^',
            Opcode::Splice => ':',
        }
    }

    pub fn kind(self) -> OpKind {
        match self {
            Opcode::Set => OpKind::Set,
            Opcode::Insert => OpKind::Insert,
            Opcode::Delete => OpKind::Delete,
            Opcode::Add | Opcode::Subtract => OpKind::Arith,
            Opcode::BitAnd | Opcode::BitOr | Opcode::BitXor => OpKind::Bit,
            Opcode::Splice => OpKind::Splice,
        }
    }

    /// Total element count of the operation array, opcode included.
    fn arg_count(self) -> u32 {
        match self {
            Opcode::Splice => 5,
            _ => 3,
        }
    }
}

/// Splice argument; `tail_offset`/`tail_len` are filled by the executor
/// after normalization against the old string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpliceArg<'a> {
    pub offset: i32,
    pub cut_length: i32,
    pub paste: &'a [u8],
    pub tail_offset: usize,
    pub tail_len: usize,
}

/// Typed operation argument. Arith and bit arguments are refined in place
/// as the operation folds against the old value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpArg<'a> {
    /// Raw encoded value, captured verbatim (set and insert).
    Set { value: &'a [u8] },
    Delete { count: u32 },
    Arith(ArithVal),
    Bit { value: u64 },
    Splice(SpliceArg<'a>),
}

/// One decoded update operation.
///
/// `field_no`/`key` hold the current-level token while the operation walks
/// down the tree; `lexer` sits at the unconsumed path suffix and
/// `tail_start` marks where the current token begins inside `path`, so
/// bar and route nodes can store that suffix verbatim.
#[derive(Debug, Clone)]
pub struct UpdateOp<'a> {
    pub opcode: Opcode,
    pub index_base: i64,
    pub field_no: i64,
    pub key: Option<&'a str>,
    pub path: &'a str,
    pub tail_start: usize,
    pub lexer: PathLexer<'a>,
    pub arg: OpArg<'a>,
    pub new_field_len: usize,
}

impl<'a> UpdateOp<'a> {
    /// No path tokens left: the operation terminates at the current token.
    pub fn is_term(&self) -> bool {
        self.lexer.is_eof()
    }

    /// Pull the next path token into `field_no`/`key`.
    pub(crate) fn consume_token(&mut self) -> Result<(), UpdateError> {
        match self.lexer.next_token().map_err(|e| self.err_bad_path(e.pos))? {
            Some((start, PathToken::Index(i))) => {
                self.field_no = i as i64;
                self.key = None;
                self.tail_start = start;
                Ok(())
            }
            Some((start, PathToken::Key(k))) => {
                self.key = Some(k);
                self.tail_start = start;
                Ok(())
            }
            None => Err(self.err_bad_path(self.lexer.pos())),
        }
    }

    /// Human-readable target for diagnostics.
    pub(crate) fn target(&self) -> String {
        if self.path.is_empty() {
            (self.index_base + self.field_no).to_string()
        } else {
            format!("'{}'", self.path)
        }
    }

    pub(crate) fn err_no_such_field(&self) -> UpdateError {
        if let Some(key) = self.key {
            UpdateError::NoSuchFieldName(key.to_string())
        } else if self.path.is_empty() {
            UpdateError::NoSuchFieldNo(self.index_base + self.field_no)
        } else {
            UpdateError::NoSuchFieldName(self.path.to_string())
        }
    }

    pub(crate) fn err_arg_type(&self, expected: &'static str) -> UpdateError {
        UpdateError::ArgType {
            opcode: self.opcode.symbol(),
            field: self.target(),
            expected,
        }
    }

    pub(crate) fn err_overflow(&self) -> UpdateError {
        UpdateError::IntegerOverflow {
            opcode: self.opcode.symbol(),
            field: self.target(),
        }
    }

    pub(crate) fn err_splice(&self, reason: &'static str) -> UpdateError {
        UpdateError::Splice {
            field: self.target(),
            reason,
        }
    }

    pub(crate) fn err_double(&self) -> UpdateError {
        UpdateError::DoubleUpdate {
            field: self.target(),
        }
    }

    pub(crate) fn err_bad_path(&self, pos: usize) -> UpdateError {
        UpdateError::BadJsonPath {
            field: self.target(),
            pos: pos + 1,
        }
    }

    pub(crate) fn err_delete1(&self) -> UpdateError {
        UpdateError::DeleteTooMany {
            field: self.target(),
        }
    }

    pub(crate) fn err_duplicate(&self) -> UpdateError {
        UpdateError::DuplicateKey {
            field: self.target(),
        }
    }

    pub(crate) fn err_field(&self, reason: impl Into<String>) -> UpdateError {
        UpdateError::Field {
            field: self.target(),
            reason: reason.into(),
        }
    }
}

/// Decode one operation at the reader's cursor.
pub(crate) fn decode_op<'a>(
    r: &mut Reader<'a>,
    index_base: i64,
    dict: &dyn FieldDictionary,
) -> Result<UpdateOp<'a>, UpdateError> {
    if r.type_of()? != MpType::Array {
        return Err(UpdateError::IllegalParams(
            "update operation must be an array {op,..}",
        ));
    }
    let arg_count = r.read_arr_hdr()?;
    if arg_count < 1 {
        return Err(UpdateError::IllegalParams(
            "update operation must be an array {op,..}, got empty array",
        ));
    }
    if r.type_of()? != MpType::Str {
        return Err(UpdateError::IllegalParams(
            "update operation name must be a string",
        ));
    }
    let name = r.read_str_bytes()?;
    let opcode = match name {
        [c] => Opcode::from_symbol(*c as char).ok_or(UpdateError::UnknownUpdateOp)?,
        _ => return Err(UpdateError::UnknownUpdateOp),
    };
    if arg_count != opcode.arg_count() {
        return Err(UpdateError::UnknownUpdateOp);
    }

    let mut op = UpdateOp {
        opcode,
        index_base,
        field_no: 0,
        key: None,
        path: "",
        tail_start: 0,
        lexer: PathLexer::new("", index_base),
        arg: OpArg::Set { value: &[] },
        new_field_len: 0,
    };

    match r.type_of()? {
        MpType::Uint | MpType::Int => {
            let v = if r.type_of()? == MpType::Uint {
                let v = r.read_uint()?;
                if v > i32::MAX as u64 {
                    return Err(op.err_arg_type("an integer"));
                }
                v as i64
            } else {
                let v = r.read_int()?;
                if v < i32::MIN as i64 {
                    return Err(op.err_arg_type("an integer"));
                }
                v
            };
            if v - index_base >= 0 {
                op.field_no = v - index_base;
            } else if v < 0 {
                op.field_no = v;
            } else {
                return Err(UpdateError::NoSuchFieldNo(v));
            }
        }
        MpType::Str => {
            let path = r
                .read_str()
                .map_err(|_| UpdateError::IllegalParams("field id must be a number or a string"))?;
            op.path = path;
            op.lexer = PathLexer::new(path, index_base);
            match op.lexer.next_token() {
                Ok(Some((_, PathToken::Index(i)))) => op.field_no = i as i64,
                Ok(Some((_, PathToken::Key(k)))) => {
                    let hash = field_name_hash(k);
                    match dict.field_no_by_name(k, hash) {
                        Some(no) => op.field_no = no as i64,
                        None => return Err(UpdateError::NoSuchFieldName(k.to_string())),
                    }
                }
                Ok(None) => return Err(op.err_bad_path(0)),
                Err(e) => return Err(op.err_bad_path(e.pos)),
            }
        }
        _ => {
            return Err(UpdateError::IllegalParams(
                "field id must be a number or a string",
            ))
        }
    }

    read_arg(&mut op, r)?;
    Ok(op)
}

fn read_arg<'a>(op: &mut UpdateOp<'a>, r: &mut Reader<'a>) -> Result<(), UpdateError> {
    match op.opcode.kind() {
        OpKind::Set | OpKind::Insert => {
            let value = r.slice_value()?;
            op.new_field_len = value.len();
            op.arg = OpArg::Set { value };
        }
        OpKind::Delete => {
            if r.type_of().ok() != Some(MpType::Uint) {
                return Err(op.err_arg_type("a number of fields to delete"));
            }
            let count = r.read_uint()?;
            if count > u32::MAX as u64 {
                return Err(op.err_arg_type("a number of fields to delete"));
            }
            op.arg = OpArg::Delete {
                count: count as u32,
            };
        }
        OpKind::Arith => {
            let val = crate::arith::read_arith_val(r).map_err(|_| op.err_arg_type("a number"))?;
            op.arg = OpArg::Arith(val);
        }
        OpKind::Bit => {
            if r.type_of().ok() != Some(MpType::Uint) {
                return Err(op.err_arg_type("a positive integer"));
            }
            op.arg = OpArg::Bit {
                value: r.read_uint()?,
            };
        }
        OpKind::Splice => {
            let offset = read_i32_arg(op, r)?;
            let cut_length = read_i32_arg(op, r)?;
            if r.type_of().ok() != Some(MpType::Str) {
                return Err(op.err_arg_type("a string"));
            }
            let paste = r.read_str_bytes()?;
            op.arg = OpArg::Splice(SpliceArg {
                offset,
                cut_length,
                paste,
                tail_offset: 0,
                tail_len: 0,
            });
        }
    }
    Ok(())
}

fn read_i32_arg(op: &UpdateOp<'_>, r: &mut Reader<'_>) -> Result<i32, UpdateError> {
    match r.type_of().ok() {
        Some(MpType::Uint) => {
            let v = r.read_uint()?;
            if v > i32::MAX as u64 {
                return Err(op.err_arg_type("an integer"));
            }
            Ok(v as i32)
        }
        Some(MpType::Int) => {
            let v = r.read_int()?;
            if v < i32::MIN as i64 {
                return Err(op.err_arg_type("an integer"));
            }
            Ok(v as i32)
        }
        _ => Err(op.err_arg_type("an integer")),
    }
}

/// Write the new content of a fully-executed terminal operation. `old` is
/// the field's previous encoding; only splice re-reads it, for its head and
/// tail spans. The caller's buffer is sized by `op.new_field_len`.
pub(crate) fn store_scalar(op: &UpdateOp<'_>, old: &[u8], w: &mut Writer<'_>) {
    match &op.arg {
        OpArg::Set { value } => w.raw(value),
        OpArg::Arith(val) => val.store(w),
        OpArg::Bit { value } => w.uint(*value),
        OpArg::Splice(arg) => {
            let content_len = arg.tail_offset + arg.tail_len;
            let content = &old[old.len() - content_len..];
            let new_str_len = arg.offset as usize + arg.paste.len() + arg.tail_len;
            w.str_hdr(new_str_len);
            w.raw(&content[..arg.offset as usize]);
            w.raw(arg.paste);
            w.raw(&content[arg.tail_offset..]);
        }
        OpArg::Delete { .. } => unreachable!("delete is structural, never stored as a scalar"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuple_pack::Builder;

    fn decode(buf: &[u8], base: i64) -> Result<UpdateOp<'_>, UpdateError> {
        decode_op(&mut Reader::new(buf), base, &())
    }

    #[test]
    fn set_op_captures_value_verbatim() {
        let mut b = Builder::new();
        b.arr_hdr(3).str("=").uint(2).str("abc");
        let buf = b.finish();
        let op = decode(&buf, 0).unwrap();
        assert_eq!(op.opcode, Opcode::Set);
        assert_eq!(op.field_no, 2);
        assert!(op.is_term());
        match op.arg {
            OpArg::Set { value } => assert_eq!(value, &[0xa3, b'a', b'b', b'c']),
            _ => panic!("wrong arg"),
        }
        assert_eq!(op.new_field_len, 4);
    }

    #[test]
    fn index_base_shifts_selector() {
        let mut b = Builder::new();
        b.arr_hdr(3).str("=").uint(1).uint(9);
        let buf = b.finish();
        assert_eq!(decode(&buf, 1).unwrap().field_no, 0);

        let mut b = Builder::new();
        b.arr_hdr(3).str("=").uint(0).uint(9);
        let buf = b.finish();
        assert!(matches!(
            decode(&buf, 1),
            Err(UpdateError::NoSuchFieldNo(0))
        ));
    }

    #[test]
    fn int_marker_selector_follows_uint_rules() {
        // Non-negative values may arrive with an int marker; the base
        // adjustment and the underflow check apply all the same.
        let mut b = Builder::new();
        b.arr_hdr(3).str("=").raw(&[0xd0, 0x02]).uint(9);
        let buf = b.finish();
        assert_eq!(decode(&buf, 1).unwrap().field_no, 1);

        let mut b = Builder::new();
        b.arr_hdr(3).str("=").raw(&[0xd0, 0x00]).uint(9);
        let buf = b.finish();
        assert!(matches!(
            decode(&buf, 1),
            Err(UpdateError::NoSuchFieldNo(0))
        ));
    }

    #[test]
    fn negative_selector_kept_for_late_resolution() {
        let mut b = Builder::new();
        b.arr_hdr(3).str("+").int(-1).uint(1);
        let buf = b.finish();
        assert_eq!(decode(&buf, 0).unwrap().field_no, -1);
    }

    #[test]
    fn unknown_opcode_and_arity() {
        let mut b = Builder::new();
        b.arr_hdr(3).str("?").uint(0).uint(1);
        assert!(matches!(
            decode(&b.finish(), 0),
            Err(UpdateError::UnknownUpdateOp)
        ));

        let mut b = Builder::new();
        b.arr_hdr(4).str("=").uint(0).uint(1).uint(2);
        assert!(matches!(
            decode(&b.finish(), 0),
            Err(UpdateError::UnknownUpdateOp)
        ));

        let mut b = Builder::new();
        b.arr_hdr(3).str(":").uint(0).uint(1);
        assert!(matches!(
            decode(&b.finish(), 0),
            Err(UpdateError::UnknownUpdateOp)
        ));
    }

    #[test]
    fn envelope_errors() {
        let mut b = Builder::new();
        b.str("=");
        assert!(matches!(
            decode(&b.finish(), 0),
            Err(UpdateError::IllegalParams(_))
        ));

        let mut b = Builder::new();
        b.arr_hdr(0);
        assert!(matches!(
            decode(&b.finish(), 0),
            Err(UpdateError::IllegalParams(_))
        ));

        let mut b = Builder::new();
        b.arr_hdr(3).uint(1).uint(0).uint(1);
        assert!(matches!(
            decode(&b.finish(), 0),
            Err(UpdateError::IllegalParams(_))
        ));
    }

    #[test]
    fn selector_type_errors() {
        let mut b = Builder::new();
        b.arr_hdr(3).str("=").f64(1.5).uint(1);
        assert!(matches!(
            decode(&b.finish(), 0),
            Err(UpdateError::IllegalParams(_))
        ));
    }

    #[test]
    fn arg_type_errors() {
        let mut b = Builder::new();
        b.arr_hdr(3).str("#").str("x");
        b.int(-1);
        assert!(matches!(
            decode(&b.finish(), 0),
            Err(UpdateError::NoSuchFieldName(_))
        ));

        let mut b = Builder::new();
        b.arr_hdr(3).str("#").uint(0).int(-1);
        assert!(matches!(
            decode(&b.finish(), 0),
            Err(UpdateError::ArgType { opcode: '#', .. })
        ));

        let mut b = Builder::new();
        b.arr_hdr(3).str("&").uint(0).int(-1);
        assert!(matches!(
            decode(&b.finish(), 0),
            Err(UpdateError::ArgType { opcode: '&', .. })
        ));

        let mut b = Builder::new();
        b.arr_hdr(3).str("+").uint(0).str("nan");
        assert!(matches!(
            decode(&b.finish(), 0),
            Err(UpdateError::ArgType { opcode: '+', .. })
        ));
    }

    #[test]
    fn path_selector() {
        let mut b = Builder::new();
        b.arr_hdr(3).str("=").str("[2].a[5]").uint(1);
        let buf = b.finish();
        let mut op = decode(&buf, 0).unwrap();
        assert_eq!(op.field_no, 2);
        assert!(!op.is_term());
        op.consume_token().unwrap();
        assert_eq!(op.key, Some("a"));
        assert_eq!(&op.path[op.tail_start..], ".a[5]");
        op.consume_token().unwrap();
        assert_eq!(op.field_no, 5);
        assert_eq!(op.key, None);
        assert!(op.is_term());
    }

    #[test]
    fn splice_args() {
        let mut b = Builder::new();
        b.arr_hdr(5).str(":").uint(1).int(-3).uint(2).str("XY");
        let buf = b.finish();
        let op = decode(&buf, 0).unwrap();
        match op.arg {
            OpArg::Splice(arg) => {
                assert_eq!(arg.offset, -3);
                assert_eq!(arg.cut_length, 2);
                assert_eq!(arg.paste, b"XY");
            }
            _ => panic!("wrong arg"),
        }
    }
}
