//! Scalar operation executors: arithmetic, bit, splice.
//!
//! Arithmetic runs on a widened integer representation so 64-bit overflow
//! is detected exactly instead of wrapping: both operands of `+`/`-` fit in
//! [-2^63, 2^64), their sum fits comfortably in 128 bits, and the result is
//! checked against the signed/unsigned 64-bit windows before narrowing.

use tuple_pack::{sizeof_f32, sizeof_f64, sizeof_int, sizeof_str_hdr, sizeof_uint, MpType, Reader, Writer};

use crate::error::UpdateError;
use crate::op::{OpArg, Opcode, UpdateOp};

/// Widened integer intermediate.
///
/// Stored as an `i128`; the name keeps the contract in view: any value a
/// 64-bit signed or unsigned field can hold, plus one bit of headroom for a
/// single add or subtract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Int96(i128);

impl Int96 {
    pub fn from_u64(v: u64) -> Self {
        Int96(v as i128)
    }

    pub fn from_i64(v: i64) -> Self {
        Int96(v as i128)
    }

    pub fn add(self, rhs: Int96) -> Int96 {
        Int96(self.0 + rhs.0)
    }

    pub fn sub(self, rhs: Int96) -> Int96 {
        Int96(self.0 - rhs.0)
    }

    /// Fits the unsigned 64-bit window.
    pub fn is_u64(self) -> bool {
        self.0 >= 0 && self.0 <= u64::MAX as i128
    }

    /// Strictly negative and fits the signed 64-bit window.
    pub fn is_neg_i64(self) -> bool {
        self.0 < 0 && self.0 >= i64::MIN as i128
    }

    pub fn as_u64(self) -> u64 {
        debug_assert!(self.is_u64());
        self.0 as u64
    }

    pub fn as_i64(self) -> i64 {
        debug_assert!(self.is_neg_i64());
        self.0 as i64
    }

    fn to_f64(self) -> f64 {
        self.0 as f64
    }
}

/// A decoded numeric operand or result, tagged by encoding.
///
/// Result type resolution picks the *lowest* precedence of the two
/// operands: double < float < int.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArithVal {
    Double(f64),
    Float(f32),
    Int(Int96),
}

impl ArithVal {
    fn precedence(&self) -> u8 {
        match self {
            ArithVal::Double(_) => 0,
            ArithVal::Float(_) => 1,
            ArithVal::Int(_) => 2,
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            ArithVal::Double(v) => v,
            ArithVal::Float(v) => v as f64,
            ArithVal::Int(v) => v.to_f64(),
        }
    }

    /// Exact encoded size of this value. Integers re-encode as MP uint when
    /// non-negative, MP int otherwise.
    pub fn sizeof(&self) -> usize {
        match self {
            ArithVal::Double(_) => sizeof_f64(),
            ArithVal::Float(_) => sizeof_f32(),
            ArithVal::Int(v) => {
                if v.is_u64() {
                    sizeof_uint(v.as_u64())
                } else {
                    sizeof_int(v.as_i64())
                }
            }
        }
    }

    pub fn store(&self, w: &mut Writer<'_>) {
        match self {
            ArithVal::Double(v) => w.f64(*v),
            ArithVal::Float(v) => w.f32(*v),
            ArithVal::Int(v) => {
                if v.is_u64() {
                    w.uint(v.as_u64());
                } else {
                    w.int(v.as_i64());
                }
            }
        }
    }
}

/// Decode one numeric value at the reader's cursor.
pub(crate) fn read_arith_val<'a>(r: &mut Reader<'a>) -> Result<ArithVal, ()> {
    match r.type_of().map_err(|_| ())? {
        MpType::Uint => Ok(ArithVal::Int(Int96::from_u64(r.read_uint().map_err(|_| ())?))),
        MpType::Int => Ok(ArithVal::Int(Int96::from_i64(r.read_int().map_err(|_| ())?))),
        MpType::Float32 => Ok(ArithVal::Float(r.read_f32().map_err(|_| ())?)),
        MpType::Float64 => Ok(ArithVal::Double(r.read_f64().map_err(|_| ())?)),
        _ => Err(()),
    }
}

/// `left op right` with exact overflow detection and lowest-precedence
/// result typing.
pub(crate) fn make_arith(
    left: ArithVal,
    right: ArithVal,
    op: &UpdateOp<'_>,
) -> Result<ArithVal, UpdateError> {
    if let (ArithVal::Int(a), ArithVal::Int(b)) = (left, right) {
        let result = match op.opcode {
            Opcode::Add => a.add(b),
            Opcode::Subtract => a.sub(b),
            _ => unreachable!("arith executor dispatched for non-arith opcode"),
        };
        if !result.is_u64() && !result.is_neg_i64() {
            return Err(op.err_overflow());
        }
        return Ok(ArithVal::Int(result));
    }
    let a = left.to_f64();
    let b = right.to_f64();
    let c = match op.opcode {
        Opcode::Add => a + b,
        Opcode::Subtract => a - b,
        _ => unreachable!("arith executor dispatched for non-arith opcode"),
    };
    if left.precedence().min(right.precedence()) == 0 {
        Ok(ArithVal::Double(c))
    } else {
        Ok(ArithVal::Float(c as f32))
    }
}

/// Execute `+`/`-` against the old field bytes, folding the result into the
/// operation argument and recording the new encoded length.
pub(crate) fn do_arith(op: &mut UpdateOp<'_>, old: &[u8]) -> Result<(), UpdateError> {
    let mut r = Reader::new(old);
    let left = read_arith_val(&mut r).map_err(|_| op.err_arg_type("a number"))?;
    let right = match &op.arg {
        OpArg::Arith(v) => *v,
        _ => unreachable!("arith executor without arith argument"),
    };
    let result = make_arith(left, right, op)?;
    op.new_field_len = result.sizeof();
    op.arg = OpArg::Arith(result);
    Ok(())
}

/// Execute `&`/`|`/`^`. The old value must be a non-negative integer; the
/// result is always unsigned.
pub(crate) fn do_bit(op: &mut UpdateOp<'_>, old: &[u8]) -> Result<(), UpdateError> {
    let mut r = Reader::new(old);
    if r.type_of().ok() != Some(MpType::Uint) {
        return Err(op.err_arg_type("a positive integer"));
    }
    let old_val = r.read_uint().map_err(UpdateError::from)?;
    let folded = match &op.arg {
        OpArg::Bit { value } => match op.opcode {
            Opcode::BitAnd => value & old_val,
            Opcode::BitOr => value | old_val,
            Opcode::BitXor => value ^ old_val,
            _ => unreachable!("bit executor dispatched for non-bit opcode"),
        },
        _ => unreachable!("bit executor without bit argument"),
    };
    op.new_field_len = sizeof_uint(folded);
    op.arg = OpArg::Bit { value: folded };
    Ok(())
}

/// Execute `:`. Normalizes offset and cut length against the old string's
/// byte length, then records the exact size of the spliced result.
pub(crate) fn do_splice(op: &mut UpdateOp<'_>, old: &[u8]) -> Result<(), UpdateError> {
    let mut r = Reader::new(old);
    if r.type_of().ok() != Some(MpType::Str) {
        return Err(op.err_arg_type("a string"));
    }
    let str_len = r.read_str_bytes().map_err(UpdateError::from)?.len() as i64;
    let index_base = op.index_base;
    let err_offset = op.err_splice("offset is out of bound");

    let arg = match &mut op.arg {
        OpArg::Splice(arg) => arg,
        _ => unreachable!("splice executor without splice argument"),
    };
    let mut offset = arg.offset as i64;
    if offset < 0 {
        if -offset > str_len + 1 {
            return Err(err_offset);
        }
        offset += str_len + 1;
    } else if offset - index_base >= 0 {
        offset -= index_base;
        if offset > str_len {
            offset = str_len;
        }
    } else {
        return Err(err_offset);
    }

    let mut cut = arg.cut_length as i64;
    if cut < 0 {
        if -cut > str_len - offset {
            cut = 0;
        } else {
            cut += str_len - offset;
        }
    } else if cut > str_len - offset {
        cut = str_len - offset;
    }

    arg.offset = offset as i32;
    arg.cut_length = cut as i32;
    arg.tail_offset = (offset + cut) as usize;
    arg.tail_len = (str_len - offset - cut) as usize;
    let new_str_len = offset as usize + arg.paste.len() + arg.tail_len;
    op.new_field_len = sizeof_str_hdr(new_str_len) + new_str_len;
    Ok(())
}
