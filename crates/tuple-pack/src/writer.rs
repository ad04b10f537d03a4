//! Exact sizing and fixed-buffer writes.
//!
//! The update engine sizes its output first and then stores into a buffer of
//! exactly that size. The `sizeof_*` helpers answer "how many bytes will
//! this encode to" and [`Writer`] writes into a caller-supplied slice; it
//! panics on overrun, which is a programming-error class mismatch between
//! the two phases, not a user-facing condition.

/// Encoded size of a non-negative integer.
pub fn sizeof_uint(v: u64) -> usize {
    if v < 0x80 {
        1
    } else if v <= 0xff {
        2
    } else if v <= 0xffff {
        3
    } else if v <= 0xffff_ffff {
        5
    } else {
        9
    }
}

/// Encoded size of a negative integer.
pub fn sizeof_int(v: i64) -> usize {
    debug_assert!(v < 0);
    if v >= -0x20 {
        1
    } else if v >= -0x80 {
        2
    } else if v >= -0x8000 {
        3
    } else if v >= -0x8000_0000 {
        5
    } else {
        9
    }
}

/// Encoded size of a string header for `len` content bytes.
pub fn sizeof_str_hdr(len: usize) -> usize {
    if len < 32 {
        1
    } else if len <= 0xff {
        2
    } else if len <= 0xffff {
        3
    } else {
        5
    }
}

/// Encoded size of an array header for `n` elements.
pub fn sizeof_array_hdr(n: u32) -> usize {
    if n < 16 {
        1
    } else if n <= 0xffff {
        3
    } else {
        5
    }
}

/// Encoded size of a map header for `n` pairs.
pub fn sizeof_map_hdr(n: u32) -> usize {
    if n < 16 {
        1
    } else if n <= 0xffff {
        3
    } else {
        5
    }
}

pub fn sizeof_f32() -> usize {
    5
}

pub fn sizeof_f64() -> usize {
    9
}

/// Cursor writing into a fixed output slice.
pub struct Writer<'b> {
    out: &'b mut [u8],
    x: usize,
}

impl<'b> Writer<'b> {
    pub fn new(out: &'b mut [u8]) -> Self {
        Self { out, x: 0 }
    }

    /// Bytes written so far.
    pub fn written(&self) -> usize {
        self.x
    }

    pub fn raw(&mut self, bytes: &[u8]) {
        self.out[self.x..self.x + bytes.len()].copy_from_slice(bytes);
        self.x += bytes.len();
    }

    fn u8(&mut self, b: u8) {
        self.out[self.x] = b;
        self.x += 1;
    }

    pub fn uint(&mut self, v: u64) {
        if v < 0x80 {
            self.u8(v as u8);
        } else if v <= 0xff {
            self.u8(0xcc);
            self.u8(v as u8);
        } else if v <= 0xffff {
            self.u8(0xcd);
            self.raw(&(v as u16).to_be_bytes());
        } else if v <= 0xffff_ffff {
            self.u8(0xce);
            self.raw(&(v as u32).to_be_bytes());
        } else {
            self.u8(0xcf);
            self.raw(&v.to_be_bytes());
        }
    }

    pub fn int(&mut self, v: i64) {
        debug_assert!(v < 0);
        if v >= -0x20 {
            self.u8(v as i8 as u8);
        } else if v >= -0x80 {
            self.u8(0xd0);
            self.u8(v as i8 as u8);
        } else if v >= -0x8000 {
            self.u8(0xd1);
            self.raw(&(v as i16).to_be_bytes());
        } else if v >= -0x8000_0000 {
            self.u8(0xd2);
            self.raw(&(v as i32).to_be_bytes());
        } else {
            self.u8(0xd3);
            self.raw(&v.to_be_bytes());
        }
    }

    pub fn f32(&mut self, v: f32) {
        self.u8(0xca);
        self.raw(&v.to_be_bytes());
    }

    pub fn f64(&mut self, v: f64) {
        self.u8(0xcb);
        self.raw(&v.to_be_bytes());
    }

    pub fn str_hdr(&mut self, len: usize) {
        if len < 32 {
            self.u8(0xa0 | len as u8);
        } else if len <= 0xff {
            self.u8(0xd9);
            self.u8(len as u8);
        } else if len <= 0xffff {
            self.u8(0xda);
            self.raw(&(len as u16).to_be_bytes());
        } else {
            self.u8(0xdb);
            self.raw(&(len as u32).to_be_bytes());
        }
    }

    pub fn arr_hdr(&mut self, n: u32) {
        if n < 16 {
            self.u8(0x90 | n as u8);
        } else if n <= 0xffff {
            self.u8(0xdc);
            self.raw(&(n as u16).to_be_bytes());
        } else {
            self.u8(0xdd);
            self.raw(&n.to_be_bytes());
        }
    }

    pub fn map_hdr(&mut self, n: u32) {
        if n < 16 {
            self.u8(0x80 | n as u8);
        } else if n <= 0xffff {
            self.u8(0xde);
            self.raw(&(n as u16).to_be_bytes());
        } else {
            self.u8(0xdf);
            self.raw(&n.to_be_bytes());
        }
    }
}
