//! Zero-copy MessagePack cursor.
//!
//! The update engine never materializes values it does not touch, so this
//! reader works on borrowed spans: `skip` walks one value and reports how
//! many bytes it covered, `slice_value` hands the encoded bytes back as-is.

use crate::error::PackError;

/// Broad MessagePack type of a marker byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpType {
    Nil,
    Bool,
    Uint,
    Int,
    Float32,
    Float64,
    Str,
    Bin,
    Array,
    Map,
    Ext,
}

impl MpType {
    pub fn of(marker: u8) -> MpType {
        match marker {
            0x00..=0x7f => MpType::Uint,
            0x80..=0x8f => MpType::Map,
            0x90..=0x9f => MpType::Array,
            0xa0..=0xbf => MpType::Str,
            0xc0 | 0xc1 => MpType::Nil,
            0xc2 | 0xc3 => MpType::Bool,
            0xc4..=0xc6 => MpType::Bin,
            0xc7..=0xc9 => MpType::Ext,
            0xca => MpType::Float32,
            0xcb => MpType::Float64,
            0xcc..=0xcf => MpType::Uint,
            0xd0..=0xd3 => MpType::Int,
            0xd4..=0xd8 => MpType::Ext,
            0xd9..=0xdb => MpType::Str,
            0xdc | 0xdd => MpType::Array,
            0xde | 0xdf => MpType::Map,
            0xe0..=0xff => MpType::Int,
        }
    }
}

/// Cursor over a borrowed MessagePack buffer.
#[derive(Clone)]
pub struct Reader<'a> {
    pub data: &'a [u8],
    pub x: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, x: 0 }
    }

    pub fn at_end(&self) -> bool {
        self.x >= self.data.len()
    }

    pub fn peek(&self) -> Result<u8, PackError> {
        self.data.get(self.x).copied().ok_or(PackError::UnexpectedEof)
    }

    /// Type of the value at the cursor, without consuming it.
    pub fn type_of(&self) -> Result<MpType, PackError> {
        Ok(MpType::of(self.peek()?))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], PackError> {
        if self.x + n > self.data.len() {
            return Err(PackError::UnexpectedEof);
        }
        let out = &self.data[self.x..self.x + n];
        self.x += n;
        Ok(out)
    }

    fn u8_size(&mut self) -> Result<usize, PackError> {
        Ok(self.take(1)?[0] as usize)
    }

    fn u16_size(&mut self) -> Result<usize, PackError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]) as usize)
    }

    fn u32_size(&mut self) -> Result<usize, PackError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize)
    }

    /// Read an array header, returning the element count.
    pub fn read_arr_hdr(&mut self) -> Result<u32, PackError> {
        let byte = self.take(1)?[0];
        if byte >> 4 == 0b1001 {
            return Ok((byte & 0xf) as u32);
        }
        match byte {
            0xdc => self.u16_size().map(|n| n as u32),
            0xdd => self.u32_size().map(|n| n as u32),
            _ => Err(PackError::NotArr),
        }
    }

    /// Read a map header, returning the pair count.
    pub fn read_map_hdr(&mut self) -> Result<u32, PackError> {
        let byte = self.take(1)?[0];
        if byte >> 4 == 0b1000 {
            return Ok((byte & 0xf) as u32);
        }
        match byte {
            0xde => self.u16_size().map(|n| n as u32),
            0xdf => self.u32_size().map(|n| n as u32),
            _ => Err(PackError::NotMap),
        }
    }

    /// Read a string header, returning the content byte length.
    pub fn read_str_hdr(&mut self) -> Result<usize, PackError> {
        let byte = self.take(1)?[0];
        if byte >> 5 == 0b101 {
            return Ok((byte & 0x1f) as usize);
        }
        match byte {
            0xd9 => self.u8_size(),
            0xda => self.u16_size(),
            0xdb => self.u32_size(),
            _ => Err(PackError::NotStr),
        }
    }

    /// Read a whole string, returning its content bytes.
    pub fn read_str_bytes(&mut self) -> Result<&'a [u8], PackError> {
        let len = self.read_str_hdr()?;
        self.take(len)
    }

    pub fn read_str(&mut self) -> Result<&'a str, PackError> {
        let bytes = self.read_str_bytes()?;
        std::str::from_utf8(bytes).map_err(|_| PackError::InvalidUtf8)
    }

    /// Read a non-negative integer (positive fixint or uint8..uint64).
    pub fn read_uint(&mut self) -> Result<u64, PackError> {
        let byte = self.take(1)?[0];
        match byte {
            0x00..=0x7f => Ok(byte as u64),
            0xcc => Ok(self.take(1)?[0] as u64),
            0xcd => self.u16_size().map(|n| n as u64),
            0xce => self.u32_size().map(|n| n as u64),
            0xcf => {
                let b = self.take(8)?;
                Ok(u64::from_be_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ]))
            }
            _ => Err(PackError::BadMarker(byte)),
        }
    }

    /// Read a negative integer (negative fixint or int8..int64).
    pub fn read_int(&mut self) -> Result<i64, PackError> {
        let byte = self.take(1)?[0];
        match byte {
            0xe0..=0xff => Ok(byte as i8 as i64),
            0xd0 => Ok(self.take(1)?[0] as i8 as i64),
            0xd1 => {
                let b = self.take(2)?;
                Ok(i16::from_be_bytes([b[0], b[1]]) as i64)
            }
            0xd2 => {
                let b = self.take(4)?;
                Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as i64)
            }
            0xd3 => {
                let b = self.take(8)?;
                Ok(i64::from_be_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ]))
            }
            _ => Err(PackError::BadMarker(byte)),
        }
    }

    pub fn read_f32(&mut self) -> Result<f32, PackError> {
        let byte = self.take(1)?[0];
        if byte != 0xca {
            return Err(PackError::BadMarker(byte));
        }
        let b = self.take(4)?;
        Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_f64(&mut self) -> Result<f64, PackError> {
        let byte = self.take(1)?[0];
        if byte != 0xcb {
            return Err(PackError::BadMarker(byte));
        }
        let b = self.take(8)?;
        Ok(f64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Skip one value of any type, returning how many bytes it consumed.
    pub fn skip(&mut self) -> Result<usize, PackError> {
        let start = self.x;
        let byte = self.take(1)?[0];

        match byte {
            0x00..=0x7f | 0xe0..=0xff | 0xc0..=0xc3 => {}
            0x80..=0x8f => self.skip_pairs((byte & 0xf) as usize)?,
            0x90..=0x9f => self.skip_values((byte & 0xf) as usize)?,
            0xa0..=0xbf => {
                self.take((byte & 0x1f) as usize)?;
            }
            0xc4 | 0xd9 => {
                let n = self.u8_size()?;
                self.take(n)?;
            }
            0xc5 | 0xda => {
                let n = self.u16_size()?;
                self.take(n)?;
            }
            0xc6 | 0xdb => {
                let n = self.u32_size()?;
                self.take(n)?;
            }
            0xc7 => {
                let n = self.u8_size()?;
                self.take(n + 1)?;
            }
            0xc8 => {
                let n = self.u16_size()?;
                self.take(n + 1)?;
            }
            0xc9 => {
                let n = self.u32_size()?;
                self.take(n + 1)?;
            }
            0xca | 0xce | 0xd2 | 0xd6 => {
                self.take(if byte == 0xd6 { 5 } else { 4 })?;
            }
            0xcb | 0xcf | 0xd3 => {
                self.take(8)?;
            }
            0xcc | 0xd0 => {
                self.take(1)?;
            }
            0xcd | 0xd1 => {
                self.take(2)?;
            }
            0xd4 => {
                self.take(2)?;
            }
            0xd5 => {
                self.take(3)?;
            }
            0xd7 => {
                self.take(9)?;
            }
            0xd8 => {
                self.take(17)?;
            }
            0xdc => {
                let n = self.u16_size()?;
                self.skip_values(n)?;
            }
            0xdd => {
                let n = self.u32_size()?;
                self.skip_values(n)?;
            }
            0xde => {
                let n = self.u16_size()?;
                self.skip_pairs(n)?;
            }
            0xdf => {
                let n = self.u32_size()?;
                self.skip_pairs(n)?;
            }
        }
        Ok(self.x - start)
    }

    fn skip_values(&mut self, n: usize) -> Result<(), PackError> {
        for _ in 0..n {
            self.skip()?;
        }
        Ok(())
    }

    fn skip_pairs(&mut self, n: usize) -> Result<(), PackError> {
        for _ in 0..n {
            self.skip()?;
            self.skip()?;
        }
        Ok(())
    }

    /// Capture one encoded value verbatim as a span.
    pub fn slice_value(&mut self) -> Result<&'a [u8], PackError> {
        let start = self.x;
        let len = self.skip()?;
        Ok(&self.data[start..start + len])
    }
}
