//! JSON-path lexer for nested field targets.
//!
//! Paths address fields inside a tuple with `.key`, `[N]` and `["key"]` /
//! `['key']` segments, e.g. `a.b[3].c`. The first segment of a selector may
//! be a bare identifier. Numeric segments are adjusted by the caller's index
//! base at lex time, so every consumer downstream works zero-based.
//!
//! Token count is capped at [`MAX_PATH_DEPTH`]; the update tree recurses
//! along the path, so the cap also bounds recursion depth.

/// Maximum number of path tokens in one operation target.
pub const MAX_PATH_DEPTH: usize = 64;

/// One path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathToken<'a> {
    /// `[N]`, already adjusted by the index base.
    Index(u32),
    /// `.key`, `["key"]` or a bare leading identifier.
    Key(&'a str),
}

/// Lex failure at a byte position (0-based) in the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathError {
    pub pos: usize,
}

/// Incremental path lexer.
///
/// Cloneable so callers can look ahead without losing their place; the
/// update engine relies on that while matching route prefixes.
#[derive(Debug, Clone)]
pub struct PathLexer<'a> {
    src: &'a str,
    pos: usize,
    index_base: i64,
    depth: usize,
}

impl<'a> PathLexer<'a> {
    pub fn new(src: &'a str, index_base: i64) -> Self {
        Self {
            src,
            pos: 0,
            index_base,
            depth: 0,
        }
    }

    /// Lexer positioned mid-path. The token ceiling restarts from here and
    /// caps the suffix on its own.
    pub fn at(src: &'a str, pos: usize, index_base: i64) -> Self {
        Self {
            src,
            pos,
            index_base,
            depth: 0,
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn err(&self, pos: usize) -> PathError {
        PathError { pos }
    }

    /// Next token, with its byte offset in the source path.
    pub fn next_token(&mut self) -> Result<Option<(usize, PathToken<'a>)>, PathError> {
        if self.is_eof() {
            return Ok(None);
        }
        if self.depth >= MAX_PATH_DEPTH {
            return Err(self.err(self.pos));
        }
        self.depth += 1;

        let bytes = self.src.as_bytes();
        let start = self.pos;
        match bytes[self.pos] {
            b'[' => {
                self.pos += 1;
                if self.pos >= bytes.len() {
                    return Err(self.err(self.pos));
                }
                match bytes[self.pos] {
                    b'"' | b'\'' => {
                        let quote = bytes[self.pos];
                        self.pos += 1;
                        let key_start = self.pos;
                        while self.pos < bytes.len() && bytes[self.pos] != quote {
                            self.pos += 1;
                        }
                        if self.pos >= bytes.len() || self.pos == key_start {
                            return Err(self.err(self.pos));
                        }
                        let key = &self.src[key_start..self.pos];
                        self.pos += 1;
                        if self.pos >= bytes.len() || bytes[self.pos] != b']' {
                            return Err(self.err(self.pos));
                        }
                        self.pos += 1;
                        Ok(Some((start, PathToken::Key(key))))
                    }
                    b'0'..=b'9' => {
                        let mut num: u64 = 0;
                        let num_start = self.pos;
                        while self.pos < bytes.len() && bytes[self.pos].is_ascii_digit() {
                            num = num
                                .checked_mul(10)
                                .and_then(|n| n.checked_add((bytes[self.pos] - b'0') as u64))
                                .ok_or(self.err(num_start))?;
                            self.pos += 1;
                        }
                        if self.pos >= bytes.len() || bytes[self.pos] != b']' {
                            return Err(self.err(self.pos));
                        }
                        self.pos += 1;
                        let adjusted = num as i64 - self.index_base;
                        if adjusted < 0 || adjusted > u32::MAX as i64 {
                            return Err(self.err(num_start));
                        }
                        Ok(Some((start, PathToken::Index(adjusted as u32))))
                    }
                    _ => Err(self.err(self.pos)),
                }
            }
            b'.' => {
                self.pos += 1;
                self.ident(start)
            }
            _ if start == 0 => self.ident(start),
            _ => Err(self.err(self.pos)),
        }
    }

    fn ident(&mut self, token_start: usize) -> Result<Option<(usize, PathToken<'a>)>, PathError> {
        let bytes = self.src.as_bytes();
        let key_start = self.pos;
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' => self.pos += 1,
                _ => break,
            }
        }
        if self.pos == key_start {
            return Err(self.err(self.pos));
        }
        Ok(Some((token_start, PathToken::Key(&self.src[key_start..self.pos]))))
    }
}
