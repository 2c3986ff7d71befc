//! A forward-only cursor over a borrowed byte buffer.
//!
//! [`Cursor`] is the substrate of the field-value grammar in [`crate::grammar`]:
//! parsers consume bytes through it and hand back slices that borrow the
//! underlying buffer, so a fully parsed header performs no copies.
//!
//! The cursor is deliberately primitive. It can look ahead ([`Cursor::peek`],
//! [`Cursor::peek_byte`]), consume ([`Cursor::read`], [`Cursor::advance`]) and
//! run a byte-at-a-time [`Scanner`] for lexemes whose end cannot be found with
//! a single predicate (quoted strings). It never moves backward; backtracking
//! parsers copy the cursor up front and restore the copy on failure, which is
//! why the type is `Copy`.

use crate::ensure;
use std::fmt;

/// Error returned by the exact-size read operations when the buffer holds
/// fewer bytes than requested.
///
/// The failed operation does not consume anything, so callers can recover by
/// asking for less or by treating the shortfall as end of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("needed {needed} bytes but only {available} available")]
pub struct Underflow {
    /// How many bytes the caller asked for.
    pub needed: usize,
    /// How many bytes were actually left.
    pub available: usize,
}

/// Verdict of a single [`Scanner`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// The byte belongs to the lexeme, keep going.
    Continue,
    /// The lexeme ended *before* this byte; the byte stays in the cursor.
    Stop,
    /// The byte is the last byte of the lexeme.
    Take,
}

/// A stateful recognizer driven by [`Cursor::scan`].
///
/// The cursor feeds bytes through [`step`](Scanner::step) until the scanner
/// stops, takes, fails, or the input runs out, in which case
/// [`finish`](Scanner::finish) decides whether ending there is legal
/// (an unterminated quoted string, for example, is not).
pub trait Scanner {
    type Error;

    fn step(&mut self, byte: u8) -> Result<Scan, Self::Error>;

    /// Called when end of input is reached while the scanner is still running.
    fn finish(&mut self) -> Result<(), Self::Error>;
}

/// A forward-only view over `&'a [u8]`.
///
/// All slices handed out borrow the underlying buffer for `'a`, not for the
/// lifetime of the cursor itself, so they stay usable after the cursor moves
/// on or is dropped.
#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left in front of the cursor.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    /// How many bytes have been consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The unconsumed tail of the buffer.
    #[inline]
    pub fn as_slice(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Looks at up to `n` bytes without consuming them. Returns fewer when
    /// the buffer ends early.
    #[inline]
    pub fn peek(&self, n: usize) -> &'a [u8] {
        let end = self.buf.len().min(self.pos + n);
        &self.buf[self.pos..end]
    }

    /// Looks at exactly `n` bytes without consuming them.
    pub fn peek_exactly(&self, n: usize) -> Result<&'a [u8], Underflow> {
        ensure!(self.remaining() >= n, Underflow { needed: n, available: self.remaining() });
        Ok(&self.buf[self.pos..self.pos + n])
    }

    /// The byte at the current position, if any.
    #[inline]
    pub fn peek_byte(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Consumes and returns up to `n` bytes. A short slice means the buffer
    /// ran out.
    pub fn read(&mut self, n: usize) -> &'a [u8] {
        let out = self.peek(n);
        self.pos += out.len();
        out
    }

    /// Consumes and returns exactly `n` bytes, or fails without consuming.
    pub fn read_exactly(&mut self, n: usize) -> Result<&'a [u8], Underflow> {
        let out = self.peek_exactly(n)?;
        self.pos += n;
        Ok(out)
    }

    /// Skips up to `n` bytes and reports how many were actually skipped.
    pub fn advance(&mut self, n: usize) -> usize {
        let step = self.remaining().min(n);
        self.pos += step;
        step
    }

    /// Consumes the maximal prefix whose bytes satisfy `pred`. The slice may
    /// be empty.
    pub fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            if !pred(b) {
                break;
            }
            self.pos += 1;
        }
        &self.buf[start..self.pos]
    }

    /// Runs `scanner` over the unconsumed bytes and consumes the accepted
    /// lexeme.
    ///
    /// On failure the cursor does not move, no matter how far the scanner got.
    pub fn scan<S: Scanner>(&mut self, mut scanner: S) -> Result<&'a [u8], S::Error> {
        let start = self.pos;
        for (offset, &byte) in self.buf[start..].iter().enumerate() {
            match scanner.step(byte)? {
                Scan::Continue => {}
                Scan::Stop => {
                    self.pos = start + offset;
                    return Ok(&self.buf[start..self.pos]);
                }
                Scan::Take => {
                    self.pos = start + offset + 1;
                    return Ok(&self.buf[start..self.pos]);
                }
            }
        }
        scanner.finish()?;
        self.pos = self.buf.len();
        Ok(&self.buf[start..])
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("pos", &self.pos)
            .field("len", &self.buf.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_short_at_end() {
        let mut cur = Cursor::new(b"abc");
        assert_eq!(cur.read(2), b"ab");
        assert_eq!(cur.read(5), b"c");
        assert_eq!(cur.read(5), b"");
        assert!(cur.is_empty());
    }

    #[test]
    fn read_exactly_does_not_consume_on_underflow() {
        let mut cur = Cursor::new(b"abc");
        let err = cur.read_exactly(4).unwrap_err();
        assert_eq!(err, Underflow { needed: 4, available: 3 });
        assert_eq!(cur.position(), 0);
        assert_eq!(cur.read_exactly(3).unwrap(), b"abc");
    }

    #[test]
    fn peek_does_not_consume() {
        let mut cur = Cursor::new(b"hello");
        assert_eq!(cur.peek(3), b"hel");
        assert_eq!(cur.peek_byte(), Some(b'h'));
        assert_eq!(cur.position(), 0);
        cur.advance(4);
        assert_eq!(cur.peek(3), b"o");
        assert_eq!(cur.peek_exactly(2).unwrap_err().available, 1);
    }

    #[test]
    fn take_while_stops_at_first_mismatch() {
        let mut cur = Cursor::new(b"123abc");
        assert_eq!(cur.take_while(|b| b.is_ascii_digit()), b"123");
        assert_eq!(cur.take_while(|b| b.is_ascii_digit()), b"");
        assert_eq!(cur.as_slice(), b"abc");
    }

    #[test]
    fn slices_outlive_the_cursor() {
        let buf = b"token rest".to_vec();
        let word = {
            let mut cur = Cursor::new(&buf);
            cur.take_while(|b| b != b' ')
        };
        assert_eq!(word, b"token");
    }

    struct UntilColon;

    impl Scanner for UntilColon {
        type Error = ();

        fn step(&mut self, byte: u8) -> Result<Scan, ()> {
            Ok(if byte == b':' { Scan::Stop } else { Scan::Continue })
        }

        fn finish(&mut self) -> Result<(), ()> {
            Err(())
        }
    }

    #[test]
    fn scan_consumes_accepted_prefix_only() {
        let mut cur = Cursor::new(b"key:value");
        assert_eq!(cur.scan(UntilColon).unwrap(), b"key");
        assert_eq!(cur.peek_byte(), Some(b':'));
    }

    #[test]
    fn failed_scan_leaves_position_unchanged() {
        let mut cur = Cursor::new(b"no-colon-here");
        cur.advance(3);
        assert!(cur.scan(UntilColon).is_err());
        assert_eq!(cur.position(), 3);
    }
}
