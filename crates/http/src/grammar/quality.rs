//! `qvalue` and `weight`.
//!
//! Qualities are kept as an integer count of thousandths (`0..=1000`) so that
//! ordering is exact and serialization reproduces what was parsed. Floating
//! point would make `0.1` print as something else.

use super::{Malformed, backtrack, chars};
use crate::cursor::Cursor;
use crate::ensure;
use std::fmt;

/// A quality value: thousandths in `0..=1000`, defaulting to `1000` (`q=1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u16);

impl Quality {
    pub const MAX: Quality = Quality(1000);
    pub const ZERO: Quality = Quality(0);

    /// Builds a quality from thousandths, rejecting values above `1000`.
    pub fn from_thousandths(value: u16) -> Option<Quality> {
        (value <= 1000).then_some(Quality(value))
    }

    #[inline]
    pub fn thousandths(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality::MAX
    }
}

impl fmt::Display for Quality {
    /// Canonical form: `1`, `0`, or `0.` followed by up to three digits with
    /// trailing zeros trimmed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            1000 => f.write_str("1"),
            0 => f.write_str("0"),
            mut frac => {
                let mut width = 3;
                while frac % 10 == 0 {
                    frac /= 10;
                    width -= 1;
                }
                write!(f, "0.{frac:0width$}")
            }
        }
    }
}

/// Parses a bare `qvalue`.
pub(crate) fn parse_qvalue(cur: &mut Cursor<'_>) -> Result<Quality, Malformed> {
    backtrack(cur, |cur| match cur.peek_byte() {
        Some(b'0') => {
            cur.advance(1);
            let mut thousandths = 0u16;
            if cur.peek_byte() == Some(b'.') {
                cur.advance(1);
                let digits = cur.take_while(|b| b.is_ascii_digit());
                ensure!(digits.len() <= 3, Malformed);
                for (i, &d) in digits.iter().enumerate() {
                    thousandths += u16::from(d - b'0') * [100, 10, 1][i];
                }
            }
            Ok(Quality(thousandths))
        }
        Some(b'1') => {
            cur.advance(1);
            if cur.peek_byte() == Some(b'.') {
                cur.advance(1);
                let digits = cur.take_while(|b| b.is_ascii_digit());
                ensure!(digits.len() <= 3 && digits.iter().all(|&d| d == b'0'), Malformed);
            }
            Ok(Quality::MAX)
        }
        _ => Err(Malformed),
    })
}

/// Parses a qvalue that arrived as a whole parameter value.
pub(crate) fn qvalue_from_str(s: &str) -> Result<Quality, Malformed> {
    let mut cur = Cursor::new(s.as_bytes());
    let quality = parse_qvalue(&mut cur)?;
    if !cur.is_empty() {
        return Err(Malformed);
    }
    Ok(quality)
}

/// Parses an optional `weight`: OWS `;` OWS `q=` qvalue, with `q`
/// case-insensitive.
///
/// Returns `Ok(None)` without consuming anything when the input ahead is not
/// a weight at all (for example a `;charset=...` parameter). A weight whose
/// qvalue is garbage is `Malformed` rather than `None`.
pub fn parse_weight(cur: &mut Cursor<'_>) -> Result<Option<Quality>, Malformed> {
    let saved = *cur;
    chars::skip_ows(cur);
    if cur.peek_byte() != Some(b';') {
        *cur = saved;
        return Ok(None);
    }
    cur.advance(1);
    chars::skip_ows(cur);
    if !matches!(cur.peek(2), [b'q' | b'Q', b'=']) {
        *cur = saved;
        return Ok(None);
    }
    cur.advance(2);
    match parse_qvalue(cur) {
        Ok(quality) => Ok(Some(quality)),
        Err(e) => {
            *cur = saved;
            Err(e)
        }
    }
}
