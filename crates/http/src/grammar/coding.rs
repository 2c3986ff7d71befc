//! `codings` as they appear in `Accept-Encoding`.

use super::{Malformed, Quality, backtrack, lowercase, parse_token, parse_weight};
use crate::cursor::Cursor;
use std::borrow::Cow;
use std::fmt;

/// One `Accept-Encoding` element: a lowercased content coding (or `*`) plus
/// its weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coding<'a> {
    pub name: Cow<'a, str>,
    pub weight: Quality,
}

impl<'a> Coding<'a> {
    pub fn of(name: &'a str, weight: Quality) -> Coding<'a> {
        Coding { name: Cow::Borrowed(name), weight }
    }

    /// Whether this is the `*` wildcard coding.
    pub fn is_any(&self) -> bool {
        self.name == "*"
    }
}

impl fmt::Display for Coding<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weight == Quality::MAX {
            f.write_str(&self.name)
        } else {
            write!(f, "{};q={}", self.name, self.weight)
        }
    }
}

/// Parses one coding with its optional weight.
pub fn parse_coding<'a>(cur: &mut Cursor<'a>) -> Result<Coding<'a>, Malformed> {
    backtrack(cur, |cur| {
        // '*' is a tchar, so the wildcard arrives through the same tokenizer
        let token = parse_token(cur)?;
        let name = if token == "*" {
            Cow::Borrowed("*")
        } else if token.contains('*') {
            return Err(Malformed);
        } else {
            lowercase(token)
        };
        let weight = parse_weight(cur)?.unwrap_or_default();
        Ok(Coding { name, weight })
    })
}

/// Parses a whole `Accept-Encoding` header.
///
/// The absent, empty, and blank cases each mean something different:
/// - `None` (header absent): the client voiced no opinion, every coding is
///   acceptable. Yields `[*]`.
/// - `Some("")` (empty value): only the identity transformation is
///   acceptable. Yields `[identity]`.
/// - whitespace only: zero codings; negotiation falls back to identity on
///   its own.
pub fn parse_accept_encoding(value: Option<&[u8]>) -> Result<Vec<Coding<'_>>, Malformed> {
    match value {
        None => Ok(vec![Coding::of("*", Quality::MAX)]),
        Some(value) if value.is_empty() => Ok(vec![Coding::of("identity", Quality::MAX)]),
        Some(value) => {
            let mut cur = Cursor::new(value);
            super::comma_list(&mut cur, parse_coding)
        }
    }
}
