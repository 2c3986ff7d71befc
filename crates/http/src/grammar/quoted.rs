//! `quoted-string = DQUOTE *( qdtext / quoted-pair ) DQUOTE`

use super::{Malformed, chars};
use crate::cursor::{Cursor, Scan, Scanner};
use crate::ensure;
use std::borrow::Cow;

enum State {
    Open,
    Body,
    Escape,
}

/// Recognizes a complete quoted string, including both quotes.
///
/// Fails closed: a missing closing quote, a dangling backslash, or a control
/// byte inside the string is [`Malformed`] rather than a shorter match.
struct QuoteScanner {
    state: State,
}

impl Scanner for QuoteScanner {
    type Error = Malformed;

    fn step(&mut self, byte: u8) -> Result<Scan, Malformed> {
        match self.state {
            State::Open => {
                ensure!(byte == b'"', Malformed);
                self.state = State::Body;
                Ok(Scan::Continue)
            }
            State::Body => match byte {
                b'"' => Ok(Scan::Take),
                b'\\' => {
                    self.state = State::Escape;
                    Ok(Scan::Continue)
                }
                b if chars::is_qdtext(b) => Ok(Scan::Continue),
                _ => Err(Malformed),
            },
            State::Escape => {
                ensure!(chars::is_quoted_pair_byte(byte), Malformed);
                self.state = State::Body;
                Ok(Scan::Continue)
            }
        }
    }

    fn finish(&mut self) -> Result<(), Malformed> {
        Err(Malformed)
    }
}

/// Parses a quoted string and undoes its escaping.
///
/// Borrows the input when no escapes occurred; allocates only when a
/// `quoted-pair` forces a rewrite. Bytes that do not form valid UTF-8 are
/// replaced rather than rejected, since the grammar is byte-oriented but the
/// values this server cares about are text.
pub fn parse_quoted_string<'a>(cur: &mut Cursor<'a>) -> Result<Cow<'a, str>, Malformed> {
    let raw = cur.scan(QuoteScanner { state: State::Open })?;
    Ok(unescape(&raw[1..raw.len() - 1]))
}

fn unescape(inner: &[u8]) -> Cow<'_, str> {
    if !inner.contains(&b'\\') {
        return String::from_utf8_lossy(inner);
    }
    let mut out = Vec::with_capacity(inner.len());
    let mut escaped = false;
    for &b in inner {
        if escaped {
            out.push(b);
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else {
            out.push(b);
        }
    }
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

/// The inverse transform: wraps `value` in quotes, escaping `"` and `\`.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
