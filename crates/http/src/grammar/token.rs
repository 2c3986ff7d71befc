//! `token = 1*tchar`

use super::{Malformed, chars};
use crate::cursor::Cursor;
use crate::ensure;

/// Parses a token, returning it as a borrowed `&str`.
///
/// Tokens are pure ASCII by construction, so the conversion from bytes never
/// allocates and never fails.
pub fn parse_token<'a>(cur: &mut Cursor<'a>) -> Result<&'a str, Malformed> {
    let raw = cur.take_while(chars::is_tchar);
    ensure!(!raw.is_empty(), Malformed);
    match std::str::from_utf8(raw) {
        Ok(s) => Ok(s),
        Err(_) => Err(Malformed),
    }
}

/// Whether `s` could be emitted as a bare token, or needs quoting.
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(chars::is_tchar)
}
