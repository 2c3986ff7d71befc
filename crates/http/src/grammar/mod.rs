//! Recursive-descent parsers for the HTTP field-value grammar.
//!
//! Implements the productions this server actually consumes, following the
//! ABNF of [RFC 9110]:
//!
//! ```text
//! token          = 1*tchar
//! quoted-string  = DQUOTE *( qdtext / quoted-pair ) DQUOTE
//! parameter      = OWS ";" OWS token "=" ( token / quoted-string )
//! qvalue         = ( "0" [ "." 0*3DIGIT ] ) / ( "1" [ "." 0*3("0") ] )
//! weight         = OWS ";" OWS "q=" qvalue
//! media-type     = token "/" token *parameter
//! media-range    = ( "*/*" / ( token "/*" ) / ( token "/" token ) ) *parameter [ weight ]
//! codings        = content-coding / "*"
//! ```
//!
//! Lists use the `#rule`: elements separated by OWS "," OWS, with empty
//! elements skipped.
//!
//! Every parser runs over a [`Cursor`](crate::cursor::Cursor) and returns
//! slices or copy-on-write strings borrowing the input buffer. A parser that
//! fails leaves the cursor where it found it, so alternatives can be tried in
//! sequence. All failures collapse into the unit error [`Malformed`]; callers
//! decide which 400-class response that becomes.
//!
//! [RFC 9110]: https://datatracker.ietf.org/doc/html/rfc9110

pub(crate) mod chars;
mod coding;
mod media;
mod parameter;
mod quality;
mod quoted;
mod token;

pub use coding::{Coding, parse_accept_encoding, parse_coding};
pub use media::{MediaRange, MediaType, parse_accept, parse_content_type, parse_media_range, parse_media_type};
pub use parameter::{Parameter, parse_parameter, parse_parameters};
pub use quality::{Quality, parse_weight};
pub use quoted::{parse_quoted_string, quote};
pub use token::{is_token, parse_token};

use crate::cursor::Cursor;

/// A field value that does not conform to the grammar.
///
/// Deliberately carries no detail: the caller knows which header it was
/// parsing, and malformed input from the network is not worth describing
/// byte by byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("malformed field value")]
pub struct Malformed;

/// Runs `f`, rewinding the cursor if it fails.
pub(crate) fn backtrack<'a, T>(
    cur: &mut Cursor<'a>,
    f: impl FnOnce(&mut Cursor<'a>) -> Result<T, Malformed>,
) -> Result<T, Malformed> {
    let saved = *cur;
    let result = f(cur);
    if result.is_err() {
        *cur = saved;
    }
    result
}

/// Lowercases `s`, borrowing when it already is lowercase.
pub(crate) fn lowercase(s: &str) -> std::borrow::Cow<'_, str> {
    if s.bytes().any(|b| b.is_ascii_uppercase()) {
        std::borrow::Cow::Owned(s.to_ascii_lowercase())
    } else {
        std::borrow::Cow::Borrowed(s)
    }
}

/// Parses a `#rule` comma list, requiring the cursor to be fully consumed.
///
/// Empty elements (`, ,`) are skipped, so a value made of nothing but commas
/// and whitespace parses as an empty list. A byte that is neither part of an
/// element nor a separator fails the whole list.
pub(crate) fn comma_list<'a, T>(
    cur: &mut Cursor<'a>,
    mut element: impl FnMut(&mut Cursor<'a>) -> Result<T, Malformed>,
) -> Result<Vec<T>, Malformed> {
    let mut items = Vec::new();
    loop {
        chars::skip_ows(cur);
        match cur.peek_byte() {
            None => break,
            Some(b',') => {
                cur.advance(1);
                continue;
            }
            Some(_) => {}
        }
        items.push(element(cur)?);
        chars::skip_ows(cur);
        match cur.peek_byte() {
            None => break,
            Some(b',') => {
                cur.advance(1);
            }
            Some(_) => return Err(Malformed),
        }
    }
    Ok(items)
}
