//! Character classes of the field-value grammar.

use crate::cursor::Cursor;

const fn build_tchar_table() -> [bool; 256] {
    let mut table = [false; 256];
    let mut i = 0usize;
    while i < 256 {
        let b = i as u8;
        table[i] = b.is_ascii_alphanumeric()
            || matches!(
                b,
                b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
            );
        i += 1;
    }
    table
}

static TCHAR: [bool; 256] = build_tchar_table();

/// `tchar`: any visible ASCII character allowed in a token.
#[inline]
pub(crate) fn is_tchar(b: u8) -> bool {
    TCHAR[b as usize]
}

/// Optional whitespace: space or horizontal tab.
#[inline]
pub(crate) fn is_ows(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// `qdtext`: bytes allowed unescaped inside a quoted string, including
/// `obs-text` (0x80..=0xFF).
#[inline]
pub(crate) fn is_qdtext(b: u8) -> bool {
    matches!(b, b'\t' | b' ' | 0x21 | 0x23..=0x5B | 0x5D..=0x7E | 0x80..=0xFF)
}

/// Bytes that may follow a backslash inside a quoted string.
#[inline]
pub(crate) fn is_quoted_pair_byte(b: u8) -> bool {
    matches!(b, b'\t' | b' ' | 0x21..=0x7E | 0x80..=0xFF)
}

/// Consumes any run of optional whitespace.
#[inline]
pub(crate) fn skip_ows(cur: &mut Cursor<'_>) {
    cur.take_while(is_ows);
}
