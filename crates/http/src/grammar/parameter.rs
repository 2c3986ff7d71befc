//! `parameter = OWS ";" OWS token "=" ( token / quoted-string )`

use super::{Malformed, backtrack, chars, lowercase, parse_quoted_string, parse_token};
use crate::cursor::Cursor;
use crate::ensure;
use std::borrow::Cow;
use std::fmt;

/// A single `;name=value` parameter. Names are lowercased; values keep their
/// case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter<'a> {
    pub name: Cow<'a, str>,
    pub value: Cow<'a, str>,
}

impl<'a> Parameter<'a> {
    /// Builds a parameter from already-validated parts. The name is assumed
    /// lowercase.
    pub fn new(name: impl Into<Cow<'a, str>>, value: impl Into<Cow<'a, str>>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

impl fmt::Display for Parameter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if super::is_token(&self.value) {
            write!(f, "{}={}", self.name, self.value)
        } else {
            write!(f, "{}={}", self.name, super::quote(&self.value))
        }
    }
}

/// Parses one parameter, starting at its `;`.
pub fn parse_parameter<'a>(cur: &mut Cursor<'a>) -> Result<Parameter<'a>, Malformed> {
    backtrack(cur, |cur| {
        chars::skip_ows(cur);
        ensure!(cur.peek_byte() == Some(b';'), Malformed);
        cur.advance(1);
        chars::skip_ows(cur);
        let name = parse_token(cur)?;
        ensure!(cur.peek_byte() == Some(b'='), Malformed);
        cur.advance(1);
        let value = if cur.peek_byte() == Some(b'"') {
            parse_quoted_string(cur)?
        } else {
            Cow::Borrowed(parse_token(cur)?)
        };
        Ok(Parameter { name: lowercase(name), value })
    })
}

/// Collects zero or more parameters, in order, duplicates preserved.
pub fn parse_parameters<'a>(cur: &mut Cursor<'a>) -> Result<Vec<Parameter<'a>>, Malformed> {
    let mut params = Vec::new();
    while starts_parameter(cur) {
        params.push(parse_parameter(cur)?);
    }
    Ok(params)
}

/// Whether a `;` (after OWS) is ahead, without consuming anything.
pub(crate) fn starts_parameter(cur: &Cursor<'_>) -> bool {
    let mut probe = *cur;
    chars::skip_ows(&mut probe);
    probe.peek_byte() == Some(b';')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_value() {
        let mut cur = Cursor::new(b"; charset=utf-8");
        let p = parse_parameter(&mut cur).unwrap();
        assert_eq!(p.name, "charset");
        assert_eq!(p.value, "utf-8");
        assert!(cur.is_empty());
    }

    #[test]
    fn quoted_value_and_empty_quoted_value() {
        let mut cur = Cursor::new(b";title=\"a; b\"");
        let p = parse_parameter(&mut cur).unwrap();
        assert_eq!(p.value, "a; b");

        let mut cur = Cursor::new(b";title=\"\"");
        assert_eq!(parse_parameter(&mut cur).unwrap().value, "");
    }

    #[test]
    fn name_is_lowercased_value_is_not() {
        let mut cur = Cursor::new(b";CharSet=UTF-8");
        let p = parse_parameter(&mut cur).unwrap();
        assert_eq!(p.name, "charset");
        assert_eq!(p.value, "UTF-8");
    }

    #[test]
    fn missing_value_is_malformed() {
        for input in [&b";name"[..], b";name=", b";=v", b"name=v"] {
            let mut cur = Cursor::new(input);
            assert_eq!(parse_parameter(&mut cur), Err(Malformed), "input {input:?}");
            assert_eq!(cur.position(), 0);
        }
    }

    #[test]
    fn collects_in_order_with_duplicates() {
        let mut cur = Cursor::new(b"; a=1 ;b=2; a=3");
        let params = parse_parameters(&mut cur).unwrap();
        let pairs: Vec<_> = params.iter().map(|p| (p.name.as_ref(), p.value.as_ref())).collect();
        assert_eq!(pairs, [("a", "1"), ("b", "2"), ("a", "3")]);
    }

    #[test]
    fn no_parameters_is_empty() {
        let mut cur = Cursor::new(b", next");
        assert!(parse_parameters(&mut cur).unwrap().is_empty());
        assert_eq!(cur.position(), 0);
    }

    #[test]
    fn display_quotes_when_needed() {
        assert_eq!(Parameter::new("charset", "utf-8").to_string(), "charset=utf-8");
        assert_eq!(Parameter::new("title", "a b").to_string(), "title=\"a b\"");
        assert_eq!(Parameter::new("title", "").to_string(), "title=\"\"");
    }
}
