//! `media-type` and `media-range`.

use super::{Malformed, Parameter, Quality, backtrack, chars, lowercase, parse_parameters, parse_token};
use crate::cursor::Cursor;
use crate::ensure;
use std::borrow::Cow;
use std::fmt;

/// A concrete media type, as found in `Content-Type`. No wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType<'a> {
    pub kind: Cow<'a, str>,
    pub subtype: Cow<'a, str>,
    pub parameters: Vec<Parameter<'a>>,
}

impl<'a> MediaType<'a> {
    /// The first value of parameter `name`, if present.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.parameters.iter().find(|p| p.name == name).map(|p| p.value.as_ref())
    }

    pub fn charset(&self) -> Option<&str> {
        self.param("charset")
    }

    /// Views this concrete type as a range, for matching against server
    /// candidate lists.
    pub fn as_range(&self) -> MediaRange<'_> {
        MediaRange {
            kind: Cow::Borrowed(self.kind.as_ref()),
            subtype: Cow::Borrowed(self.subtype.as_ref()),
            parameters: self
                .parameters
                .iter()
                .map(|p| Parameter::new(p.name.as_ref(), p.value.as_ref()))
                .collect(),
            weight: Quality::MAX,
        }
    }
}

impl fmt::Display for MediaType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)?;
        for p in &self.parameters {
            write!(f, "; {p}")?;
        }
        Ok(())
    }
}

/// One element of an `Accept` list, or one entry of a server-declared list of
/// acceptable types. `*` wildcards are allowed for kind and subtype, and a
/// quality weight ranks the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRange<'a> {
    pub kind: Cow<'a, str>,
    pub subtype: Cow<'a, str>,
    pub parameters: Vec<Parameter<'a>>,
    pub weight: Quality,
}

impl<'a> MediaRange<'a> {
    /// `*/*` at default quality.
    pub fn any() -> MediaRange<'static> {
        MediaRange::of("*", "*")
    }

    /// A range from already-lowercase parts, at default quality.
    pub fn of(kind: &'a str, subtype: &'a str) -> MediaRange<'a> {
        MediaRange {
            kind: Cow::Borrowed(kind),
            subtype: Cow::Borrowed(subtype),
            parameters: Vec::new(),
            weight: Quality::MAX,
        }
    }

    pub fn with_param(mut self, name: &'a str, value: &'a str) -> Self {
        self.parameters.push(Parameter::new(name, value));
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.parameters.iter().find(|p| p.name == name).map(|p| p.value.as_ref())
    }

    pub fn is_any(&self) -> bool {
        self.kind == "*"
    }

    /// Whether this range accepts `candidate`.
    ///
    /// Kind and subtype must match, with `*` on this side matching anything.
    /// Every parameter named by this range must be compatible with the
    /// candidate: a candidate that lacks the parameter is compatible, a
    /// candidate with a conflicting value is not. Values compare
    /// case-insensitively, weights are ignored.
    pub fn matches(&self, candidate: &MediaRange<'_>) -> bool {
        if self.kind != "*" && self.kind != candidate.kind {
            return false;
        }
        if self.subtype != "*" && self.subtype != candidate.subtype {
            return false;
        }
        self.parameters.iter().all(|p| match candidate.param(&p.name) {
            None => true,
            Some(value) => value.eq_ignore_ascii_case(&p.value),
        })
    }
}

impl fmt::Display for MediaRange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)?;
        for p in &self.parameters {
            write!(f, "; {p}")?;
        }
        if self.weight != Quality::MAX {
            write!(f, "; q={}", self.weight)?;
        }
        Ok(())
    }
}

fn type_token<'a>(cur: &mut Cursor<'a>) -> Result<&'a str, Malformed> {
    // '*' is a tchar, so wildcard validity is checked after tokenizing
    let token = parse_token(cur)?;
    ensure!(token == "*" || !token.contains('*'), Malformed);
    Ok(token)
}

/// Parses a concrete `media-type`. Wildcards are malformed here.
pub fn parse_media_type<'a>(cur: &mut Cursor<'a>) -> Result<MediaType<'a>, Malformed> {
    backtrack(cur, |cur| {
        let kind = type_token(cur)?;
        ensure!(cur.peek_byte() == Some(b'/'), Malformed);
        cur.advance(1);
        let subtype = type_token(cur)?;
        ensure!(kind != "*" && subtype != "*", Malformed);
        let parameters = parse_parameters(cur)?;
        Ok(MediaType { kind: lowercase(kind), subtype: lowercase(subtype), parameters })
    })
}

/// Parses a `media-range` with its optional weight.
///
/// The parameter list is parsed in full, then every `q` parameter is pulled
/// out of it into the weight: the first `q` wins, later ones are dropped,
/// and the remaining parameters keep their order.
pub fn parse_media_range<'a>(cur: &mut Cursor<'a>) -> Result<MediaRange<'a>, Malformed> {
    backtrack(cur, |cur| {
        let kind = type_token(cur)?;
        ensure!(cur.peek_byte() == Some(b'/'), Malformed);
        cur.advance(1);
        let subtype = type_token(cur)?;
        ensure!(kind != "*" || subtype == "*", Malformed);
        let collected = parse_parameters(cur)?;
        let mut parameters = Vec::with_capacity(collected.len());
        let mut weight = Quality::default();
        let mut weight_seen = false;
        for p in collected {
            if p.name == "q" {
                if !weight_seen {
                    weight = super::quality::qvalue_from_str(&p.value)?;
                    weight_seen = true;
                }
            } else {
                parameters.push(p);
            }
        }
        Ok(MediaRange { kind: lowercase(kind), subtype: lowercase(subtype), parameters, weight })
    })
}

/// Parses a whole `Accept` value into its ranges, order preserved.
pub fn parse_accept(value: &[u8]) -> Result<Vec<MediaRange<'_>>, Malformed> {
    let mut cur = Cursor::new(value);
    super::comma_list(&mut cur, parse_media_range)
}

/// Parses a whole `Content-Type` value: exactly one concrete media type.
pub fn parse_content_type(value: &[u8]) -> Result<MediaType<'_>, Malformed> {
    let mut cur = Cursor::new(value);
    chars::skip_ows(&mut cur);
    let media_type = parse_media_type(&mut cur)?;
    chars::skip_ows(&mut cur);
    ensure!(cur.is_empty(), Malformed);
    Ok(media_type)
}
