//! Typed path templates for dynamic route segments.
//!
//! A template alternates literal segments with named, typed parameters and
//! matches one `/`-delimited span at a time. Matching is exact: the URL must
//! consume the bound prefix plus every template segment, with nothing left
//! over except an optional query string when the template allows one.

use std::cmp::Ordering;
use std::fmt;

/// The longest accepted [`ParamKind::Uid`] value, in bytes.
pub const UID_MAX_LEN: usize = 255;

const UINT32_MAX: &str = "4294967295";
const UINT53_MAX: &str = "9007199254740991";

/// What a dynamic segment is allowed to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// An opaque identifier: any non-empty segment of at most
    /// [`UID_MAX_LEN`] bytes.
    Uid,
    /// A decimal unsigned integer of at most 32 bits.
    Uint32,
    /// A decimal unsigned integer of at most 53 bits.
    Uint53,
}

impl ParamKind {
    /// Whether `span` is a valid value for this kind.
    ///
    /// Integer kinds take plain decimal digits with no sign and no leading
    /// zero (a lone `0` is fine). The range check compares the digit string
    /// against the exact maximum lexicographically, so values near the bound
    /// never pass through a lossy numeric conversion.
    pub fn accepts(self, span: &str) -> bool {
        match self {
            ParamKind::Uid => !span.is_empty() && span.len() <= UID_MAX_LEN,
            ParamKind::Uint32 => decimal_within(span, UINT32_MAX),
            ParamKind::Uint53 => decimal_within(span, UINT53_MAX),
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            ParamKind::Uid => "",
            ParamKind::Uint32 => ":u32",
            ParamKind::Uint53 => ":u53",
        }
    }
}

fn decimal_within(span: &str, max: &str) -> bool {
    if span.is_empty() || !span.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if span.len() > 1 && span.starts_with('0') {
        return false;
    }
    match span.len().cmp(&max.len()) {
        Ordering::Less => true,
        Ordering::Equal => span <= max,
        Ordering::Greater => false,
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Param { name: String, kind: ParamKind },
}

/// A dynamic path shape, bound at registration to the prefix of the
/// subrouter chain it lives under.
#[derive(Debug, Clone, Default)]
pub struct PathTemplate {
    prefix: String,
    segments: Vec<Segment>,
    allow_query: bool,
}

impl PathTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a literal segment.
    pub fn literal(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::Literal(text.into()));
        self
    }

    /// Appends a named, typed parameter segment.
    pub fn param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.segments.push(Segment::Param { name: name.into(), kind });
        self
    }

    /// Tolerates a trailing `?query` after the final segment.
    pub fn allow_query(mut self) -> Self {
        self.allow_query = true;
        self
    }

    /// Binds the shape to the prefix it will be matched under.
    pub(crate) fn bind(&mut self, prefix: String) {
        self.prefix = prefix;
    }

    /// Whether `target` is exactly this template under its prefix. A miss
    /// costs one walk and no allocation.
    pub fn matches(&self, target: &str) -> bool {
        let Some(rest) = target.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        match self.walk(rest, |_, _| {}) {
            Some(consumed) => self.tail_fits(&rest[consumed..]),
            None => false,
        }
    }

    /// Re-walks a matching `target` and slices out the parameter values in
    /// declaration order. `None` when the target does not match.
    pub fn extract(&self, target: &str) -> Option<Vec<(String, String)>> {
        let rest = target.strip_prefix(self.prefix.as_str())?;
        let mut params = Vec::new();
        let consumed = self.walk(rest, |name, value| params.push((name.to_owned(), value.to_owned())))?;
        self.tail_fits(&rest[consumed..]).then_some(params)
    }

    /// Walks `rest` segment by segment, reporting each captured parameter,
    /// and returns how many bytes the segments consumed.
    fn walk(&self, rest: &str, mut capture: impl FnMut(&str, &str)) -> Option<usize> {
        let mut consumed = 0;
        for segment in &self.segments {
            let tail = rest[consumed..].strip_prefix('/')?;
            let end = tail.find(['/', '?']).unwrap_or(tail.len());
            let span = &tail[..end];
            match segment {
                Segment::Literal(text) => {
                    if span != text {
                        return None;
                    }
                }
                Segment::Param { name, kind } => {
                    if !kind.accepts(span) {
                        return None;
                    }
                    capture(name, span);
                }
            }
            consumed += 1 + span.len();
        }
        Some(consumed)
    }

    fn tail_fits(&self, tail: &str) -> bool {
        tail.is_empty() || (self.allow_query && tail.starts_with('?'))
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)?;
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => write!(f, "/{text}")?,
                Segment::Param { name, kind } => write!(f, "/{{{name}{}}}", kind.suffix())?,
            }
        }
        Ok(())
    }
}
