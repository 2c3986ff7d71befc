//! Proactive content negotiation over parsed `Accept` / `Accept-Encoding`
//! values.
//!
//! Selection is deterministic: client quality ranks first, then a fixed
//! server preference order breaks ties. Callers turn a failed negotiation
//! into a 406.

use crate::grammar::{Coding, MediaRange, Quality};
use std::cmp::Reverse;
use std::fmt;

/// The content codings this server can produce and consume.
///
/// Server preference runs identity < gzip < brotli: when the client is
/// indifferent, the densest coding wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Brotli,
}

impl ContentEncoding {
    /// All known encodings, in ascending server preference.
    pub const ALL: [ContentEncoding; 3] = [ContentEncoding::Identity, ContentEncoding::Gzip, ContentEncoding::Brotli];

    /// The registered coding name: `identity`, `gzip` or `br`.
    pub fn name(self) -> &'static str {
        match self {
            ContentEncoding::Identity => "identity",
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Brotli => "br",
        }
    }

    /// Looks up a (lowercased) coding name.
    pub fn from_name(name: &str) -> Option<ContentEncoding> {
        match name {
            "identity" => Some(ContentEncoding::Identity),
            "gzip" => Some(ContentEncoding::Gzip),
            "br" => Some(ContentEncoding::Brotli),
            _ => None,
        }
    }

    #[inline]
    pub fn is_identity(self) -> bool {
        matches!(self, ContentEncoding::Identity)
    }

    fn preference(self) -> u8 {
        match self {
            ContentEncoding::Identity => 0,
            ContentEncoding::Gzip => 1,
            ContentEncoding::Brotli => 2,
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Picks the response encoding from the client's `Accept-Encoding` codings.
///
/// Unknown codings are ignored. A `*` stands for every known encoding the
/// client did not mention explicitly, inheriting the catch-all's quality.
/// Candidates sort by quality descending, ties broken by server preference.
/// `None` means the winner was explicitly rejected (`q=0`) and the caller
/// should answer 406.
///
/// When nothing known was mentioned at all (the empty list, or only codings
/// this server has never heard of), the answer is identity: an identity
/// response is acceptable unless the client shut it out explicitly.
pub fn select_encoding(codings: &[Coding<'_>]) -> Option<ContentEncoding> {
    let mut candidates: Vec<(ContentEncoding, Quality)> = Vec::with_capacity(ContentEncoding::ALL.len());
    let mut catch_all: Option<Quality> = None;
    for coding in codings {
        if coding.is_any() {
            if catch_all.is_none() {
                catch_all = Some(coding.weight);
            }
            continue;
        }
        if let Some(encoding) = ContentEncoding::from_name(&coding.name) {
            // first mention of a coding wins, repeats are ignored
            if !candidates.iter().any(|(known, _)| *known == encoding) {
                candidates.push((encoding, coding.weight));
            }
        }
    }
    if let Some(quality) = catch_all {
        for encoding in ContentEncoding::ALL {
            if !candidates.iter().any(|(known, _)| *known == encoding) {
                candidates.push((encoding, quality));
            }
        }
    }

    let best = candidates
        .into_iter()
        .max_by_key(|&(encoding, quality)| (quality, encoding.preference()));
    match best {
        None => Some(ContentEncoding::Identity),
        Some((_, quality)) if quality.is_zero() => None,
        Some((encoding, _)) => Some(encoding),
    }
}

/// Picks a response media type.
///
/// `available` is the server's candidate list in server preference order.
/// Requested ranges are visited in descending quality (earlier ranges win
/// ties), and for each the candidates are scanned in order; the first
/// candidate the range [`matches`](MediaRange::matches) is the result.
/// `None` means no requested range matches any candidate and the caller
/// should answer 406.
pub fn select_accept<'c, 'v>(
    requested: &[MediaRange<'_>],
    available: &'c [MediaRange<'v>],
) -> Option<&'c MediaRange<'v>> {
    let mut order: Vec<usize> = (0..requested.len()).collect();
    order.sort_by_key(|&i| Reverse(requested[i].weight));
    for &i in &order {
        let range = &requested[i];
        for candidate in available {
            if range.matches(candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{parse_accept, parse_accept_encoding};

    fn encoding_for(header: Option<&[u8]>) -> Option<ContentEncoding> {
        select_encoding(&parse_accept_encoding(header).unwrap())
    }

    #[test]
    fn explicit_single_coding() {
        assert_eq!(encoding_for(Some(b"gzip")), Some(ContentEncoding::Gzip));
    }

    #[test]
    fn catch_all_yields_highest_priority_known_encoding() {
        assert_eq!(encoding_for(Some(b"*")), Some(ContentEncoding::Brotli));
        assert_eq!(encoding_for(None), Some(ContentEncoding::Brotli));
    }

    #[test]
    fn explicit_mention_escapes_the_catch_all() {
        // * at q=0 masks gzip and br, identity stays explicitly acceptable
        assert_eq!(encoding_for(Some(b"*;q=0, identity")), Some(ContentEncoding::Identity));
    }

    #[test]
    fn quality_ranks_above_server_preference() {
        assert_eq!(
            encoding_for(Some(b"gzip;q=1.0, identity;q=0.5, *;q=0")),
            Some(ContentEncoding::Gzip)
        );
        assert_eq!(encoding_for(Some(b"gzip;q=0.5, br;q=0.4")), Some(ContentEncoding::Gzip));
    }

    #[test]
    fn rejected_winner_means_not_acceptable() {
        assert_eq!(encoding_for(Some(b"identity;q=0")), None);
        assert_eq!(encoding_for(Some(b"*;q=0")), None);
    }

    #[test]
    fn empty_and_blank_headers_fall_back_to_identity() {
        // empty value: identity only
        assert_eq!(encoding_for(Some(b"")), Some(ContentEncoding::Identity));
        // whitespace value: zero codings, identity by default
        assert_eq!(encoding_for(Some(b"  ")), Some(ContentEncoding::Identity));
    }

    #[test]
    fn unknown_codings_are_ignored() {
        assert_eq!(encoding_for(Some(b"deflate, zstd")), Some(ContentEncoding::Identity));
        assert_eq!(encoding_for(Some(b"deflate, gzip;q=0.1")), Some(ContentEncoding::Gzip));
    }

    #[test]
    fn repeated_codings_keep_the_first_weight() {
        assert_eq!(encoding_for(Some(b"gzip;q=0, gzip;q=1")), None);
    }

    fn available() -> Vec<MediaRange<'static>> {
        vec![MediaRange::of("text", "html"), MediaRange::of("application", "json")]
    }

    #[test]
    fn accept_picks_by_quality_then_server_order() {
        let avail = available();
        let requested = parse_accept(b"application/json;q=0.9, text/html;q=0.8").unwrap();
        let picked = select_accept(&requested, &avail).unwrap();
        assert_eq!(picked.subtype, "json");

        let requested = parse_accept(b"*/*").unwrap();
        let picked = select_accept(&requested, &avail).unwrap();
        assert_eq!(picked.subtype, "html", "server order decides under a wildcard");
    }

    #[test]
    fn equal_quality_prefers_the_earlier_range() {
        let avail = available();
        let requested = parse_accept(b"application/json, text/html").unwrap();
        assert_eq!(select_accept(&requested, &avail).unwrap().subtype, "json");
    }

    #[test]
    fn no_overlap_is_none() {
        let avail = available();
        let requested = parse_accept(b"image/png, image/*;q=0.5").unwrap();
        assert!(select_accept(&requested, &avail).is_none());
        assert!(select_accept(&[], &avail).is_none());
    }

    #[test]
    fn range_parameters_constrain_candidates() {
        let avail = vec![
            MediaRange::of("text", "html").with_param("charset", "utf-8"),
            MediaRange::of("application", "json"),
        ];
        let requested = parse_accept(b"text/html;charset=latin-1, application/json;q=0.5").unwrap();
        // the html candidate conflicts on charset, so json wins despite its weight
        assert_eq!(select_accept(&requested, &avail).unwrap().subtype, "json");

        let requested = parse_accept(b"text/html;charset=UTF-8").unwrap();
        assert_eq!(select_accept(&requested, &avail).unwrap().subtype, "html");
    }
}
