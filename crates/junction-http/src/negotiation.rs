//! `Accept` header negotiation.
//!
//! Each offered type is scored against the most specific media range that
//! matches it. Offers are then ranked by quality, specificity, the position
//! of that range in the header, and finally the order they were offered in.

use mime::Mime;

use crate::mime_types;

#[derive(Debug)]
struct MediaRange {
    mime: Mime,
    quality: f32,
    position: usize,
}

#[derive(Debug)]
struct Score {
    quality: f32,
    specificity: u8,
    position: usize,
    offered: usize,
}

fn parse_accept(header: &str) -> Vec<MediaRange> {
    header
        .split(',')
        .enumerate()
        .filter_map(|(position, entry)| {
            let mime: Mime = entry.trim().parse().ok()?;
            let quality = mime
                .get_param("q")
                .and_then(|q| q.as_str().parse::<f32>().ok())
                .unwrap_or(1.0);
            Some(MediaRange {
                mime,
                quality,
                position,
            })
        })
        .collect()
}

fn specificity(range: &Mime, offered: &Mime) -> Option<u8> {
    let mut score = 0;
    if range.type_() == offered.type_() {
        score |= 4;
    } else if range.type_() != mime::STAR {
        return None;
    }
    if range.subtype() == offered.subtype() {
        score |= 2;
    } else if range.subtype() != mime::STAR {
        return None;
    }

    let mut params = range.params().filter(|(name, _)| name.as_str() != "q").peekable();
    if params.peek().is_some() {
        let all_match = params.all(|(name, value)| {
            offered
                .get_param(name.as_str())
                .is_some_and(|v| v.as_str().eq_ignore_ascii_case(value.as_str()))
        });
        if !all_match {
            return None;
        }
        score |= 1;
    }
    Some(score)
}

/// Picks the offered type the client prefers.
///
/// `offered` entries are either full types (`"text/html"`) or extensions
/// (`"html"`, `"json"`). The matching entry is returned as it was given.
/// Without an `Accept` header the first offer is returned.
///
/// # Examples
///
/// ```
/// use junction_http::negotiation::preferred;
///
/// assert_eq!(preferred(None, &["json", "html"]), Some("json"));
/// assert_eq!(preferred(Some("text/html"), &["json", "html"]), Some("html"));
/// assert_eq!(preferred(Some("foo/bar"), &["json"]), None);
/// ```
pub fn preferred<'a>(accept: Option<&str>, offered: &[&'a str]) -> Option<&'a str> {
    let Some(header) = accept.filter(|h| !h.trim().is_empty()) else {
        return offered.first().copied();
    };
    let ranges = parse_accept(header);

    let mut scores: Vec<Score> = offered
        .iter()
        .enumerate()
        .filter_map(|(index, offer)| {
            let essence = if offer.contains('/') {
                (*offer).to_string()
            } else {
                mime_types::lookup(offer)?.to_string()
            };
            let offered_mime: Mime = essence.parse().ok()?;

            ranges
                .iter()
                .filter_map(|range| {
                    specificity(&range.mime, &offered_mime).map(|s| (s, range))
                })
                .max_by(|(sa, a), (sb, b)| {
                    sa.cmp(sb)
                        .then(a.quality.total_cmp(&b.quality))
                        .then(b.position.cmp(&a.position))
                })
                .map(|(specificity, range)| Score {
                    quality: range.quality,
                    specificity,
                    position: range.position,
                    offered: index,
                })
        })
        .filter(|score| score.quality > 0.0)
        .collect();

    scores.sort_by(|a, b| {
        b.quality
            .total_cmp(&a.quality)
            .then(b.specificity.cmp(&a.specificity))
            .then(a.position.cmp(&b.position))
            .then(a.offered.cmp(&b.offered))
    });
    scores.first().map(|score| offered[score.offered])
}
