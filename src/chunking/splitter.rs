//! Hierarchical recursive text splitter (spec §4.E).
//!
//! Text is split on the strongest separator in a prioritized list;
//! resulting pieces are greedily joined into groups up to `max_size`
//! bytes; any group that is still oversized recurses into the remaining
//! separator list; the empty separator (`""`) is the last resort and
//! permits arbitrary character cuts.

/// One chunk of a larger document before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChunk {
    /// Start byte offset into the parent content (excludes any overlap
    /// prefix borrowed from the previous chunk).
    pub start: usize,
    /// End byte offset into the parent content.
    pub end: usize,
    /// The chunk's text, with a leading overlap prefix from the
    /// previous chunk for every chunk after the first.
    pub content: String,
}

/// Split `text` into contiguous, non-overlapping byte ranges using the
/// separator table `seps`, then materialize each range into a
/// [`RawChunk`] with the configured overlap prefix applied.
pub fn split(text: &str, seps: &[&str], max_size: usize, min_size: usize, overlap: usize) -> Vec<RawChunk> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut ranges = recursive_split(text, 0, text.len(), seps, max_size);
    merge_tiny_trailing_range(&mut ranges, min_size);

    let mut out = Vec::with_capacity(ranges.len());
    let mut prev_text: Option<&str> = None;
    for (start, end) in ranges {
        let own = &text[start..end];
        let content = match prev_text {
            None => own.to_string(),
            Some(prev) => {
                let prefix = overlap_suffix(prev, overlap);
                format!("{prefix}{own}")
            }
        };
        out.push(RawChunk { start, end, content });
        prev_text = Some(own);
    }
    out
}

/// Last `overlap` bytes of `text`, cut back to a char boundary.
fn overlap_suffix(text: &str, overlap: usize) -> &str {
    if overlap == 0 || text.is_empty() {
        return "";
    }
    let mut start = text.len().saturating_sub(overlap);
    while start < text.len() && !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Recursively split `text[lo..hi]` on `seps[0]`, falling through to
/// `seps[1..]` for any resulting group still over `max_size`, until the
/// separator list is exhausted (at which point `""` forces char cuts).
fn recursive_split(text: &str, lo: usize, hi: usize, seps: &[&str], max_size: usize) -> Vec<(usize, usize)> {
    if hi - lo <= max_size {
        return vec![(lo, hi)];
    }
    let Some((&sep, rest)) = seps.split_first() else {
        return char_chunks(text, lo, hi, max_size);
    };
    if sep.is_empty() {
        return char_chunks(text, lo, hi, max_size);
    }

    let pieces = split_on(text, lo, hi, sep);
    if pieces.len() <= 1 {
        return recursive_split(text, lo, hi, rest, max_size);
    }

    let groups = greedy_join(pieces, max_size);

    let mut result = Vec::new();
    for (gs, ge) in groups {
        if ge - gs > max_size {
            result.extend(recursive_split(text, gs, ge, rest, max_size));
        } else {
            result.push((gs, ge));
        }
    }
    result
}

/// Split `text[lo..hi]` into contiguous pieces at every occurrence of
/// `sep`, keeping the separator attached to the piece that precedes it.
fn split_on(text: &str, lo: usize, hi: usize, sep: &str) -> Vec<(usize, usize)> {
    let slice = &text[lo..hi];
    let mut pieces = Vec::new();
    let mut piece_start = lo;
    let mut cursor = 0usize;
    while let Some(rel) = slice[cursor..].find(sep) {
        let boundary = lo + cursor + rel + sep.len();
        pieces.push((piece_start, boundary));
        piece_start = boundary;
        cursor += rel + sep.len();
        if cursor >= slice.len() {
            break;
        }
    }
    if piece_start < hi {
        pieces.push((piece_start, hi));
    }
    pieces.retain(|(a, b)| b > a);
    pieces
}

/// Greedily accumulate contiguous pieces into groups no larger than
/// `max_size` where possible; a single piece already over `max_size`
/// becomes its own (oversized) group for the caller to recurse on.
fn greedy_join(pieces: Vec<(usize, usize)>, max_size: usize) -> Vec<(usize, usize)> {
    let mut groups = Vec::new();
    let mut cur: Option<(usize, usize)> = None;
    for (pstart, pend) in pieces {
        match cur {
            None => cur = Some((pstart, pend)),
            Some((cs, ce)) => {
                if pend - cs <= max_size {
                    cur = Some((cs, pend));
                } else {
                    groups.push((cs, ce));
                    cur = Some((pstart, pend));
                }
            }
        }
    }
    if let Some(last) = cur {
        groups.push(last);
    }
    groups
}

/// Cut `text[lo..hi]` into `max_size`-byte ranges, snapped back to the
/// nearest char boundary so no range splits a multi-byte codepoint.
fn char_chunks(text: &str, lo: usize, hi: usize, max_size: usize) -> Vec<(usize, usize)> {
    let max_size = max_size.max(1);
    let mut result = Vec::new();
    let mut start = lo;
    while start < hi {
        let mut end = (start + max_size).min(hi);
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            end = (start + 1).min(hi);
        }
        result.push((start, end));
        start = end;
    }
    result
}

/// If the final range is smaller than `min_size` and a previous range
/// exists, merge it into the previous one rather than leaving a tiny
/// dangling last chunk.
fn merge_tiny_trailing_range(ranges: &mut Vec<(usize, usize)>, min_size: usize) {
    if ranges.len() < 2 {
        return;
    }
    let last = ranges[ranges.len() - 1];
    if last.1 - last.0 < min_size {
        let len = ranges.len();
        ranges[len - 2].1 = last.1;
        ranges.pop();
    }
}
