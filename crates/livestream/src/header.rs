//! `Content-Range` response header parsing.
//!
//! The starting offset reported by the server is the anchor for all stream
//! positions: whatever the caller asked for, the window begins where the
//! server says it does. Only the first number matters; the end offset and
//! total length are advisory for a live stream.

/// Extracts the starting offset from a `Content-Range: bytes <start>-…`
/// header line. Returns `None` for any other header or a malformed value.
///
/// The header name matches case-insensitively; HTTP header names carry no
/// case, and some client stacks normalize them to lowercase.
pub(crate) fn parse_content_range(line: &str) -> Option<u64> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-range") {
        return None;
    }

    let range = value.trim_start().strip_prefix("bytes")?.trim_start();
    let digits = &range[..range.find('-')?];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
