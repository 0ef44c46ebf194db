//! Selector grammar
//!
//! A selector is a hierarchical path (`/binary/elf`) pinned by a content hash
//! path component (`/binary/elf/%<sha256-hex>`). Read queries may replace the
//! pin with a version request (`/binary/elf~-1`).

/// Marks the start of a content pin
pub const PIN_MARKER: char = '%';

/// Marks the start of a version request in a query selector
pub const VERSION_MARKER: char = '~';

/// Version request resolving to the highest known version
pub const LATEST_VERSION: i64 = -1;

/// Length of a sha256 hex digest
pub const HASH_HEX_LEN: usize = 64;

/// Check that a string is a sha256 hex digest
pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == HASH_HEX_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Append a content pin to a base path as its own path component
pub fn pin(base: &str, hash: &str) -> String {
    if base.is_empty() || base.ends_with('/') {
        format!("{}{}{}", base, PIN_MARKER, hash)
    } else {
        format!("{}/{}{}", base, PIN_MARKER, hash)
    }
}

/// Split a pinned selector into (everything before the last pin marker, hash)
pub fn split_pin(selector: &str) -> Option<(&str, &str)> {
    selector
        .rfind(PIN_MARKER)
        .map(|p| (&selector[..p], &selector[p + PIN_MARKER.len_utf8()..]))
}

/// Base selector path: everything before the first pin marker
pub fn base_path(selector: &str) -> &str {
    selector.split(PIN_MARKER).next().unwrap_or(selector)
}

/// Key grouping all versions of one logical artifact.
///
/// `/binary/elf/` and `/binary/elf` name the same chain.
pub fn chain_key(selector: &str) -> &str {
    let base = base_path(selector);
    let trimmed = base.trim_end_matches('/');
    if trimmed.is_empty() {
        base
    } else {
        trimmed
    }
}

/// Parse a `<base>~<n>` query. Pinned selectors are never version queries.
pub fn parse_version_query(selector: &str) -> Option<(&str, i64)> {
    if selector.contains(PIN_MARKER) {
        return None;
    }
    let p = selector.rfind(VERSION_MARKER)?;
    let version = selector[p + VERSION_MARKER.len_utf8()..].parse::<i64>().ok()?;
    Some((chain_key(&selector[..p]), version))
}
