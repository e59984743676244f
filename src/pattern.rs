//! `PATH:SYMBOL` pattern matching.
//!
//! - Exact: `/usr/bin/app:main` matches only that path and symbol.
//! - Prefix: a path component ending in `*` matches any path starting with
//!   the text before the `*`, e.g. `/usr/*:main`.
//!
//! The symbol component is always compared verbatim.

/// Marker that turns the path component into a prefix match.
pub const WILDCARD: char = '*';

/// Separator between the path and symbol components.
pub const SEPARATOR: char = ':';

/// Returns `true` if `pattern` matches the given path and symbol.
///
/// The pattern is split at the first `:`. A pattern without a separator
/// never matches.
pub fn matches(pattern: &str, path: &str, symbol: &str) -> bool {
    let Some((path_pattern, symbol_pattern)) = pattern.split_once(SEPARATOR) else {
        return false;
    };

    if symbol != symbol_pattern {
        return false;
    }

    match path_pattern.strip_suffix(WILDCARD) {
        Some(prefix) => path.starts_with(prefix),
        None => path == path_pattern,
    }
}
