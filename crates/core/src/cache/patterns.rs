//! Glob matching for store key patterns.
//!
//! Supports the subset of Redis `MATCH` syntax the cache emits:
//! `*` (any run of characters), `?` (exactly one character) and `\` to
//! escape the next character.

/// Checks if a cache key matches a glob pattern.
///
/// # Examples
///
/// ```
/// use recall_core::cache::pattern_matches;
///
/// assert!(pattern_matches("ns:user:*", "ns:user:id:7:name:ann-"));
/// assert!(pattern_matches("ns:*:rootKey", "ns:user:rootKey"));
/// assert!(pattern_matches("ns:user:id:?", "ns:user:id:7"));
/// assert!(!pattern_matches("ns:user:*", "ns:order:id:7"));
/// ```
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0, 0);
    // Position of the last `*` seen and the key position it is currently absorbing up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, k));
                p += 1;
                continue;
            }
            Some('?') => {
                p += 1;
                k += 1;
                continue;
            }
            Some('\\') if p + 1 < pattern.len() => {
                if pattern[p + 1] == key[k] {
                    p += 2;
                    k += 1;
                    continue;
                }
            }
            Some(&c) if c == key[k] => {
                p += 1;
                k += 1;
                continue;
            }
            _ => {}
        }

        match backtrack {
            Some((star, absorbed)) => {
                p = star + 1;
                k = absorbed + 1;
                backtrack = Some((star, absorbed + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
