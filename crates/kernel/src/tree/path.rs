//! Fixed-width path segments.
//!
//! A node's path is its ancestors' segments followed by its own. Segments
//! are base-36 numbers (`0-9A-Z`) padded to a fixed width, so byte order
//! of paths is tree pre-order and sibling order is segment order.

/// Segment alphabet in ascending order.
const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Sorts after every segment character; `path + PATH_UPPER_BOUND` bounds
/// the range holding a node's descendants.
pub(crate) const PATH_UPPER_BOUND: char = '~';

/// Number of distinct segments of the given width.
pub fn capacity(width: usize) -> u64 {
    36u64.saturating_pow(width as u32)
}

/// Encode a segment value; `None` if it does not fit in `width`.
pub fn encode_segment(value: u64, width: usize) -> Option<String> {
    if value >= capacity(width) {
        return None;
    }
    let mut digits = vec![b'0'; width];
    let mut rest = value;
    for slot in digits.iter_mut().rev() {
        *slot = ALPHABET[(rest % 36) as usize];
        rest /= 36;
    }
    String::from_utf8(digits).ok()
}

/// Decode a segment; `None` for characters outside the alphabet.
pub fn decode_segment(segment: &str) -> Option<u64> {
    segment.bytes().try_fold(0u64, |acc, b| {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'A'..=b'Z' => b - b'A' + 10,
            _ => return None,
        };
        acc.checked_mul(36)?.checked_add(u64::from(digit))
    })
}

/// Whether `path` is a well-formed sequence of `width`-wide segments.
pub fn is_valid_path(path: &str, width: usize) -> bool {
    !path.is_empty()
        && path.len() % width == 0
        && path.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
}

/// Path of the parent, or `None` for a root.
pub fn parent_path(path: &str, width: usize) -> Option<&str> {
    (path.len() > width).then(|| &path[..path.len() - width])
}

/// The last segment of a path.
pub fn last_segment(path: &str, width: usize) -> &str {
    &path[path.len().saturating_sub(width)..]
}
