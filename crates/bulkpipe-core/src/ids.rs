//! Document and collection id validation.

/// Maximum encoded length of an id, in UTF-8 bytes.
pub const MAX_ID_BYTES: usize = 1500;

pub fn is_valid_id(s: &str) -> bool {
    !is_invalid_id(s)
}

/// An id is invalid if it is `.` or `..`, contains `/`, is wrapped in double
/// underscores on both ends, or is longer than [`MAX_ID_BYTES`].
pub fn is_invalid_id(s: &str) -> bool {
    s == "."
        || s == ".."
        || s.contains('/')
        || (s.starts_with("__") && s.ends_with("__"))
        || s.len() > MAX_ID_BYTES
}
