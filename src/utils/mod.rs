//! Utility functions

pub mod encoding;
pub mod paths;

pub use encoding::read_with_encodings;
pub use paths::{normalize_relative, to_slash};

/// Format a number with thousands separators (e.g. 1048576 → "1,048,576").
pub fn format_with_commas(n: u64) -> String {
    let s = n.to_string();
    let bytes = s.as_bytes();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, &b) in bytes.iter().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(b as char);
    }
    result
}

/// Human-readable size in kB, the unit arXiv reports upload limits in.
pub fn format_kb(bytes: u64) -> String {
    format!("{}kB", format_with_commas(bytes.div_ceil(1024)))
}
