//! Shared utility functions

/// Truncate a string to a maximum length, appending "..." if truncated.
/// Handles multi-byte characters by finding a valid char boundary.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let suffix = "...";
    let target = max_len.saturating_sub(suffix.len());
    // Find a valid char boundary at or before target
    let mut end = target;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &s[..end], suffix)
}

/// Render a byte count with binary prefixes ("512 bytes", "1.5 KiB", "3.2 GiB").
pub fn human_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} bytes", bytes);
    }

    let base = ((64 - bytes.leading_zeros()) / 10) as usize;
    let value = bytes as f64 / (1u64 << (base * 10)) as f64;
    let prefix = " KMGTPE".as_bytes()[base] as char;

    format!("{:.1} {}iB", value, prefix)
}
