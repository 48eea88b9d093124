//! Compact URL expansion
//!
//! Lists shorten alternate-quality URLs to `"<N>|<suffix>"`: keep the first
//! `N` characters of the record's main URL and append `suffix`.

const HTTPS: &str = "https://";

/// Prepend `https://` to a non-empty value that carries no http(s) scheme
pub fn normalize_protocol(value: &str) -> String {
    if value.is_empty() || value.starts_with("http://") || value.starts_with(HTTPS) {
        value.to_string()
    } else {
        format!("{}{}", HTTPS, value)
    }
}

/// Split a compact value into its prefix length and suffix
fn split_compact(value: &str) -> Option<(usize, &str)> {
    let (prefix, suffix) = value.split_once('|')?;
    match prefix.trim().parse::<usize>() {
        Ok(len) if len > 0 => Some((len, suffix)),
        _ => None,
    }
}

/// Expand `value` against `reference_url`.
///
/// Values without a `|` are returned with protocol normalization. A compact
/// value whose prefix is not a positive integer, or longer than the
/// normalized reference, is treated as a plain URL.
pub fn expand_url(value: &str, reference_url: &str) -> String {
    let Some((len, suffix)) = split_compact(value) else {
        return normalize_protocol(value);
    };

    let reference = normalize_protocol(reference_url);
    // Prefix lengths count characters, not bytes.
    match reference.char_indices().nth(len) {
        Some((end, _)) => format!("{}{}", &reference[..end], suffix),
        None if reference.chars().count() == len => format!("{}{}", reference, suffix),
        None => normalize_protocol(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_compact_url() {
        assert_eq!(
            expand_url("8|example.com/v.mp4", "https://example.com/v_hd.mp4"),
            "https://example.com/v.mp4"
        );
        assert_eq!(
            expand_url(
                "35|_hd.mp4",
                "https://media.example.org/2024/clip_sd.mp4"
            ),
            "https://media.example.org/2024/clip_hd.mp4"
        );
    }

    #[test]
    fn test_plain_values_pass_through() {
        assert_eq!(
            expand_url("https://full.url/x.mp4", "https://other/y.mp4"),
            "https://full.url/x.mp4"
        );
        assert_eq!(expand_url("http://plain/x.mp4", ""), "http://plain/x.mp4");
        assert_eq!(expand_url("", "https://other/y.mp4"), "");
    }

    #[test]
    fn test_missing_protocol_is_added() {
        assert_eq!(
            expand_url("cdn.example.com/x.mp4", "https://other/y.mp4"),
            "https://cdn.example.com/x.mp4"
        );
        assert_eq!(normalize_protocol(""), "");
    }

    #[test]
    fn test_reference_is_normalized_before_prefixing() {
        assert_eq!(
            expand_url("12|b.mp4", "example.com/a.mp4"),
            "https://examb.mp4"
        );
    }

    #[test]
    fn test_prefix_equal_to_reference_length() {
        assert_eq!(expand_url("13|/x", "https://a.com"), "https://a.com/x");
    }

    #[test]
    fn test_invalid_compact_values_fall_back() {
        // Prefix longer than the reference
        assert_eq!(expand_url("99|x.mp4", "https://a.b/c"), "https://99|x.mp4");
        // Non-numeric prefix
        assert_eq!(expand_url("ab|x.mp4", "https://a.b/c"), "https://ab|x.mp4");
        // Zero is not a positive length
        assert_eq!(expand_url("0|x.mp4", "https://a.b/c"), "https://0|x.mp4");
    }

    #[test]
    fn test_multibyte_reference() {
        assert_eq!(
            expand_url("14|b.mp4", "https://müll.de/a.mp4"),
            "https://müll.db.mp4"
        );
    }
}
