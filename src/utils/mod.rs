use std::time::{SystemTime, UNIX_EPOCH};

use percent_encoding::percent_decode_str;
use url::Url;

/// Get current Unix timestamp in milliseconds
pub fn get_timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Last non-empty path segment of a URL, percent-decoded, if any.
pub fn last_path_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let segment = percent_decode_str(segment).decode_utf8_lossy();
    let name = sanitize_filename(&segment);
    let name = name.trim_matches(|c| c == '.' || c == ' ');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Integer percentage of `downloaded` over `total`, clamped to 0..=100.
pub fn percent(downloaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let scaled = u128::from(downloaded) * 100 / u128::from(total);
    scaled.min(100) as u8
}
