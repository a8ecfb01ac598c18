use std::path::Path;

use super::model::MediaKind;

pub const MIME_FALLBACK: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: Option<MediaKind>,
    pub mime_type: &'static str,
}

/// Classify a file name by its extension, ignoring case.
pub fn classify(name: &str) -> Classification {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let (kind, mime_type) = match extension.as_deref() {
        Some("mp4") => (Some(MediaKind::Video), "video/mp4"),
        Some("jpg") | Some("jpeg") => (Some(MediaKind::Image), "image/jpeg"),
        Some("png") => (Some(MediaKind::Image), "image/png"),
        _ => (None, MIME_FALLBACK),
    };

    Classification { kind, mime_type }
}
