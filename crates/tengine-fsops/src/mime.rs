//! Mimetype to file extension mapping used when no caller filename is available.

/// Fallback extension for unknown mimetypes.
pub const DEFAULT_EXTENSION: &str = "bin";

/// Conventional spellings chosen when a mimetype registers several extensions.
const PREFERRED: &[&str] = &["txt", "jpg", "html", "tiff", "mp3", "xml"];

/// File extension for a mimetype, ignoring parameters such as `; charset=...`.
#[must_use]
pub fn extension_for_media_type(media_type: &str) -> &'static str {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let Some(candidates) = mime_guess::get_mime_extensions_str(&essence) else {
        return DEFAULT_EXTENSION;
    };
    let subtype = essence
        .split_once('/')
        .map(|(_, subtype)| subtype.split('+').next().unwrap_or(subtype))
        .unwrap_or_default();

    candidates
        .iter()
        .find(|ext| PREFERRED.contains(ext))
        .or_else(|| candidates.iter().find(|ext| **ext == subtype))
        .or_else(|| candidates.first())
        .copied()
        .unwrap_or(DEFAULT_EXTENSION)
}
