use crate::core::model::DownloadFormat;
use chrono::NaiveDateTime;
use sanitize_filename::{sanitize_with_options, Options};
use std::collections::HashSet;
use std::path::Path;

pub const MAX_COMPONENT_CHARS: usize = 50;
const FALLBACK_EXTENSION: &str = "mp4";

/// Replaces `<>:"/\|?*` and control characters with `_`, then keeps the
/// first 50 characters. Applying it twice changes nothing.
pub fn sanitize_component(name: &str) -> String {
    let cleaned = sanitize_with_options(
        name,
        Options { windows: false, truncate: false, replacement: "_" },
    );
    cleaned.chars().take(MAX_COMPONENT_CHARS).collect()
}

/// Container extensions the engine merges into mp4 anyway.
pub fn normalize_extension(ext: Option<&str>) -> String {
    match ext.map(str::trim).filter(|e| !e.is_empty()) {
        None => FALLBACK_EXTENSION.to_string(),
        Some("webm" | "mkv" | "flv") => FALLBACK_EXTENSION.to_string(),
        Some(other) => other.to_string(),
    }
}

pub fn fallback_filename(ext: &str, now: NaiveDateTime) -> String {
    format!("video_{}.{}", now.format("%Y%m%d_%H%M%S"), ext)
}

pub fn derive_filename(
    title: &str,
    uploader: &str,
    height: u32,
    ext: &str,
    format: DownloadFormat,
    now: NaiveDateTime,
) -> String {
    let ext = match format {
        DownloadFormat::Audio => format.extension(),
        DownloadFormat::Video => ext,
    };

    let title = sanitize_component(title);
    if title.is_empty() {
        return fallback_filename(ext, now);
    }

    let mut parts = vec![title];
    let uploader = sanitize_component(uploader);
    if !uploader.is_empty() {
        parts.push(uploader);
    }
    if height > 0 {
        parts.push(format!("{height}p"));
    }
    format!("{}.{}", parts.join("_"), ext)
}

/// `("a.b", ".mp4")` for `"a.b.mp4"`; a leading dot does not start an extension.
pub fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => filename.split_at(idx),
        _ => (filename, ""),
    }
}

pub fn file_stem(filename: &str) -> &str {
    split_extension(filename).0
}

/// Smallest `_N` suffix (N ≥ 1) making `filename` free both on disk and in
/// `reserved`; the name itself when it is already free.
pub fn unique_filename(dir: &Path, filename: &str, reserved: &HashSet<String>) -> String {
    let taken = |candidate: &str| reserved.contains(candidate) || dir.join(candidate).exists();
    if !taken(filename) {
        return filename.to_string();
    }

    let (stem, ext) = split_extension(filename);
    let mut counter: u32 = 1;
    loop {
        let candidate = format!("{stem}_{counter}{ext}");
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
