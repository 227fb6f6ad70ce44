use crate::core::error::{BatchValidationError, ValidationError, ValidationReason};
use regex::Regex;
use std::sync::OnceLock;

pub const MAX_URL_CHARS: usize = 500;

fn youtube_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^https?://(www\.)?youtube\.com/watch\?v=[A-Za-z0-9_-]+",
            r"^https?://(www\.)?youtube\.com/shorts/[A-Za-z0-9_-]+",
            r"^https?://(www\.)?youtube\.com/playlist\?list=[A-Za-z0-9_-]+",
            r"^https?://youtu\.be/[A-Za-z0-9_-]+",
            r"^https?://m\.youtube\.com/watch\?v=[A-Za-z0-9_-]+",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Returns the trimmed link when it is an accepted YouTube link.
pub fn validate_url(raw: &str) -> Result<String, ValidationError> {
    let url = raw.trim();
    let reject = |reason| ValidationError { url: url.to_string(), reason };

    if url.is_empty() {
        return Err(reject(ValidationReason::Empty));
    }
    if url.chars().count() > MAX_URL_CHARS {
        return Err(reject(ValidationReason::TooLong));
    }
    if !youtube_patterns().iter().any(|re| re.is_match(url)) {
        return Err(reject(ValidationReason::NotYouTube));
    }
    Ok(url.to_string())
}

/// Splits batch text into links, skipping blank lines.
pub fn batch_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// All-or-nothing: a batch with any rejected line does not start.
pub fn validate_batch(lines: &[String]) -> Result<Vec<String>, BatchValidationError> {
    let mut accepted = Vec::with_capacity(lines.len());
    let mut errors = Vec::new();
    for line in lines {
        match validate_url(line) {
            Ok(url) => accepted.push(url),
            Err(e) => errors.push(e),
        }
    }
    if errors.is_empty() {
        Ok(accepted)
    } else {
        Err(BatchValidationError { errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_supported_link_shape() {
        for url in [
            "https://www.youtube.com/watch?v=abc123",
            "http://youtube.com/watch?v=a_b-c&t=10",
            "https://www.youtube.com/shorts/XyZ_09",
            "https://youtube.com/playlist?list=PL123-abc",
            "https://youtu.be/abc123",
            "https://m.youtube.com/watch?v=abc123",
        ] {
            assert!(validate_url(url).is_ok(), "{url} should be accepted");
        }
    }

    #[test]
    fn rejects_foreign_hosts() {
        let err = validate_url("https://example.com/watch?v=abc").unwrap_err();
        assert_eq!(err.reason, ValidationReason::NotYouTube);
        assert!(validate_url("https://youtube.com.evil.io/watch?v=abc").is_err());
        assert!(validate_url("ftp://youtu.be/abc").is_err());
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert_eq!(validate_url("").unwrap_err().reason, ValidationReason::Empty);
        assert_eq!(validate_url("  \t ").unwrap_err().reason, ValidationReason::Empty);
    }

    #[test]
    fn rejects_overlong_links() {
        let url = format!("https://youtu.be/{}", "a".repeat(MAX_URL_CHARS));
        assert_eq!(validate_url(&url).unwrap_err().reason, ValidationReason::TooLong);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(validate_url("  https://youtu.be/abc123 \n").unwrap(), "https://youtu.be/abc123");
    }

    #[test]
    fn batch_reports_every_bad_line() {
        let lines = batch_lines("https://youtu.be/a\n\n  bad one \nhttps://example.com/x\n");
        assert_eq!(lines.len(), 3);
        let err = validate_batch(&lines).unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert_eq!(err.errors[0].url, "bad one");
    }

    #[test]
    fn batch_error_message_is_capped() {
        let lines: Vec<String> = (0..8).map(|i| format!("nope{i}")).collect();
        let msg = validate_batch(&lines).unwrap_err().to_string();
        assert_eq!(msg.lines().count(), BatchValidationError::SHOWN + 1);
        assert!(msg.ends_with("...and 3 more"));
    }
}
