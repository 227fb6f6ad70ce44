use std::fmt;
use std::path::PathBuf;

/// Failure reported by the extraction engine (the `yt-dlp` child process).
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine exited with code {code:?}: {detail}")]
    Failed { code: Option<i32>, detail: String },

    #[error("invalid metadata from engine: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("engine call cancelled")]
    Cancelled,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported download format: {0}")]
pub struct UnsupportedFormatError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    Empty,
    TooLong,
    NotYouTube,
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReason::Empty => f.write_str("link must not be empty"),
            ValidationReason::TooLong => f.write_str("link is too long"),
            ValidationReason::NotYouTube => f.write_str("only YouTube links are supported"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{url}: {reason}")]
pub struct ValidationError {
    pub url: String,
    pub reason: ValidationReason,
}

/// Every rejected line of a batch, collected before any work starts.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub struct BatchValidationError {
    pub errors: Vec<ValidationError>,
}

impl BatchValidationError {
    pub const SHOWN: usize = 5;
}

impl fmt::Display for BatchValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .errors
            .iter()
            .take(Self::SHOWN)
            .map(|e| e.to_string())
            .collect();
        write!(f, "{}", lines.join("\n"))?;
        if self.errors.len() > Self::SHOWN {
            write!(f, "\n...and {} more", self.errors.len() - Self::SHOWN)?;
        }
        Ok(())
    }
}

/// Recovered inside the resolver; never reaches the caller.
#[derive(thiserror::Error, Debug)]
#[error("metadata lookup for {url} failed: {source}")]
pub struct MetadataResolutionError {
    pub url: String,
    #[source]
    pub source: EngineError,
}

#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("download of {url} failed: {source}")]
    Engine {
        url: String,
        #[source]
        source: EngineError,
    },

    #[error("download of {url} was stopped")]
    Cancelled { url: String },
}

impl DownloadError {
    pub fn from_engine(url: &str, err: EngineError) -> Self {
        match err {
            EngineError::Cancelled => DownloadError::Cancelled { url: url.to_string() },
            source => DownloadError::Engine { url: url.to_string(), source },
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ThumbnailFetchError {
    #[error("no thumbnail link in video info")]
    MissingUrl,

    #[error("invalid thumbnail link: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("thumbnail request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("thumbnail server answered {0}")]
    Status(reqwest::StatusCode),

    #[error("writing thumbnail failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unparseable progress tick: percent={percent:?} speed={speed:?} eta={eta:?}")]
pub struct ProgressParseError {
    pub percent: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
