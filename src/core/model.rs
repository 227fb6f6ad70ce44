use crate::core::error::UnsupportedFormatError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

pub type BatchId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadFormat {
    Video,
    Audio,
}

impl DownloadFormat {
    pub fn id(&self) -> &'static str {
        match self {
            DownloadFormat::Video => "mp4",
            DownloadFormat::Audio => "mp3",
        }
    }

    /// Extension of the file the engine leaves on disk.
    pub fn extension(&self) -> &'static str {
        self.id()
    }
}

impl FromStr for DownloadFormat {
    type Err = UnsupportedFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4" => Ok(DownloadFormat::Video),
            "mp3" => Ok(DownloadFormat::Audio),
            _ => Err(UnsupportedFormatError(s.to_string())),
        }
    }
}

impl fmt::Display for DownloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub format: DownloadFormat,
    pub destination_dir: PathBuf,
    pub fetch_thumbnail: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub uploader: String,
    pub height: u32,
    pub extension: String,
    pub thumbnail_url: Option<String>,
    /// Sanitized name derived from the fields above, before collision checks.
    pub filename: String,
}

/// One normalized progress tick. Superseded by the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub percent: f64,
    pub speed: String,
    pub eta: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub request: DownloadRequest,
    pub status: OutcomeStatus,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl DownloadOutcome {
    pub fn success(request: DownloadRequest, output_path: &Path) -> Self {
        Self {
            request,
            status: OutcomeStatus::Success,
            output_path: Some(output_path.to_path_buf()),
            error: None,
        }
    }

    pub fn failure(request: DownloadRequest, error: String) -> Self {
        Self {
            request,
            status: OutcomeStatus::Failure,
            output_path: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: String,
    pub title: String,
    pub format: String,
    pub path: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Running,
    ItemResolving,
    ItemDownloading,
    ItemDone,
    Finished,
}

#[derive(Debug, Clone)]
pub struct BatchRun {
    pub id: BatchId,
    pub state: BatchState,
    pub total_count: usize,
    pub completed_count: usize,
    pub outcomes: Vec<DownloadOutcome>,
}

impl BatchRun {
    pub fn new(total_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: BatchState::Pending,
            total_count,
            completed_count: 0,
            outcomes: Vec::with_capacity(total_count),
        }
    }

    pub fn record(&mut self, outcome: DownloadOutcome) {
        if outcome.is_success() {
            self.completed_count += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.completed_count
    }

    /// Items never started because the run was stopped.
    pub fn not_started_count(&self) -> usize {
        self.total_count - self.outcomes.len()
    }

    pub fn is_full_success(&self) -> bool {
        self.completed_count == self.total_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> DownloadRequest {
        DownloadRequest {
            url: url.to_string(),
            format: DownloadFormat::Video,
            destination_dir: PathBuf::from("/dl"),
            fetch_thumbnail: false,
        }
    }

    #[test]
    fn format_ids_parse_loosely() {
        assert_eq!(" MP4 ".parse::<DownloadFormat>().unwrap(), DownloadFormat::Video);
        assert_eq!("mp3".parse::<DownloadFormat>().unwrap(), DownloadFormat::Audio);
        assert_eq!("wav".parse::<DownloadFormat>().unwrap_err(), UnsupportedFormatError("wav".into()));
    }

    #[test]
    fn batch_counts() {
        let mut run = BatchRun::new(4);
        run.record(DownloadOutcome::success(request("a"), Path::new("/dl/a.mp4")));
        run.record(DownloadOutcome::failure(request("b"), "boom".into()));
        run.record(DownloadOutcome::success(request("c"), Path::new("/dl/c.mp4")));

        assert_eq!(run.completed_count, 2);
        assert_eq!(run.failed_count(), 1);
        assert_eq!(run.not_started_count(), 1);
        assert!(!run.is_full_success());
    }
}
