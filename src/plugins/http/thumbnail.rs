use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::core::error::ThumbnailFetchError;

const ATTEMPTS: u32 = 3;
const TIMEOUT_SECS: u64 = 30;
const BACKOFF_BASE_MS: u64 = 400;

/// Saves a video's preview image next to the downloaded file.
pub struct ThumbnailFetcher {
    client: reqwest::Client,
}

impl ThumbnailFetcher {
    pub fn new(user_agent: &str) -> Result<Self, ThumbnailFetchError> {
        let mut headers = HeaderMap::new();
        if let Ok(ua) = HeaderValue::from_str(user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        // image hosts only; no credentials go over this client
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .default_headers(headers)
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }

    fn should_retry_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
    }

    async fn sleep_backoff(attempt: u32) {
        let ms = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(16)).min(30_000);
        sleep(Duration::from_millis(ms)).await;
    }

    pub fn target_path(dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{stem}.png"))
    }

    /// Writes `{stem}.png` into `dir` and returns its path.
    pub async fn fetch(
        &self,
        thumbnail_url: Option<&str>,
        dir: &Path,
        stem: &str,
    ) -> Result<PathBuf, ThumbnailFetchError> {
        let raw = thumbnail_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ThumbnailFetchError::MissingUrl)?;
        let url = url::Url::parse(raw)?;
        tokio::fs::create_dir_all(dir).await?;

        let mut last_err: Option<ThumbnailFetchError> = None;
        for attempt in 0..ATTEMPTS {
            if attempt > 0 {
                Self::sleep_backoff(attempt - 1).await;
            }

            let resp = match self.client.get(url.clone()).send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "thumbnail request failed");
                    last_err = Some(e.into());
                    continue;
                }
            };

            let status = resp.status();
            if !status.is_success() {
                last_err = Some(ThumbnailFetchError::Status(status));
                if Self::should_retry_status(status) {
                    continue;
                }
                break;
            }

            match resp.bytes().await {
                Ok(body) => {
                    let path = Self::target_path(dir, stem);
                    tokio::fs::write(&path, &body).await?;
                    debug!(path = %path.display(), bytes = body.len(), "thumbnail saved");
                    return Ok(path);
                }
                Err(e) => last_err = Some(e.into()),
            }
        }

        let err = last_err.unwrap_or(ThumbnailFetchError::MissingUrl);
        warn!(url = %url, error = %err, "giving up on thumbnail");
        Err(err)
    }
}
