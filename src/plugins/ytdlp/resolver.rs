use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::error::MetadataResolutionError;
use crate::core::events::{LogLevel, UiSender};
use crate::core::model::{DownloadFormat, VideoMetadata};
use crate::core::naming::{derive_filename, fallback_filename, normalize_extension};
use crate::i18n::Messages;
use crate::plugins::registry::{EngineContext, EngineOptions, ExtractionEngine, RawInfo};

/// Pre-flight metadata lookup. Never fails: a broken lookup degrades to a
/// timestamp file name so the download itself can still be attempted.
pub struct MetadataResolver {
    engine: Arc<dyn ExtractionEngine>,
    ctx: EngineContext,
    ui: UiSender,
    messages: &'static Messages,
}

impl MetadataResolver {
    pub fn new(
        engine: Arc<dyn ExtractionEngine>,
        ctx: EngineContext,
        ui: UiSender,
        messages: &'static Messages,
    ) -> Self {
        Self { engine, ctx, ui, messages }
    }

    pub async fn resolve(&self, url: &str, format: DownloadFormat) -> VideoMetadata {
        let now = Local::now().naive_local();
        match self.lookup(url).await {
            Ok(info) => {
                let meta = metadata_from_info(info, format, now);
                debug!(url, filename = %meta.filename, "resolved metadata");
                meta
            }
            Err(e) => {
                warn!(error = %e, "metadata lookup failed, using fallback name");
                self.ui.log(LogLevel::Warning, format!("{}: {}", self.messages.metadata_fallback, e));
                fallback_metadata(format, now)
            }
        }
    }

    async fn lookup(&self, url: &str) -> Result<RawInfo, MetadataResolutionError> {
        let opts = EngineOptions::from_context(&self.ctx);
        self.engine
            .extract_info(url, &opts)
            .await
            .map_err(|source| MetadataResolutionError { url: url.to_string(), source })
    }
}

pub fn metadata_from_info(info: RawInfo, format: DownloadFormat, now: NaiveDateTime) -> VideoMetadata {
    let title = info.title.unwrap_or_default();
    let uploader = info.uploader.unwrap_or_default();
    let height = info.height.unwrap_or(0);
    let extension = match format {
        DownloadFormat::Audio => format.extension().to_string(),
        DownloadFormat::Video => normalize_extension(info.ext.as_deref()),
    };
    let filename = derive_filename(&title, &uploader, height, &extension, format, now);
    VideoMetadata {
        title,
        uploader,
        height,
        extension,
        thumbnail_url: info.thumbnail.filter(|t| !t.trim().is_empty()),
        filename,
    }
}

pub fn fallback_metadata(format: DownloadFormat, now: NaiveDateTime) -> VideoMetadata {
    let extension = match format {
        DownloadFormat::Audio => format.extension().to_string(),
        DownloadFormat::Video => normalize_extension(None),
    };
    VideoMetadata {
        title: String::new(),
        uploader: String::new(),
        height: 0,
        filename: fallback_filename(&extension, now),
        extension,
        thumbnail_url: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::EngineError;
    use crate::core::events::{ui_channel, UiEvent};
    use crate::i18n::EN;
    use crate::plugins::registry::ProgressHook;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct FixedEngine(Option<RawInfo>);

    #[async_trait]
    impl ExtractionEngine for FixedEngine {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn extract_info(&self, _url: &str, _opts: &EngineOptions) -> Result<RawInfo, EngineError> {
            self.0.clone().ok_or(EngineError::Failed { code: Some(1), detail: "ERROR: unavailable".into() })
        }

        async fn download(&self, _: &str, _: &EngineOptions, _: Option<ProgressHook<'_>>) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2).and_then(|d| d.and_hms_opt(3, 4, 5)).unwrap()
    }

    #[test]
    fn builds_pinned_filename_from_info() {
        let info = RawInfo {
            title: Some("Test: Video".into()),
            uploader: Some("Some/Channel".into()),
            height: Some(1080),
            ext: Some("webm".into()),
            thumbnail: Some("https://i.ytimg.com/vi/abc123/maxresdefault.jpg".into()),
        };
        let meta = metadata_from_info(info, DownloadFormat::Video, now());
        assert_eq!(meta.filename, "Test_ Video_Some_Channel_1080p.mp4");
        assert_eq!(meta.extension, "mp4");
        assert_eq!(meta.title, "Test: Video");
    }

    #[test]
    fn info_json_with_nulls_deserializes() {
        let info: RawInfo = serde_json::from_str(
            r#"{"title":"Clip","uploader":null,"height":null,"ext":"mp4","formats":[],"thumbnail":""}"#,
        )
        .unwrap();
        let meta = metadata_from_info(info, DownloadFormat::Audio, now());
        assert_eq!(meta.filename, "Clip.mp3");
        assert_eq!(meta.thumbnail_url, None);
    }

    #[tokio::test]
    async fn failed_lookup_degrades_to_fallback() {
        let (ui, mut rx) = ui_channel();
        let resolver = MetadataResolver::new(Arc::new(FixedEngine(None)), EngineContext::default(), ui, &EN);
        let meta = resolver.resolve("https://youtu.be/abc123", DownloadFormat::Video).await;

        assert!(meta.title.is_empty() && meta.uploader.is_empty());
        assert_eq!(meta.height, 0);
        assert!(meta.filename.starts_with("video_") && meta.filename.ends_with(".mp4"));
        assert!(matches!(rx.try_recv(), Ok(UiEvent::Log { level: LogLevel::Warning, .. })));
    }

    #[test]
    fn audio_fallback_uses_mp3() {
        assert_eq!(fallback_metadata(DownloadFormat::Audio, now()).filename, "video_20250102_030405.mp3");
    }
}
