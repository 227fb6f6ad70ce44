use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::core::error::DownloadError;
use crate::core::model::DownloadFormat;
use crate::core::progress::ProgressCallback;
use crate::plugins::registry::{literal_template, run_engine_download, DownloadStrategy, EngineContext, EngineOptions, ExtractionEngine};

/// Best video plus best audio, merged into one mp4 container.
pub struct Mp4Strategy {
    engine: Arc<dyn ExtractionEngine>,
    ctx: EngineContext,
    progress: Option<ProgressCallback>,
}

impl Mp4Strategy {
    pub const FORMAT_SELECTOR: &'static str = "bestvideo+bestaudio/best";
    pub const MERGE_FORMAT: &'static str = "mp4";

    pub fn new(engine: Arc<dyn ExtractionEngine>, ctx: EngineContext, progress: Option<ProgressCallback>) -> Self {
        Self { engine, ctx, progress }
    }

    pub fn engine_options(&self, output_path: &Path) -> EngineOptions {
        EngineOptions {
            format_selector: Some(Self::FORMAT_SELECTOR.to_string()),
            output_template: Some(literal_template(output_path)),
            merge_output_format: Some(Self::MERGE_FORMAT.to_string()),
            ..EngineOptions::from_context(&self.ctx)
        }
    }
}

#[async_trait]
impl DownloadStrategy for Mp4Strategy {
    fn name(&self) -> &'static str { "mp4-merge" }

    fn format(&self) -> DownloadFormat {
        DownloadFormat::Video
    }

    async fn download(&self, url: &str, output_path: &Path) -> Result<(), DownloadError> {
        let opts = self.engine_options(output_path);
        run_engine_download(self.engine.as_ref(), url, &opts, self.progress.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::registry::testing::RecordingEngine;

    #[test]
    fn merges_best_streams_into_mp4() {
        let strategy = Mp4Strategy::new(Arc::new(RecordingEngine::default()), EngineContext::default(), None);
        let opts = strategy.engine_options(Path::new("/videos/clip.mp4"));
        assert_eq!(opts.format_selector.as_deref(), Some("bestvideo+bestaudio/best"));
        assert_eq!(opts.merge_output_format.as_deref(), Some("mp4"));
        assert_eq!(opts.output_template.as_deref(), Some(Path::new("/videos/clip.mp4")));
        assert!(opts.extract_audio.is_none());
        assert_eq!(opts.retries, 3);
    }
}
