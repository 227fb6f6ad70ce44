use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::error::DownloadError;
use crate::core::model::DownloadFormat;
use crate::core::progress::ProgressCallback;
use crate::plugins::registry::{
    literal_template, run_engine_download, AudioExtraction, DownloadStrategy, EngineContext, EngineOptions, ExtractionEngine,
};

/// Best audio stream, converted to mp3 by the engine's post-processor.
pub struct Mp3Strategy {
    engine: Arc<dyn ExtractionEngine>,
    ctx: EngineContext,
    progress: Option<ProgressCallback>,
}

impl Mp3Strategy {
    pub const FORMAT_SELECTOR: &'static str = "bestaudio/best";
    pub const CODEC: &'static str = "mp3";
    pub const QUALITY: &'static str = "192K";

    pub fn new(engine: Arc<dyn ExtractionEngine>, ctx: EngineContext, progress: Option<ProgressCallback>) -> Self {
        Self { engine, ctx, progress }
    }

    /// The extractor writes `<template stem>.mp3` after conversion, so the
    /// template carries the extension the engine will replace.
    fn output_template(output_path: &Path) -> PathBuf {
        let mut template = literal_template(&output_path.with_extension("")).into_os_string();
        template.push(".%(ext)s");
        PathBuf::from(template)
    }

    pub fn engine_options(&self, output_path: &Path) -> EngineOptions {
        EngineOptions {
            format_selector: Some(Self::FORMAT_SELECTOR.to_string()),
            output_template: Some(Self::output_template(output_path)),
            extract_audio: Some(AudioExtraction {
                codec: Self::CODEC.to_string(),
                quality: Self::QUALITY.to_string(),
            }),
            ..EngineOptions::from_context(&self.ctx)
        }
    }
}

#[async_trait]
impl DownloadStrategy for Mp3Strategy {
    fn name(&self) -> &'static str { "mp3-extract" }

    fn format(&self) -> DownloadFormat {
        DownloadFormat::Audio
    }

    async fn download(&self, url: &str, output_path: &Path) -> Result<(), DownloadError> {
        let opts = self.engine_options(output_path);
        run_engine_download(self.engine.as_ref(), url, &opts, self.progress.as_ref()).await
    }
}
