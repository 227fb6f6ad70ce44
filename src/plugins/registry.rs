use async_trait::async_trait;
use crate::core::error::{DownloadError, EngineError, UnsupportedFormatError};
use crate::core::model::DownloadFormat;
use crate::core::progress::ProgressCallback;
use clap::{ArgMatches, Command};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Settings shared by every engine call of one process run.
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub program: PathBuf,
    pub user_agent: String,
    pub socket_timeout_secs: u64,
    pub retries: u32,
    pub fragment_retries: u32,
    pub cancel: CancellationToken,
}

impl Default for EngineContext {
    fn default() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            socket_timeout_secs: 30,
            retries: 3,
            fragment_retries: 3,
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioExtraction {
    pub codec: String,
    pub quality: String,
}

/// What one engine invocation is asked to do.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub format_selector: Option<String>,
    pub output_template: Option<PathBuf>,
    pub merge_output_format: Option<String>,
    pub extract_audio: Option<AudioExtraction>,
    pub retries: u32,
    pub fragment_retries: u32,
    pub socket_timeout_secs: u64,
    pub http_headers: Vec<(String, String)>,
    pub cancel: Option<CancellationToken>,
}

impl EngineOptions {
    /// Retry, timeout and header settings common to metadata and download calls.
    pub fn from_context(ctx: &EngineContext) -> Self {
        Self {
            retries: ctx.retries,
            fragment_retries: ctx.fragment_retries,
            socket_timeout_secs: ctx.socket_timeout_secs,
            http_headers: vec![("User-Agent".to_string(), ctx.user_agent.clone())],
            cancel: Some(ctx.cancel.clone()),
            ..Default::default()
        }
    }
}

/// The subset of the engine's info dictionary this program reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Output templates treat `%` as a field marker; a literal path escapes it.
pub fn literal_template(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().replace('%', "%%"))
}

/// One progress tick exactly as the engine produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProgress {
    pub status: String,
    pub percent: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

pub type ProgressHook<'a> = &'a (dyn Fn(RawProgress) + Send + Sync);

#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Metadata only, no payload is fetched.
    async fn extract_info(&self, url: &str, opts: &EngineOptions) -> Result<RawInfo, EngineError>;

    async fn download(
        &self,
        url: &str,
        opts: &EngineOptions,
        hook: Option<ProgressHook<'_>>,
    ) -> Result<(), EngineError>;
}

#[async_trait]
pub trait DownloadStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn format(&self) -> DownloadFormat;

    /// Returns once the engine has finished writing `output_path` or failed.
    async fn download(&self, url: &str, output_path: &Path) -> Result<(), DownloadError>;
}

/// Forwards ticks while the engine is downloading; other statuses are dropped.
pub(crate) fn forward_downloading(callback: &ProgressCallback, tick: RawProgress) {
    if tick.status == "downloading" {
        callback(tick.percent.as_deref(), tick.speed.as_deref(), tick.eta.as_deref());
    }
}

/// Runs `opts` through the engine, wiring the optional callback in as the hook.
pub(crate) async fn run_engine_download(
    engine: &dyn ExtractionEngine,
    url: &str,
    opts: &EngineOptions,
    progress: Option<&ProgressCallback>,
) -> Result<(), DownloadError> {
    let hook = progress.map(|cb| move |tick: RawProgress| forward_downloading(cb, tick));
    let hook_ref = hook.as_ref().map(|h| h as ProgressHook<'_>);
    engine
        .download(url, opts, hook_ref)
        .await
        .map_err(|e| DownloadError::from_engine(url, e))
}

pub struct StrategyFactory {
    engine: Arc<dyn ExtractionEngine>,
    ctx: EngineContext,
}

impl StrategyFactory {
    pub fn new(engine: Arc<dyn ExtractionEngine>, ctx: EngineContext) -> Self {
        Self { engine, ctx }
    }

    pub fn engine(&self) -> Arc<dyn ExtractionEngine> {
        self.engine.clone()
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn get_strategy(
        &self,
        format_id: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<Box<dyn DownloadStrategy>, UnsupportedFormatError> {
        let format: DownloadFormat = format_id.parse()?;
        Ok(self.strategy_for(format, progress))
    }

    pub fn strategy_for(
        &self,
        format: DownloadFormat,
        progress: Option<ProgressCallback>,
    ) -> Box<dyn DownloadStrategy> {
        match format {
            DownloadFormat::Video => Box::new(crate::plugins::mp4::strategy::Mp4Strategy::new(
                self.engine.clone(),
                self.ctx.clone(),
                progress,
            )),
            DownloadFormat::Audio => Box::new(crate::plugins::mp3::strategy::Mp3Strategy::new(
                self.engine.clone(),
                self.ctx.clone(),
                progress,
            )),
        }
    }
}

pub trait CliPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn augment_command(&self, cmd: Command) -> Command;
    fn apply_matches(&self, matches: &ArgMatches, ctx: &mut EngineContext) -> anyhow::Result<()>;
}

pub struct CliPlugins {
    plugins: Vec<Box<dyn CliPlugin>>,
}

impl CliPlugins {
    pub fn with_defaults() -> Self {
        Self { plugins: vec![Box::new(crate::plugins::ytdlp::cli::YtDlpCliPlugin::new())] }
    }

    pub fn augment_command(&self, cmd: Command) -> Command {
        self.plugins.iter().fold(cmd, |c, p| p.augment_command(c))
    }

    pub fn apply_matches(&self, matches: &ArgMatches, ctx: &mut EngineContext) -> anyhow::Result<()> {
        for p in &self.plugins {
            p.apply_matches(matches, ctx)
                .map_err(|e| e.context(format!("invalid {} options", p.name())))?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingEngine;
    use super::*;
    use std::sync::Mutex;

    fn tick(status: &str, percent: &str) -> RawProgress {
        RawProgress {
            status: status.to_string(),
            percent: Some(percent.to_string()),
            speed: Some("1MiB/s".to_string()),
            eta: None,
        }
    }

    #[test]
    fn unknown_format_is_rejected() {
        let factory = StrategyFactory::new(Arc::new(RecordingEngine::default()), EngineContext::default());
        let err = factory.get_strategy("avi", None).err().unwrap();
        assert_eq!(err, UnsupportedFormatError("avi".to_string()));
    }

    #[test]
    fn factory_maps_ids_to_strategies() {
        let factory = StrategyFactory::new(Arc::new(RecordingEngine::default()), EngineContext::default());
        assert_eq!(factory.get_strategy("mp4", None).unwrap().format(), DownloadFormat::Video);
        assert_eq!(factory.get_strategy("MP3", None).unwrap().format(), DownloadFormat::Audio);
    }

    #[test]
    fn literal_template_escapes_percent() {
        assert_eq!(literal_template(Path::new("/v/100% real.mp4")), PathBuf::from("/v/100%% real.mp4"));
    }

    #[test]
    fn common_options_come_from_context() {
        let opts = EngineOptions::from_context(&EngineContext::default());
        assert_eq!((opts.retries, opts.fragment_retries, opts.socket_timeout_secs), (3, 3, 30));
        assert_eq!(opts.http_headers, vec![("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string())]);
    }

    #[tokio::test]
    async fn only_downloading_ticks_reach_the_callback() {
        let engine = Arc::new(RecordingEngine {
            ticks: vec![tick("downloading", "10%"), tick("finished", "100%"), tick("downloading", "N/A")],
            ..Default::default()
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |p: Option<&str>, _s: Option<&str>, _e: Option<&str>| {
            sink.lock().unwrap().push(p.map(str::to_string));
        });

        let factory = StrategyFactory::new(engine.clone(), EngineContext::default());
        let strategy = factory.get_strategy("mp4", Some(callback)).unwrap();
        strategy.download("https://youtu.be/abc", Path::new("/tmp/out.mp4")).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![Some("10%".to_string()), Some("N/A".to_string())]);
        assert_eq!(engine.calls.lock().unwrap().len(), 1);
    }
}
