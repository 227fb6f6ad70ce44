use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::core::error::EngineError;
use crate::plugins::registry::{EngineOptions, ExtractionEngine, ProgressHook, RawInfo, RawProgress};

/// Marks template output so progress lines can be told apart from log lines.
const PROGRESS_MARKER: &str = "[progress]";
const PROGRESS_TEMPLATE: &str = "download:[progress]%(progress.status)s|%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s";
/// What the template engine prints for a missing field.
const TEMPLATE_NA: &str = "NA";

/// Drives the `yt-dlp` executable as a child process.
pub struct YtDlpEngine {
    program: PathBuf,
}

impl YtDlpEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    fn common_args(opts: &EngineOptions) -> Vec<String> {
        let mut args = vec![
            "--retries".to_string(),
            opts.retries.to_string(),
            "--fragment-retries".to_string(),
            opts.fragment_retries.to_string(),
            "--socket-timeout".to_string(),
            opts.socket_timeout_secs.to_string(),
        ];
        for (k, v) in &opts.http_headers {
            args.push("--add-header".to_string());
            args.push(format!("{k}:{v}"));
        }
        args
    }

    pub(crate) fn info_args(url: &str, opts: &EngineOptions) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--quiet".to_string(),
        ];
        args.extend(Self::common_args(opts));
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    pub(crate) fn download_args(url: &str, opts: &EngineOptions, with_progress: bool) -> Vec<String> {
        let mut args = Self::common_args(opts);
        if let Some(sel) = &opts.format_selector {
            args.push("-f".to_string());
            args.push(sel.clone());
        }
        if let Some(tpl) = &opts.output_template {
            args.push("-o".to_string());
            args.push(tpl.to_string_lossy().to_string());
        }
        if let Some(container) = &opts.merge_output_format {
            args.push("--merge-output-format".to_string());
            args.push(container.clone());
        }
        if let Some(audio) = &opts.extract_audio {
            args.push("--extract-audio".to_string());
            args.push("--audio-format".to_string());
            args.push(audio.codec.clone());
            args.push("--audio-quality".to_string());
            args.push(audio.quality.clone());
        }
        if with_progress {
            args.push("--newline".to_string());
            args.push("--progress-template".to_string());
            args.push(PROGRESS_TEMPLATE.to_string());
        } else {
            args.push("--no-progress".to_string());
        }
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> EngineError {
        EngineError::Spawn { program: self.program.display().to_string(), source }
    }
}

/// `None` for lines that are not progress template output.
pub(crate) fn parse_progress_line(line: &str) -> Option<RawProgress> {
    let body = line.trim().strip_prefix(PROGRESS_MARKER)?;
    let mut fields = body.splitn(4, '|').map(|f| {
        let f = f.trim();
        (!f.is_empty() && f != TEMPLATE_NA).then(|| f.to_string())
    });
    Some(RawProgress {
        status: fields.next().flatten().unwrap_or_default(),
        percent: fields.next().flatten(),
        speed: fields.next().flatten(),
        eta: fields.next().flatten(),
    })
}

/// Engine output follows the console codepage, not necessarily UTF-8.
fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim_end_matches(['\r', '\n']).to_string()
}

pub(crate) fn last_meaningful_line(stderr: &str) -> Option<String> {
    stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .map(str::to_string)
}

fn failure(code: Option<i32>, stderr_tail: Option<String>) -> EngineError {
    EngineError::Failed {
        code,
        detail: stderr_tail.unwrap_or_else(|| "unknown yt-dlp error".to_string()),
    }
}

#[async_trait]
impl ExtractionEngine for YtDlpEngine {
    fn name(&self) -> &'static str { "yt-dlp" }

    async fn extract_info(&self, url: &str, opts: &EngineOptions) -> Result<RawInfo, EngineError> {
        let args = Self::info_args(url, opts);
        debug!(program = %self.program.display(), ?args, "querying metadata");
        let child = self.command(&args).spawn().map_err(|e| self.spawn_error(e))?;

        let output = match &opts.cancel {
            Some(token) => tokio::select! {
                out = child.wait_with_output() => out?,
                _ = token.cancelled() => return Err(EngineError::Cancelled),
            },
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure(output.status.code(), last_meaningful_line(&stderr)));
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    async fn download(
        &self,
        url: &str,
        opts: &EngineOptions,
        hook: Option<ProgressHook<'_>>,
    ) -> Result<(), EngineError> {
        let args = Self::download_args(url, opts, hook.is_some());
        info!(program = %self.program.display(), url, "starting download");
        debug!(?args, "engine arguments");

        let mut child = self.command(&args).spawn().map_err(|e| self.spawn_error(e))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("failed to capture yt-dlp stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("failed to capture yt-dlp stderr"))?;

        // drained to EOF so a chatty child never blocks on a full pipe
        let stderr_task = tokio::spawn(async move {
            let mut segments = BufReader::new(stderr).split(b'\n');
            let mut tail = None;
            loop {
                match segments.next_segment().await {
                    Ok(Some(raw)) => {
                        if let Some(line) = last_meaningful_line(&decode_line(&raw)) {
                            debug!(target: "yt-dlp", "stderr: {line}");
                            tail = Some(line);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!(target: "yt-dlp", error = %e, "stderr closed");
                        break;
                    }
                }
            }
            tail
        });

        let pump = async {
            let mut segments = BufReader::new(stdout).split(b'\n');
            while let Some(raw) = segments.next_segment().await? {
                let line = decode_line(&raw);
                match parse_progress_line(&line) {
                    Some(tick) => {
                        if let Some(hook) = hook {
                            hook(tick);
                        }
                    }
                    None => debug!(target: "yt-dlp", "stdout: {line}"),
                }
            }
            child.wait().await
        };

        // dropping the child on cancel kills it (kill_on_drop)
        let status = match &opts.cancel {
            Some(token) => tokio::select! {
                status = pump => status?,
                _ = token.cancelled() => return Err(EngineError::Cancelled),
            },
            None => pump.await?,
        };

        if status.success() {
            return Ok(());
        }
        let tail = stderr_task.await.ok().flatten();
        Err(failure(status.code(), tail))
    }
}
