mod core;
mod i18n;
mod plugins;
mod ui;

use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::events::{ui_channel, ReadyGuard, UiEvent};
use crate::core::model::{DownloadFormat, DownloadRequest};
use crate::core::orchestrator::Orchestrator;
use crate::core::store::{default_download_dir, ConfigStore, HistoryStore, DEFAULT_CONFIG_FILE, DEFAULT_HISTORY_FILE};
use crate::core::validate::{batch_lines, validate_batch, validate_url};
use crate::i18n::{get_messages, Locale, Messages};
use crate::plugins::registry::{CliPlugins, EngineContext, StrategyFactory};
use crate::plugins::ytdlp::engine::YtDlpEngine;
use crate::ui::{TerminalUi, UiFlow};

/// How long a stopped download gets to wind down before the process exits.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn build_cli(plugins: &CliPlugins) -> Command {
    let cmd = Command::new("tubedownloader")
        .about("Download YouTube videos as MP4 or their audio as MP3 (yt-dlp based)")
        .arg(Arg::new("url").help("Video link").num_args(1))
        .arg(
            Arg::new("batch_file")
                .long("batch-file")
                .help("File with one link per line; blank lines are skipped")
                .num_args(1),
        )
        .arg(
            Arg::new("batch")
                .long("batch")
                .help("Add a link to the batch (repeatable)")
                .action(ArgAction::Append)
                .num_args(1),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .help("mp4 (video) or mp3 (audio only)")
                .default_value("mp4")
                .num_args(1),
        )
        .arg(
            Arg::new("out_dir")
                .long("out-dir")
                .help("Download directory; remembered in the config file")
                .num_args(1),
        )
        .arg(
            Arg::new("thumbnail")
                .long("thumbnail")
                .help("Also save the video thumbnail as PNG")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config_file")
                .long("config-file")
                .default_value(DEFAULT_CONFIG_FILE)
                .num_args(1),
        )
        .arg(
            Arg::new("history_file")
                .long("history-file")
                .default_value(DEFAULT_HISTORY_FILE)
                .num_args(1),
        )
        .arg(
            Arg::new("show_history")
                .long("show-history")
                .help("Print recorded downloads and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("locale")
                .long("locale")
                .help("Message language: en or zh")
                .default_value("en")
                .num_args(1),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Debug logging")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("windowed")
                .long("windowed")
                .help("No console output apart from errors")
                .action(ArgAction::SetTrue),
        );

    plugins.augment_command(cmd)
}

fn init_logging(verbose: bool, windowed: bool) -> Result<()> {
    let filter = if windowed {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow!(e))
}

enum Work {
    Single(String),
    Batch(Vec<String>),
}

/// Any batch source turns the run into a batch; the positional link joins it.
async fn gather_work(matches: &ArgMatches, messages: &'static Messages) -> Result<Work> {
    let mut lines = Vec::new();
    if let Some(path) = matches.get_one::<String>("batch_file") {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading batch file {path}"))?;
        lines.extend(batch_lines(&text));
    }
    if let Some(values) = matches.get_many::<String>("batch") {
        lines.extend(values.cloned());
    }

    let single = matches.get_one::<String>("url");
    if lines.is_empty() {
        let raw = single.ok_or_else(|| anyhow!("no link given; pass a link, --batch or --batch-file"))?;
        let url = validate_url(raw).context(messages.invalid_link)?;
        return Ok(Work::Single(url));
    }

    if let Some(raw) = single {
        lines.insert(0, raw.clone());
    }
    let urls = validate_batch(&lines).context(messages.invalid_link)?;
    Ok(Work::Batch(urls))
}

async fn print_history(history: &HistoryStore, messages: &Messages) -> Result<()> {
    let records = history.load().await.context("loading history")?;
    if records.is_empty() {
        println!("{}", messages.history_empty);
    }
    for r in records {
        println!("{} | {} | {} | {} | {}", r.timestamp, r.format, r.title, r.path, r.url);
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn run(plugins: &CliPlugins, matches: &ArgMatches, messages: &'static Messages) -> Result<ExitCode> {
    let windowed = matches.get_flag("windowed");
    let config_store = ConfigStore::open(
        matches.get_one::<String>("config_file").map(String::as_str).unwrap_or(DEFAULT_CONFIG_FILE),
    );
    let history = HistoryStore::open(
        matches.get_one::<String>("history_file").map(String::as_str).unwrap_or(DEFAULT_HISTORY_FILE),
    );

    if matches.get_flag("show_history") {
        print_history(&history, messages).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let format: DownloadFormat = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("mp4")
        .parse()?;
    let work = gather_work(matches, messages).await?;

    let config = config_store.load().await.context("loading config")?;
    let destination_dir = match matches.get_one::<String>("out_dir") {
        Some(dir) => {
            let dir = PathBuf::from(dir);
            config_store
                .set_download_dir(&dir)
                .await
                .with_context(|| format!("saving config {}", config_store.path().display()))?;
            dir
        }
        None => config.download_dir.unwrap_or_else(default_download_dir),
    };
    let fetch_thumbnail = matches.get_flag("thumbnail");
    info!(%format, dir = %destination_dir.display(), "download directory");

    let mut ctx = EngineContext::default();
    plugins.apply_matches(matches, &mut ctx)?;
    let cancel = ctx.cancel.clone();

    let (ui_tx, mut ui_rx) = ui_channel();
    let engine = Arc::new(YtDlpEngine::new(ctx.program.clone()));
    let factory = StrategyFactory::new(engine, ctx);
    let orchestrator = Orchestrator::new(factory, history, ui_tx.clone(), messages);

    let request = move |url: String| DownloadRequest {
        url,
        format,
        destination_dir: destination_dir.clone(),
        fetch_thumbnail,
    };

    let worker = tokio::spawn(async move {
        let _ready = ReadyGuard::new(ui_tx.clone());
        match work {
            Work::Single(url) => match orchestrator.run_single(request(url)).await {
                Ok(_) => true,
                Err(e) => {
                    ui_tx.post(UiEvent::Failed { message: format!("{}: {e}", messages.download_failed) });
                    false
                }
            },
            Work::Batch(urls) => {
                let requests = urls.into_iter().map(request).collect();
                orchestrator.run_batch(requests).await.is_full_success()
            }
        }
    });

    let ui = TerminalUi::new(messages, windowed);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = ui_rx.recv() => match event {
                Some(event) => {
                    if ui.apply(event) == UiFlow::Ready {
                        break;
                    }
                }
                None => break,
            },
            _ = &mut shutdown => {
                cancel.cancel();
                ui.clear();
                let _ = tokio::time::timeout(SHUTDOWN_GRACE, worker).await;
                return Ok(ExitCode::SUCCESS);
            }
        }
    }

    let all_ok = worker.await.context("download task ended abnormally")?;
    Ok(if all_ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

#[tokio::main]
async fn main() -> ExitCode {
    let plugins = CliPlugins::with_defaults();
    let matches = build_cli(&plugins).get_matches();

    let verbose = matches.get_flag("verbose");
    let windowed = matches.get_flag("windowed");
    if let Err(e) = init_logging(verbose, windowed) {
        eprintln!("logging unavailable: {e}");
    }

    let locale = matches.get_one::<String>("locale").map(String::as_str).unwrap_or("en");
    let messages = get_messages(Locale::parse(locale));

    match run(&plugins, &matches, messages).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
