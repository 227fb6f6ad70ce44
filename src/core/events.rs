use crate::core::model::{BatchId, BatchState};
use std::path::PathBuf;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Everything the background task wants shown. Only the UI loop applies these.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Progress(f64),
    Status(String),
    Log { level: LogLevel, message: String },
    VideoInfo { title_line: String, channel_line: String },
    StateChanged { batch_id: BatchId, state: BatchState },
    SingleFinished { path: PathBuf },
    BatchFinished { batch_id: BatchId, completed: usize, total: usize, failed: usize },
    Failed { message: String },
    Ready,
}

/// The `post(event)` capability handed to background code.
#[derive(Debug, Clone)]
pub struct UiSender {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl UiSender {
    pub fn post(&self, event: UiEvent) {
        // receiver gone means the UI already shut down
        let _ = self.tx.send(event);
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.post(UiEvent::Log { level, message: message.into() });
    }
}

pub fn ui_channel() -> (UiSender, mpsc::UnboundedReceiver<UiEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiSender { tx }, rx)
}

/// Posts `UiEvent::Ready` when dropped, so the UI leaves its busy state on
/// every exit path of the background task, unwinding included.
pub struct ReadyGuard {
    ui: UiSender,
}

impl ReadyGuard {
    pub fn new(ui: UiSender) -> Self {
        Self { ui }
    }
}

impl Drop for ReadyGuard {
    fn drop(&mut self) {
        self.ui.post(UiEvent::Ready);
    }
}
