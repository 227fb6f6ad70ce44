use chrono::Local;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::debug;

use crate::core::events::{LogLevel, UiEvent};
use crate::i18n::Messages;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiFlow {
    Continue,
    /// The background task is done; the loop may exit.
    Ready,
}

/// Owns the progress bar. Lives on the main task and is the only place
/// anything is drawn.
pub struct TerminalUi {
    bar: ProgressBar,
    messages: &'static Messages,
}

impl TerminalUi {
    pub fn new(messages: &'static Messages, windowed: bool) -> Self {
        let bar = ProgressBar::new(100);
        if windowed {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {wide_msg}") {
            bar.set_style(style.progress_chars("=>-"));
        }
        Self { bar, messages }
    }

    pub fn apply(&self, event: UiEvent) -> UiFlow {
        match event {
            UiEvent::Progress(percent) => self.bar.set_position(percent.round() as u64),
            UiEvent::Status(line) => self.bar.set_message(line),
            UiEvent::Log { level, message } => self.println(level, &message),
            UiEvent::VideoInfo { title_line, channel_line } => {
                self.bar.println(title_line);
                self.bar.println(channel_line);
            }
            UiEvent::StateChanged { batch_id, state } => debug!(%batch_id, ?state, "state changed"),
            UiEvent::SingleFinished { path } => {
                self.bar.set_position(100);
                self.bar.set_message(path.display().to_string());
            }
            UiEvent::BatchFinished { completed, total, failed, .. } => {
                let m = self.messages;
                self.bar
                    .set_message(format!("{} {completed}/{total}, {} {failed}", m.succeeded, m.failed));
            }
            UiEvent::Failed { message } => self.println(LogLevel::Error, &message),
            UiEvent::Ready => {
                self.bar.finish_and_clear();
                return UiFlow::Ready;
            }
        }
        UiFlow::Continue
    }

    fn println(&self, level: LogLevel, message: &str) {
        self.bar.println(log_line(self.messages, level, message));
    }

    /// Used on signal shutdown.
    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }
}

fn level_prefix(messages: &Messages, level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => messages.info_prefix,
        LogLevel::Success => messages.success_prefix,
        LogLevel::Warning => messages.warning_prefix,
        LogLevel::Error => messages.error_prefix,
    }
}

pub fn log_line(messages: &Messages, level: LogLevel, message: &str) -> String {
    format!(
        "[{}] [{}] {}",
        Local::now().format("%H:%M:%S"),
        level_prefix(messages, level),
        message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::BatchState;
    use crate::i18n::{EN, ZH};
    use std::path::PathBuf;

    #[test]
    fn log_lines_carry_level_and_time() {
        let line = log_line(&EN, LogLevel::Warning, "slow");
        assert!(line.ends_with("[WARN] slow"));
        assert_eq!(&line[0..1], "[");
        assert_eq!(line.find(']'), Some(9));
        assert!(log_line(&ZH, LogLevel::Error, "x").contains("[错误]"));
    }

    #[test]
    fn only_ready_ends_the_loop() {
        let ui = TerminalUi::new(&EN, true);
        let events = vec![
            UiEvent::Progress(42.4),
            UiEvent::Status("s".into()),
            UiEvent::Log { level: LogLevel::Info, message: "m".into() },
            UiEvent::StateChanged { batch_id: uuid::Uuid::new_v4(), state: BatchState::Running },
            UiEvent::SingleFinished { path: PathBuf::from("/tmp/x.mp4") },
            UiEvent::Failed { message: "f".into() },
        ];
        for e in events {
            assert_eq!(ui.apply(e), UiFlow::Continue);
        }
        assert_eq!(ui.bar.position(), 100);
        assert_eq!(ui.apply(UiEvent::Ready), UiFlow::Ready);
    }

    #[test]
    fn progress_rounds_to_whole_percent() {
        let ui = TerminalUi::new(&EN, true);
        ui.apply(UiEvent::Progress(42.6));
        assert_eq!(ui.bar.position(), 43);
    }
}
