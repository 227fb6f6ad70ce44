use crate::core::error::ProgressParseError;
use crate::core::events::{LogLevel, UiEvent, UiSender};
use crate::core::model::ProgressEvent;
use crate::i18n::Messages;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// Raw `(percent, speed, eta)` as the engine reports them.
pub type ProgressCallback = Arc<dyn Fn(Option<&str>, Option<&str>, Option<&str>) + Send + Sync>;

const NOT_AVAILABLE: &str = "N/A";

fn ansi_sgr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("ansi sgr regex"))
}

pub fn strip_ansi(raw: &str) -> String {
    ansi_sgr().replace_all(raw, "").trim().to_string()
}

fn display_field(raw: Option<&str>) -> String {
    match raw.map(strip_ansi) {
        Some(s) if !s.is_empty() => s,
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// `Some(percent)` in `[0, 100]`; `None` when the text is not a number.
fn parse_percent(raw: Option<&str>) -> Option<f64> {
    let cleaned = match raw.map(strip_ansi) {
        None => return Some(0.0),
        Some(s) => s,
    };
    if cleaned.is_empty() || cleaned == NOT_AVAILABLE {
        return Some(0.0);
    }
    let number = if cleaned.contains('%') {
        cleaned.replace('%', "")
    } else {
        cleaned
    };
    let value: f64 = number.trim().parse().ok()?;
    value.is_finite().then(|| value.clamp(0.0, 100.0))
}

pub fn normalize(
    percent: Option<&str>,
    speed: Option<&str>,
    eta: Option<&str>,
) -> Result<ProgressEvent, ProgressParseError> {
    let pct = parse_percent(percent).ok_or_else(|| ProgressParseError {
        percent: percent.map(str::to_string),
        speed: speed.map(str::to_string),
        eta: eta.map(str::to_string),
    })?;
    Ok(ProgressEvent {
        percent: pct,
        speed: display_field(speed),
        eta: display_field(eta),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Single,
    Batch { ordinal: usize, total: usize },
}

impl ProgressMode {
    fn log_step(&self) -> u64 {
        match self {
            ProgressMode::Single => 5,
            ProgressMode::Batch { .. } => 10,
        }
    }

    pub fn prefix(&self) -> String {
        match self {
            ProgressMode::Single => String::new(),
            ProgressMode::Batch { ordinal, total } => format!("[{ordinal}/{total}] "),
        }
    }
}

/// Turns raw engine ticks into UI events. Runs on the background task and
/// only ever talks to the UI through its sender.
#[derive(Clone)]
pub struct ProgressBridge {
    ui: UiSender,
    mode: ProgressMode,
    messages: &'static Messages,
}

impl ProgressBridge {
    pub fn new(ui: UiSender, mode: ProgressMode, messages: &'static Messages) -> Self {
        Self { ui, mode, messages }
    }

    pub fn on_tick(&self, percent: Option<&str>, speed: Option<&str>, eta: Option<&str>) {
        match normalize(percent, speed, eta) {
            Ok(event) => self.publish(&event),
            Err(e) => {
                warn!(error = %e, "skipping progress tick");
                self.ui.log(LogLevel::Warning, format!("{}: {}", self.messages.progress_error, e));
            }
        }
    }

    pub fn status_line(&self, event: &ProgressEvent) -> String {
        let m = self.messages;
        format!(
            "{}{}: {} | {}: {} | {}: {:.1}%",
            self.mode.prefix(),
            m.speed,
            event.speed,
            m.remaining,
            event.eta,
            m.progress,
            event.percent
        )
    }

    pub fn should_log(&self, percent: f64) -> bool {
        percent >= 100.0 || (percent.floor() as u64) % self.mode.log_step() == 0
    }

    fn publish(&self, event: &ProgressEvent) {
        self.ui.post(UiEvent::Progress(event.percent));
        self.ui.post(UiEvent::Status(self.status_line(event)));
        if self.should_log(event.percent) {
            self.ui.log(
                LogLevel::Info,
                format!(
                    "{}{}: {:.1}% - {}: {}",
                    self.mode.prefix(),
                    self.messages.progress,
                    event.percent,
                    self.messages.speed,
                    event.speed
                ),
            );
        }
    }

    pub fn into_callback(self) -> ProgressCallback {
        Arc::new(move |percent: Option<&str>, speed: Option<&str>, eta: Option<&str>| {
            self.on_tick(percent, speed, eta)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::ui_channel;
    use crate::i18n::EN;

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
        let mut out = vec![];
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    #[test]
    fn strips_colour_codes() {
        assert_eq!(strip_ansi("\x1b[0;94m 42.5%\x1b[0m"), "42.5%");
        assert_eq!(strip_ansi("\x1b[0;32m1.20MiB/s\x1b[0m"), "1.20MiB/s");
    }

    #[test]
    fn parses_percent_shapes() {
        let ev = normalize(Some("\x1b[0;94m 42.5%\x1b[0m"), Some("1MiB/s"), Some("00:10")).unwrap();
        assert_eq!(ev.percent, 42.5);
        assert_eq!(normalize(Some("17"), None, None).unwrap().percent, 17.0);
        assert_eq!(normalize(Some("N/A"), None, None).unwrap().percent, 0.0);
        assert_eq!(normalize(None, None, None).unwrap().percent, 0.0);
    }

    #[test]
    fn clamps_into_range() {
        assert_eq!(normalize(Some("104.2%"), None, None).unwrap().percent, 100.0);
        assert_eq!(normalize(Some("-3"), None, None).unwrap().percent, 0.0);
    }

    #[test]
    fn missing_display_fields_become_na() {
        let ev = normalize(Some("1%"), None, Some("  ")).unwrap();
        assert_eq!(ev.speed, "N/A");
        assert_eq!(ev.eta, "N/A");
    }

    #[test]
    fn garbage_percent_keeps_raw_values() {
        let err = normalize(Some("abc%"), Some("\x1b[1m2MiB/s"), None).unwrap_err();
        assert_eq!(err.percent.as_deref(), Some("abc%"));
        assert_eq!(err.speed.as_deref(), Some("\x1b[1m2MiB/s"));
        assert!(normalize(Some("NaN"), None, None).is_err());
    }

    #[test]
    fn output_never_contains_escapes() {
        for raw in ["\x1b[0;94m  7.0%\x1b[0m", "\x1b[31m99%", "55.5\x1b[0m"] {
            let ev = normalize(Some(raw), Some("\x1b[32mfast\x1b[0m"), Some("\x1b[33m00:01\x1b[0m")).unwrap();
            assert!((0.0..=100.0).contains(&ev.percent));
            assert!(!ev.speed.contains('\x1b') && !ev.eta.contains('\x1b'));
        }
    }

    #[test]
    fn single_mode_posts_progress_status_and_log() {
        let (ui, mut rx) = ui_channel();
        let bridge = ProgressBridge::new(ui, ProgressMode::Single, &EN);
        bridge.on_tick(Some("25.0%"), Some("2MiB/s"), Some("00:30"));
        let events = drain(&mut rx);
        assert_eq!(events[0], UiEvent::Progress(25.0));
        assert_eq!(
            events[1],
            UiEvent::Status("speed: 2MiB/s | remaining: 00:30 | progress: 25.0%".to_string())
        );
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn log_cadence_depends_on_mode() {
        let (ui, _rx) = ui_channel();
        let single = ProgressBridge::new(ui.clone(), ProgressMode::Single, &EN);
        let batch = ProgressBridge::new(ui, ProgressMode::Batch { ordinal: 2, total: 3 }, &EN);
        assert!(single.should_log(15.4));
        assert!(!batch.should_log(15.4));
        assert!(batch.should_log(20.9));
        assert!(!single.should_log(13.0));
        assert!(batch.should_log(100.0));
    }

    #[test]
    fn batch_status_carries_ordinal() {
        let (ui, _rx) = ui_channel();
        let bridge = ProgressBridge::new(ui, ProgressMode::Batch { ordinal: 2, total: 3 }, &EN);
        let ev = ProgressEvent { percent: 3.0, speed: "s".into(), eta: "e".into() };
        assert!(bridge.status_line(&ev).starts_with("[2/3] speed: s"));
    }

    #[test]
    fn malformed_tick_only_logs_a_warning() {
        let (ui, mut rx) = ui_channel();
        let callback = ProgressBridge::new(ui, ProgressMode::Single, &EN).into_callback();
        callback(Some("??"), Some("x"), Some("y"));
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], UiEvent::Log { level: LogLevel::Warning, message } if message.contains("??")));
    }
}
