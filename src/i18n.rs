//! Simple localization support for TubeDownloader.
//! Locale can be selected via the `--locale` CLI flag (e.g. `--locale zh`).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "zh_cn" | "zh-hans" | "zh-tw" | "zh_tw" => Self::Zh,
            _ => Self::En,
        }
    }
}

#[derive(Debug)]
pub struct Messages {
    pub speed: &'static str,
    pub remaining: &'static str,
    pub progress: &'static str,
    pub batch: &'static str,
    pub started: &'static str,
    pub failed: &'static str,
    pub fetching_info: &'static str,
    pub file_name: &'static str,
    pub thumbnail_saved: &'static str,
    pub thumbnail_failed: &'static str,
    pub download_complete: &'static str,
    pub download_failed: &'static str,
    pub history_failed: &'static str,
    pub batch_all_done: &'static str,
    pub batch_partial: &'static str,
    pub succeeded: &'static str,
    pub not_started: &'static str,
    pub stopped: &'static str,
    pub metadata_fallback: &'static str,
    pub progress_error: &'static str,
    pub history_empty: &'static str,
    pub invalid_link: &'static str,
    pub info_prefix: &'static str,
    pub success_prefix: &'static str,
    pub warning_prefix: &'static str,
    pub error_prefix: &'static str,
}

pub static EN: Messages = Messages {
    speed: "speed",
    remaining: "remaining",
    progress: "progress",
    batch: "batch",
    started: "started",
    failed: "failed",
    fetching_info: "Fetching video info...",
    file_name: "File name",
    thumbnail_saved: "Thumbnail saved",
    thumbnail_failed: "Thumbnail download failed",
    download_complete: "Download complete",
    download_failed: "Download failed",
    history_failed: "Could not record download history",
    batch_all_done: "All downloads finished",
    batch_partial: "Batch finished with failures",
    succeeded: "succeeded",
    not_started: "not started",
    stopped: "Stopped, remaining items were not started",
    metadata_fallback: "Could not fetch video info, using a fallback file name",
    progress_error: "Malformed progress data",
    history_empty: "No downloads recorded yet",
    invalid_link: "Invalid link",
    info_prefix: "INFO",
    success_prefix: "OK",
    warning_prefix: "WARN",
    error_prefix: "ERR",
};

pub static ZH: Messages = Messages {
    speed: "速度",
    remaining: "剩余",
    progress: "进度",
    batch: "批量",
    started: "开始",
    failed: "失败",
    fetching_info: "正在获取视频信息...",
    file_name: "文件名",
    thumbnail_saved: "封面下载完成",
    thumbnail_failed: "封面下载失败",
    download_complete: "下载完成",
    download_failed: "下载失败",
    history_failed: "无法写入下载历史",
    batch_all_done: "所有下载任务已完成",
    batch_partial: "批量下载结束，有失败任务",
    succeeded: "成功",
    not_started: "未开始",
    stopped: "已停止，剩余任务未开始",
    metadata_fallback: "获取视频信息失败，使用默认文件名",
    progress_error: "进度数据异常",
    history_empty: "暂无下载记录",
    invalid_link: "链接错误",
    info_prefix: "信息",
    success_prefix: "成功",
    warning_prefix: "警告",
    error_prefix: "错误",
};

pub fn get_messages(locale: Locale) -> &'static Messages {
    match locale {
        Locale::En => &EN,
        Locale::Zh => &ZH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chinese_variants_select_zh() {
        assert_eq!(Locale::parse("zh-CN"), Locale::Zh);
        assert_eq!(Locale::parse("ZH"), Locale::Zh);
        assert_eq!(Locale::parse("fr"), Locale::En);
        assert_eq!(get_messages(Locale::Zh).progress, "进度");
    }
}
