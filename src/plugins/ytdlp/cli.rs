use crate::plugins::registry::{CliPlugin, EngineContext, DEFAULT_USER_AGENT};
use clap::{Arg, ArgMatches, Command};

pub struct YtDlpCliPlugin;

impl YtDlpCliPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl CliPlugin for YtDlpCliPlugin {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn augment_command(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("ytdlp_program")
                .long("yt-dlp")
                .help_heading("Engine")
                .help("Path to the yt-dlp executable")
                .default_value("yt-dlp")
                .num_args(1),
        )
        .arg(
            Arg::new("ytdlp_user_agent")
                .long("user-agent")
                .help_heading("Engine")
                .help("User-Agent sent with every request")
                .default_value(DEFAULT_USER_AGENT)
                .num_args(1),
        )
        .arg(
            Arg::new("ytdlp_socket_timeout")
                .long("socket-timeout")
                .help_heading("Engine")
                .help("Socket timeout in seconds")
                .default_value("30")
                .num_args(1),
        )
        .arg(
            Arg::new("ytdlp_retries")
                .long("retries")
                .help_heading("Engine")
                .help("Retries for the whole request and for each fragment")
                .default_value("3")
                .num_args(1),
        )
    }

    fn apply_matches(&self, matches: &ArgMatches, ctx: &mut EngineContext) -> anyhow::Result<()> {
        if let Some(p) = matches.get_one::<String>("ytdlp_program") {
            ctx.program = p.into();
        }
        if let Some(ua) = matches.get_one::<String>("ytdlp_user_agent") {
            ctx.user_agent = ua.clone();
        }
        if let Some(s) = matches.get_one::<String>("ytdlp_socket_timeout") {
            ctx.socket_timeout_secs = s.parse()?;
        }
        if let Some(s) = matches.get_one::<String>("ytdlp_retries") {
            let retries = s.parse()?;
            ctx.retries = retries;
            ctx.fragment_retries = retries;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::registry::CliPlugins;

    fn command() -> Command {
        CliPlugins::with_defaults().augment_command(Command::new("t"))
    }

    #[test]
    fn defaults_match_context_defaults() {
        let matches = command().try_get_matches_from(["t"]).unwrap();
        let mut ctx = EngineContext::default();
        YtDlpCliPlugin::new().apply_matches(&matches, &mut ctx).unwrap();
        assert_eq!(ctx.program, std::path::PathBuf::from("yt-dlp"));
        assert_eq!((ctx.socket_timeout_secs, ctx.retries, ctx.fragment_retries), (30, 3, 3));
        assert_eq!(ctx.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn overrides_are_applied() {
        let matches = command()
            .try_get_matches_from(["t", "--yt-dlp", "/opt/yt-dlp", "--retries", "7", "--socket-timeout", "5"])
            .unwrap();
        let mut ctx = EngineContext::default();
        CliPlugins::with_defaults().apply_matches(&matches, &mut ctx).unwrap();
        assert_eq!(ctx.program, std::path::PathBuf::from("/opt/yt-dlp"));
        assert_eq!((ctx.retries, ctx.fragment_retries, ctx.socket_timeout_secs), (7, 7, 5));
    }

    #[test]
    fn bad_number_names_the_plugin() {
        let matches = command().try_get_matches_from(["t", "--retries", "many"]).unwrap();
        let err = CliPlugins::with_defaults()
            .apply_matches(&matches, &mut EngineContext::default())
            .unwrap_err();
        assert!(err.to_string().contains("yt-dlp"));
    }
}
