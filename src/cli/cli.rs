use crate::cli::commands::ShareCommand;
use crate::logging::LogFormat;
use clap::{ArgAction, Parser};

const EXAMPLES: &str = "Examples:
  lan-drop -f video.mp4 -t 5m
  lan-drop -f backup.zip -t 1h -p 3000
  lan-drop -f photos/ -t 300 -a photos
  lan-drop -t 10m                      (upload mode)";

#[derive(Parser, Debug)]
#[command(
    name = "lan-drop",
    version,
    about = "Drop - Ephemeral file sharing over LAN",
    after_help = EXAMPLES
)]
pub struct Cli {
    #[command(flatten)]
    pub share: ShareCommand,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, value_enum, env = "DROP_LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}
