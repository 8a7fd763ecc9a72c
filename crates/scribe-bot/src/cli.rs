//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Scribe - summarizes X Spaces on request and answers follow-up questions
#[derive(Parser, Debug)]
#[command(name = "scribe")]
#[command(version, about = "Summarize X Spaces on request and answer follow-up questions")]
pub struct Cli {
    /// State directory (default: $SCRIBE_STATE_DIR or ~/.scribe)
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Do not run the X summary bot
    #[arg(long)]
    pub no_twitter: bool,

    /// Do not run the Telegram relay
    #[arg(long)]
    pub no_telegram: bool,
}

impl Cli {
    /// Default log filter for the verbosity level. `RUST_LOG` overrides it.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "scribe=info,teloxide=warn",
            1 => "scribe=debug,teloxide=info",
            2 => "scribe=trace,teloxide=debug",
            _ => "trace",
        }
    }

    /// Environment value forced by a flag, if any.
    pub fn env_override(&self, key: &str) -> Option<String> {
        match key {
            "ENABLE_TWITTER" if self.no_twitter => Some("false".to_string()),
            "ENABLE_TELEGRAM" if self.no_telegram => Some("false".to_string()),
            _ => None,
        }
    }
}
