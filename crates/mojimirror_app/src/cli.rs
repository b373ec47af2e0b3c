use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use mirror_logging::LogDestination;

#[derive(Debug, Parser)]
#[command(
    name = "mojimirror",
    version,
    about = "Mirror the slackmojis catalog into local storage"
)]
pub struct Cli {
    /// Root directory; the mirror lands in <dest>/emojis
    #[arg(long, default_value = ".")]
    pub dest: PathBuf,

    /// Restrict the number of listing pages
    #[arg(long)]
    pub limit: Option<u64>,

    /// Only download one category
    #[arg(long)]
    pub category: Option<String>,

    /// Fixed number of page fetch workers (adaptive when omitted)
    #[arg(long)]
    pub page_concurrency: Option<usize>,

    /// Fixed number of concurrent downloads (adaptive when omitted)
    #[arg(long)]
    pub download_concurrency: Option<usize>,

    /// Save the emoji listing to ./emojis.json instead of mirroring
    #[arg(long)]
    pub dump: bool,

    /// Where log output goes
    #[arg(long, value_enum, default_value = "terminal")]
    pub log: LogTarget,
}

impl Cli {
    pub fn output_root(&self) -> PathBuf {
        self.dest.join("emojis")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

impl LogTarget {
    pub fn destination(self) -> LogDestination {
        match self {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_concurrency_adaptive() {
        let cli = Cli::try_parse_from(["mojimirror"]).unwrap();
        assert_eq!(cli.dest, PathBuf::from("."));
        assert_eq!(cli.limit, None);
        assert_eq!(cli.page_concurrency, None);
        assert_eq!(cli.download_concurrency, None);
        assert!(!cli.dump);
        assert_eq!(cli.output_root(), PathBuf::from("./emojis"));
    }

    #[test]
    fn parses_full_flag_set() {
        let cli = Cli::try_parse_from([
            "mojimirror",
            "--dest",
            "/tmp/mirror",
            "--limit",
            "5",
            "--category",
            "Party Parrot",
            "--page-concurrency",
            "4",
            "--download-concurrency",
            "16",
            "--log",
            "both",
        ])
        .unwrap();
        assert_eq!(cli.dest, PathBuf::from("/tmp/mirror"));
        assert_eq!(cli.limit, Some(5));
        assert_eq!(cli.category.as_deref(), Some("Party Parrot"));
        assert_eq!(cli.page_concurrency, Some(4));
        assert_eq!(cli.download_concurrency, Some(16));
        assert_eq!(cli.log, LogTarget::Both);
        assert_eq!(cli.output_root(), PathBuf::from("/tmp/mirror/emojis"));
    }
}
