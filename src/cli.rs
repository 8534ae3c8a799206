use clap::Parser;

use crate::db::MEMORY_TARGET;

#[derive(Debug, Parser)]
#[command(name = "clipboard-archive")]
#[command(about = "Clipboard history archive over HTTP", long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// SQLite database path (`:memory:` for a throwaway store)
    #[arg(long, default_value = "clipboard_archive.sqlite3")]
    pub database: String,

    /// Address the HTTP server listens on
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// Print version information and exit
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    /// Verbose logging, including every SQL statement
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn is_ephemeral(&self) -> bool {
        self.database == MEMORY_TARGET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["clipboard-archive"]).expect("parse");
        assert_eq!(cli.database, "clipboard_archive.sqlite3");
        assert_eq!(cli.bind, "0.0.0.0:8080");
        assert!(!cli.version);
        assert!(!cli.debug);
        assert!(!cli.is_ephemeral());
    }

    #[test]
    fn parses_all_flags() {
        let cli = Cli::try_parse_from([
            "clipboard-archive",
            "--database",
            ":memory:",
            "--bind",
            "127.0.0.1:9000",
            "-v",
            "--debug",
        ])
        .expect("parse");
        assert!(cli.is_ephemeral());
        assert_eq!(cli.bind, "127.0.0.1:9000");
        assert!(cli.version);
        assert!(cli.debug);
    }
}
