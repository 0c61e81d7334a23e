use clap::Parser;

pub mod global;
pub mod root_commands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::Commands;

/// Top-level CLI parser for the `rly` binary.
#[derive(Debug, Parser)]
#[command(name = "rly", version, about = "relay - incremental multi-source sync")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, table, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Max results to return
    #[arg(short, long, global = true)]
    pub limit: Option<u32>,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Extract ergonomic global flags struct for command handlers.
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            limit: self.limit,
            quiet: self.quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Commands, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_parses_source_and_window() {
        let cli = Cli::try_parse_from([
            "rly",
            "run",
            "calls",
            "--tenant",
            "acme",
            "--from",
            "2026-03-01",
            "--to",
            "2026-03-08",
        ])
        .expect("cli should parse");

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.source, "calls");
        assert_eq!(args.tenant.as_deref(), Some("acme"));
        assert_eq!(args.from, "2026-03-01");
    }

    #[test]
    fn run_requires_window() {
        assert!(Cli::try_parse_from(["rly", "run", "calls"]).is_err());
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["rly", "history", "--format", "table", "--quiet"])
            .expect("cli should parse");

        assert_eq!(cli.format, OutputFormat::Table);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::History(_)));
    }

    #[test]
    fn output_format_rejects_invalid_value() {
        assert!(Cli::try_parse_from(["rly", "--format", "xml", "history"]).is_err());
    }

    #[test]
    fn watch_flags() {
        let cli = Cli::try_parse_from(["rly", "watch", "--interval", "60", "--once"])
            .expect("cli should parse");
        let Commands::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.interval, Some(60));
        assert!(args.once);
        assert!(!args.fresh_lookups);
    }
}
