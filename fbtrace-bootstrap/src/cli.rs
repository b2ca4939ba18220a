// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! CLI surface (`SPEC_FULL.md` §6): two subcommands, both thin wrappers
//! around `fbtrace`'s control surface. No command language, no
//! dispatch table — `clap`'s derive macro is the entire parser.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "fbtrace", version, about = "Function-boundary tracer control surface")]
pub struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (stacks: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a sink at `path`, drive a synthetic producer against it
    /// for `duration`, then tear the sink down and print a statistics
    /// summary.
    Record {
        /// Log file to create. Must not already exist.
        path: PathBuf,

        /// How long to run the synthetic producer for.
        #[arg(long, value_parser = parse_duration_secs, default_value = "5")]
        duration: Duration,

        /// Number of synthetic producer threads driving entry/exit events.
        #[arg(long, default_value_t = 2)]
        producer_threads: usize,

        /// Target procedure-entry/exit pairs per second, per thread.
        #[arg(long, default_value_t = 1000)]
        event_rate_hz: u64,
    },

    /// Run the same synthetic producer as `record`, against a
    /// throwaway temp file, and print the resulting statistics without
    /// leaving a log file behind. Exercises the `stats` surface without
    /// requiring a separate prior `record` invocation.
    Stats {
        #[arg(long, value_parser = parse_duration_secs, default_value = "1")]
        duration: Duration,

        #[arg(long, default_value_t = 2)]
        producer_threads: usize,

        #[arg(long, default_value_t = 1000)]
        event_rate_hz: u64,
    },
}

fn parse_duration_secs(raw: &str) -> Result<Duration, String> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| format!("'{raw}' is not a whole number of seconds"))
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_requires_a_path() {
        let err = Cli::try_parse_from(["fbtrace", "record"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn record_applies_defaults() {
        let cli = Cli::try_parse_from(["fbtrace", "record", "log.bin"]).unwrap();
        match cli.command {
            Command::Record {
                path,
                duration,
                producer_threads,
                event_rate_hz,
            } => {
                assert_eq!(path, PathBuf::from("log.bin"));
                assert_eq!(duration, Duration::from_secs(5));
                assert_eq!(producer_threads, 2);
                assert_eq!(event_rate_hz, 1000);
            }
            other => panic!("expected Record, got {other:?}"),
        }
    }

    #[test]
    fn stats_takes_no_path() {
        let cli = Cli::try_parse_from(["fbtrace", "stats", "--duration", "2"]).unwrap();
        match cli.command {
            Command::Stats { duration, .. } => assert_eq!(duration, Duration::from_secs(2)),
            other => panic!("expected Stats, got {other:?}"),
        }
    }

    #[test]
    fn global_flags_are_accepted_before_or_after_the_subcommand() {
        let cli = Cli::try_parse_from(["fbtrace", "-v", "record", "log.bin"]).unwrap();
        assert_eq!(cli.verbose, 1);

        let cli = Cli::try_parse_from(["fbtrace", "record", "log.bin", "-v"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn an_unparseable_duration_is_rejected() {
        let err = Cli::try_parse_from(["fbtrace", "record", "log.bin", "--duration", "soon"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
