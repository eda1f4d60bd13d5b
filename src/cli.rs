//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Splitcast - monorepo split publisher
///
/// Rewrites configured subdirectories of a monorepo into standalone
/// histories and pushes them to their satellite repositories, reusing
/// a content-addressed cache to skip work already done.
#[derive(Parser, Debug)]
#[command(name = "splitcast")]
#[command(author, version, long_about = None)]
pub struct Cli {
    /// Only process these references (exact short names, repeatable)
    #[arg(long = "ref", value_name = "REF")]
    pub refs: Vec<String>,

    /// Configuration file path
    #[arg(short, long, env = "SPLITCAST_CONFIG", default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["splitcast"]);
        assert!(cli.refs.is_empty());
        assert_eq!(cli.config, PathBuf::from(".splitcast.yml"));
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn ref_flag_is_repeatable() {
        let cli = Cli::parse_from(["splitcast", "--ref", "main", "--ref", "v1.0"]);
        assert_eq!(cli.refs, vec!["main".to_string(), "v1.0".to_string()]);
    }

    #[test]
    fn verbosity_accumulates() {
        let cli = Cli::parse_from(["splitcast", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }
}
