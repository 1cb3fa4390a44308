//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use sorter_core::StubVerdict;
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "sorter", version, about = "Bean sorter carousel controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/sorter_config.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Verdict policy for `--auto-classify`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum AutoClassify {
    /// Every bean is normal
    Normal,
    /// Every bean is a defect
    Defect,
    /// Defect, normal, defect, ...
    Alternating,
}

impl From<AutoClassify> for StubVerdict {
    fn from(v: AutoClassify) -> Self {
        match v {
            AutoClassify::Normal => StubVerdict::AlwaysNormal,
            AutoClassify::Defect => StubVerdict::AlwaysDefect,
            AutoClassify::Alternating => StubVerdict::Alternating,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the sorting loop against the host link
    Run {
        /// Serial device of the vision host; stdin/stdout when omitted
        #[arg(long, value_name = "PATH")]
        port: Option<PathBuf>,
        /// Answer capture requests locally instead of waiting for the host
        #[arg(long, value_enum, value_name = "POLICY")]
        auto_classify: Option<AutoClassify>,
        /// Stop after this many control-loop iterations
        #[arg(long, value_name = "N")]
        max_iterations: Option<u64>,
        /// Zero the carousel at startup instead of waiting for ZERO
        #[arg(long, action = ArgAction::SetTrue)]
        zero_on_start: bool,
    },
    /// Quick health check (devices construct, config consistent)
    SelfCheck,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auto_classify(args: &[&str]) -> Result<Option<StubVerdict>, clap::Error> {
        let cli = Cli::try_parse_from(args)?;
        match cli.cmd {
            Commands::Run { auto_classify, .. } => Ok(auto_classify.map(Into::into)),
            Commands::SelfCheck => Ok(None),
        }
    }

    #[test]
    fn auto_classify_policies_map_to_verdicts() {
        for (name, verdict) in [
            ("normal", StubVerdict::AlwaysNormal),
            ("defect", StubVerdict::AlwaysDefect),
            ("alternating", StubVerdict::Alternating),
        ] {
            let got = auto_classify(&["sorter", "run", "--auto-classify", name]).unwrap();
            assert_eq!(got, Some(verdict));
        }
        assert_eq!(auto_classify(&["sorter", "run"]).unwrap(), None);
    }

    #[test]
    fn unknown_policy_is_rejected_by_clap() {
        let err = auto_classify(&["sorter", "run", "--auto-classify", "maybe"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
