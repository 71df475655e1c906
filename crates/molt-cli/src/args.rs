use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the molt binary.
#[derive(Parser, Debug)]
#[command(
    name = "molt",
    version,
    about = "One-shot namespace-to-module migration for a TypeScript codebase"
)]
pub struct CliArgs {
    /// Pass to run (see --list-passes); omit to run the full ordered batch.
    pub pass: Option<String>,

    /// Project root, or the root config file inside it (e.g.
    /// src/tsconfig-base.json).
    #[arg(short = 'p', long = "project", default_value = ".")]
    pub project: PathBuf,

    /// List the registered passes and exit.
    #[arg(long = "listPasses", alias = "list-passes")]
    pub list_passes: bool,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pass_and_project() {
        let args = CliArgs::parse_from(["molt", "unindent", "--project", "ts"]);
        assert_eq!(args.pass.as_deref(), Some("unindent"));
        assert_eq!(args.project, PathBuf::from("ts"));
        assert!(!args.list_passes);
    }

    #[test]
    fn defaults_to_batch_in_cwd() {
        let args = CliArgs::parse_from(["molt"]);
        assert!(args.pass.is_none());
        assert_eq!(args.project, PathBuf::from("."));
    }
}
