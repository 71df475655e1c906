//! `molt` — one-shot namespace-to-module migration for a TypeScript
//! codebase. Loads the project, runs the requested pass (or the full ordered
//! batch), and writes the result back to disk.

mod args;
mod driver;
#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = args::CliArgs::parse();

    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.list_passes {
        for pass in molt_transforms::PASSES {
            println!("{}", pass.name);
        }
        return;
    }

    match driver::run(cli.pass.as_deref(), &cli.project) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            println!("{error:#}");
            std::process::exit(1);
        }
    }
}
