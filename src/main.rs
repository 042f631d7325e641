mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod report;
mod resource;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        json: cli.json,
    };

    match run(&ctx, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if ctx.json {
                eprintln!("{}", error_json(&err));
            } else {
                ui::error(&format!("{err:#}"));
            }
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Plan(args) => commands::declarative::plan(ctx, &args),
        Command::Apply(args) => {
            commands::declarative::apply(ctx, &args.desired, args.yes, args.dry_run)
        }
        Command::Export { output } => commands::declarative::export(ctx, output.as_deref()),
        Command::Containers(cmd) => commands::containers::run(ctx, cmd),
        Command::Networks(cmd) => commands::networks::run(ctx, cmd),
        Command::Packages(cmd) => commands::packages::run(ctx, cmd),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "hivekeep", &mut io::stdout());
            Ok(())
        }
    }
}

/// The engine error somewhere in the chain, if any
fn engine_error(err: &anyhow::Error) -> Option<&reconcile::Error> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<reconcile::Error>())
}

/// Process exit status for a failed command
fn exit_code(err: &anyhow::Error) -> u8 {
    engine_error(err).map_or(1, |e| e.kind().exit_code() as u8)
}

/// `{"error": <message>}`, as engine errors render themselves
fn error_json(err: &anyhow::Error) -> serde_json::Value {
    match engine_error(err) {
        Some(engine) if err.chain().count() == 1 => engine.to_json(),
        _ => serde_json::json!({ "error": format!("{err:#}") }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context as _;
    use reconcile::ResourceIdentity;

    #[test]
    fn test_exit_code_follows_error_kind() {
        let locked: anyhow::Error = reconcile::Error::Locked {
            holder: "/var/lib/pacman/db.lck".to_string(),
        }
        .into();
        assert_eq!(exit_code(&locked), 3);

        let prereq = Err::<(), _>(reconcile::Error::PrereqMissing {
            resource: ResourceIdentity::container("web"),
            missing: ResourceIdentity::network("hivekeep-network"),
        })
        .context("apply failed")
        .unwrap_err();
        assert_eq!(exit_code(&prereq), 2);

        assert_eq!(exit_code(&anyhow::anyhow!("plain failure")), 1);
        assert_eq!(exit_code(&reconcile::Error::Cancelled.into()), 130);
    }

    #[test]
    fn test_error_json() {
        let err: anyhow::Error = reconcile::Error::Cancelled.into();
        assert_eq!(error_json(&err), serde_json::json!({ "error": "operation cancelled" }));

        let wrapped = anyhow::anyhow!("disk full").context("Could not write out.yaml");
        assert_eq!(
            error_json(&wrapped),
            serde_json::json!({ "error": "Could not write out.yaml: disk full" })
        );
    }
}
