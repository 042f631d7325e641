//! Package commands

use anyhow::Result;
use reconcile::{CallContext, DesiredState, PackageBackend, PackageSpec};

use crate::Context;
use crate::cli::PackagesCommand;
use crate::report;
use crate::ui;

use super::Host;
use super::declarative::converge;

pub fn run(ctx: &Context, cmd: PackagesCommand) -> Result<()> {
    let host = Host::load()?;
    match cmd {
        PackagesCommand::List => list(ctx, &host),
        PackagesCommand::Search { names } => search(ctx, &host, &names),
        PackagesCommand::Install { packages, yes } => {
            let specs = packages
                .iter()
                .map(|raw| raw.parse::<PackageSpec>())
                .collect::<reconcile::Result<Vec<_>>>()?;
            converge(
                ctx,
                &host.engine(),
                &DesiredState::packages_only(specs),
                yes,
                false,
            )
        }
    }
}

fn list(ctx: &Context, host: &Host) -> Result<()> {
    let mut packages = host.packages.list_installed(&CallContext::new())?;
    packages.sort_by(|a, b| a.name.cmp(&b.name));

    if ctx.json {
        return ui::json(&packages);
    }
    for package in &packages {
        println!("{} {}", package.name, package.version);
    }
    if !ctx.quiet {
        ui::dim(&format!("{} packages installed", packages.len()));
    }
    Ok(())
}

fn search(ctx: &Context, host: &Host, names: &[String]) -> Result<()> {
    let found = host.engine().search_packages(&CallContext::new(), names)?;
    if ctx.json {
        return ui::json(&found);
    }
    report::display_candidates(&found);

    let missing: Vec<&str> = names
        .iter()
        .filter(|n| !found.iter().any(|c| &c.name == *n))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() && !ctx.quiet {
        ui::warn(&format!("Not in any repository: {}", missing.join(", ")));
    }
    Ok(())
}
