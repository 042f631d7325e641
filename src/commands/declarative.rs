//! Declarative commands
//!
//! - `plan` - Preview what apply would change
//! - `apply` - Make live state match the desired state
//! - `export` - Write managed containers back as a document

use anyhow::{Context as AnyhowContext, Result};
use reconcile::{CallContext, DesiredState, Engine};
use std::fs;
use std::path::Path;

use crate::Context;
use crate::cli::DesiredArgs;
use crate::config;
use crate::progress::ApplyProgress;
use crate::report;
use crate::ui;

use super::{Host, confirm_proceed};

/// Load the desired state named by the arguments and settings
///
/// An explicitly given document must exist; the default one may be absent.
pub fn desired_state(host: &Host, args: &DesiredArgs) -> Result<DesiredState> {
    let (path, required) = match &args.file {
        Some(file) => (file.clone(), true),
        None => (host.settings.desired_path()?, false),
    };
    let document = config::load_document(&path, required)?;
    let packages = host.settings.package_specs(&args.packages)?;
    let desired = DesiredState::from_document(document, packages)
        .with_context(|| format!("Invalid desired state in {}", path.display()))?;
    log::debug!(
        "Desired: {} networks, {} containers, {} packages",
        desired.networks.len(),
        desired.containers.len(),
        desired.packages.len()
    );
    Ok(desired)
}

pub fn plan(ctx: &Context, args: &DesiredArgs) -> Result<()> {
    let host = Host::load()?;
    let desired = desired_state(&host, args)?;
    let plan = host.engine().plan(&CallContext::new(), &desired)?;

    if ctx.json {
        return ui::json(&plan);
    }
    report::display_plan(&plan, ctx.verbose > 0);
    Ok(())
}

pub fn apply(ctx: &Context, args: &DesiredArgs, yes: bool, dry_run: bool) -> Result<()> {
    let host = Host::load()?;
    let desired = desired_state(&host, args)?;
    converge(ctx, &host.engine(), &desired, yes, dry_run)
}

/// Plan, confirm and reconcile
pub fn converge(
    ctx: &Context,
    engine: &Engine<'_>,
    desired: &DesiredState,
    yes: bool,
    dry_run: bool,
) -> Result<()> {
    let call = CallContext::new();

    if desired.is_empty() {
        if ctx.json {
            return ui::json(&serde_json::json!({ "plan": [], "results": [], "errors": [] }));
        }
        ui::info("Nothing declared");
        return Ok(());
    }

    let plan = engine.plan(&call, desired)?;
    if !ctx.json {
        report::display_plan(&plan, ctx.verbose > 0);
    }

    let unresolved = plan.unresolved().count();
    if plan.changes().next().is_none() {
        if ctx.json {
            return ui::json(&serde_json::json!({ "plan": plan, "results": [], "errors": [] }));
        }
        if unresolved > 0 {
            ui::warn(&format!(
                "{unresolved} entries cannot be resolved automatically"
            ));
        } else {
            ui::success("Already converged");
        }
        return Ok(());
    }

    if dry_run {
        if ctx.json {
            return ui::json(&serde_json::json!({ "plan": plan, "results": [], "errors": [] }));
        }
        println!();
        ui::info("Dry run - no changes made");
        return Ok(());
    }

    if !yes && !ctx.json && !confirm_proceed("Apply these changes?")? {
        println!();
        ui::warn("Aborted");
        return Ok(());
    }

    // Reconcile observes live state again
    let mut progress = ApplyProgress::new(ctx.quiet || ctx.json);
    let outcome = engine.reconcile_with_progress(&call, desired, &mut progress);
    drop(progress);

    if ctx.json {
        ui::json(&report::outcome_json(&outcome))?;
    } else {
        report::display_outcome(&outcome);
    }

    match outcome.errors.into_iter().next() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

pub fn export(ctx: &Context, output: Option<&Path>) -> Result<()> {
    let host = Host::load()?;
    let engine = host.engine();
    let call = CallContext::new();

    match output {
        Some(path) => {
            let document = engine.export_desired(&call)?;
            let yaml = document.to_yaml()?;
            fs::write(path, yaml)
                .with_context(|| format!("Could not write {}", path.display()))?;
            if ctx.json {
                return ui::json(&serde_json::json!({
                    "path": path,
                    "containers": document.containers.len(),
                }));
            }
            if !ctx.quiet {
                ui::success(&format!(
                    "Exported {} containers to {}",
                    document.containers.len(),
                    path.display()
                ));
            }
        }
        None if ctx.json => ui::json(&engine.export_desired(&call)?)?,
        None => print!("{}", engine.export_document(&call)?),
    }
    Ok(())
}
