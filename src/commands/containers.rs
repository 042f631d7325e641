//! Container commands

use anyhow::{Result, bail};
use reconcile::{CallContext, ContainerFilter};

use crate::Context;
use crate::cli::ContainersCommand;
use crate::report;
use crate::ui;

use super::Host;

pub fn run(ctx: &Context, cmd: ContainersCommand) -> Result<()> {
    let host = Host::load()?;
    let call = CallContext::new();

    match cmd {
        ContainersCommand::List { all, managed } => {
            let filter = ContainerFilter {
                all,
                managed_only: managed,
            };
            let rows = host.engine().list_containers(&call, filter)?;
            if ctx.json {
                return ui::json(&rows);
            }
            report::display_containers(&rows);
        }
        ContainersCommand::Describe { name } => {
            let Some(view) = host.engine().describe_container(&call, &name)? else {
                bail!("no container named {name}");
            };
            if ctx.json {
                return ui::json(&view);
            }
            report::display_container(&view);
        }
        ContainersCommand::Start { name } => {
            host.runtime.start(&call, &name)?;
            done(ctx, "started", &name)?;
        }
        ContainersCommand::Stop { name } => {
            host.runtime.stop(&call, &name)?;
            done(ctx, "stopped", &name)?;
        }
        ContainersCommand::Remove { name, force } => {
            host.runtime.remove(&call, &name, force)?;
            done(ctx, "removed", &name)?;
        }
    }
    Ok(())
}

fn done(ctx: &Context, verb: &str, name: &str) -> Result<()> {
    if ctx.json {
        return ui::json(&serde_json::json!({ "container": name, "status": verb }));
    }
    if !ctx.quiet {
        ui::success(&format!("Container {name} {verb}"));
    }
    Ok(())
}
