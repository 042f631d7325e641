//! Network commands

use anyhow::Result;
use colored::Colorize;
use reconcile::{CallContext, ContainerRuntime, CreateNetwork, managed_labels};

use crate::Context;
use crate::cli::NetworksCommand;
use crate::ui;

use super::Host;

pub fn run(ctx: &Context, cmd: NetworksCommand) -> Result<()> {
    let host = Host::load()?;
    match cmd {
        NetworksCommand::List => list(ctx, &host),
        NetworksCommand::Create { name } => {
            let name = name.unwrap_or_else(|| host.settings.network.clone());
            create(ctx, &host, &name)
        }
    }
}

fn list(ctx: &Context, host: &Host) -> Result<()> {
    let mut networks = host.runtime.list_networks(&CallContext::new())?;
    networks.sort_by(|a, b| a.name.cmp(&b.name));

    if ctx.json {
        return ui::json(&networks);
    }
    if networks.is_empty() {
        ui::info("No networks");
        return Ok(());
    }
    println!("{}", format!("{:<12}  {}", "ID", "NAME").bold());
    for network in &networks {
        let marker = if network.name == host.settings.network {
            " (default)".dimmed().to_string()
        } else {
            String::new()
        };
        println!(
            "{:<12}  {}{}",
            reconcile::view::short_id(&network.id),
            network.name,
            marker
        );
    }
    Ok(())
}

fn create(ctx: &Context, host: &Host, name: &str) -> Result<()> {
    let call = CallContext::new();
    let existing = host
        .runtime
        .list_networks(&call)?
        .into_iter()
        .find(|n| n.name == name);

    let (id, created) = match existing {
        Some(network) => (network.id, false),
        None => {
            let request = CreateNetwork {
                name: name.to_string(),
                labels: managed_labels(),
            };
            (host.runtime.create_network(&call, &request)?, true)
        }
    };

    if ctx.json {
        return ui::json(&serde_json::json!({ "network": name, "id": id, "created": created }));
    }
    match create_message(ctx, name, created) {
        Some(msg) if created => ui::success(&msg),
        Some(msg) => ui::info(&msg),
        None => {}
    }
    Ok(())
}

/// What `create` reports, unless `--quiet` hides it
fn create_message(ctx: &Context, name: &str, created: bool) -> Option<String> {
    if ctx.quiet {
        return None;
    }
    Some(if created {
        format!("Created network {name}")
    } else {
        format!("Network {name} already exists")
    })
}
