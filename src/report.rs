//! Plan and result display

use colored::{ColoredString, Colorize};
use reconcile::{
    Action, ContainerView, DesiredResource, PackageCandidate, Plan, PlanEntry, Reconciliation,
    ResourceKind,
};
use serde_json::{Value, json};

use crate::ui;

fn kind_title(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Network => "Networks",
        ResourceKind::Container => "Containers",
        ResourceKind::Package => "Packages (pacman)",
    }
}

fn action_symbol(action: Action) -> ColoredString {
    match action {
        Action::Create => "+".green(),
        Action::Upgrade => "~".yellow(),
        Action::Noop => "=".dimmed(),
        Action::Unresolved => "!".red(),
    }
}

/// Short description of what an entry will do
pub fn entry_detail(entry: &PlanEntry) -> String {
    match (&entry.resource, entry.action) {
        (DesiredResource::Container(c), Action::Create) => format!("(new) → {}", c.image),
        (DesiredResource::Package(_), Action::Create | Action::Upgrade) => {
            match (&entry.version, &entry.source) {
                (Some(version), Some(repo)) => format!("{} → {version} ({repo})", entry.reason),
                (Some(version), None) => format!("{} → {version}", entry.reason),
                _ => entry.reason.clone(),
            }
        }
        _ => entry.reason.clone(),
    }
}

/// Display a plan grouped by kind, in apply order
///
/// Unchanged entries are listed only with `show_unchanged`.
pub fn display_plan(plan: &Plan, show_unchanged: bool) {
    if plan.is_empty() {
        println!();
        println!("  {} Nothing declared", "ℹ".blue());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Reconciliation Plan".bold()
    );
    println!("│");

    for kind in ResourceKind::APPLY_ORDER {
        let entries: Vec<_> = plan
            .of_kind(kind)
            .into_iter()
            .filter(|e| show_unchanged || e.action != Action::Noop)
            .collect();
        if entries.is_empty() {
            continue;
        }
        println!("│ {}", kind_title(kind).bold());
        for entry in entries {
            let detail = entry_detail(entry);
            let detail = if entry.action == Action::Unresolved {
                detail.red()
            } else {
                detail.dimmed()
            };
            println!(
                "│   {} {:<30} {}",
                action_symbol(entry.action),
                entry.identity().name,
                detail
            );
        }
        println!("│");
    }

    let summary = plan.summary();
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} create, {} upgrade), {} unchanged, {} unresolved",
        summary.changes().to_string().bold(),
        summary.create.to_string().green(),
        summary.upgrade.to_string().yellow(),
        summary.noop,
        summary.unresolved.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Print per-entry results and the final summary
pub fn display_outcome(outcome: &Reconciliation) {
    if !outcome.results.is_empty() {
        println!();
        for result in &outcome.results {
            if result.succeeded {
                println!(
                    "    {} {} {}",
                    "✓".green(),
                    result.action,
                    result.identity
                );
            } else {
                println!(
                    "    {} {} {}: {}",
                    "✗".red(),
                    result.action,
                    result.identity,
                    result.error.as_deref().unwrap_or("failed").red()
                );
            }
        }
    }

    let applied = outcome.results.iter().filter(|r| r.succeeded).count();
    let failed = outcome.results.len() - applied;
    let unresolved = outcome.plan.unresolved().count();

    println!();
    if outcome.is_success() && unresolved == 0 {
        println!("  {} Desired state applied", "✓".green().bold());
    } else {
        println!("  {} Desired state applied with errors", "⚠".yellow().bold());
    }
    if applied > 0 {
        println!("    • {applied} changes applied");
    }
    if failed > 0 {
        println!("    • {} {} failed", failed, "changes".red());
    }
    if unresolved > 0 {
        println!("    • {unresolved} entries need manual attention");
    }
    for error in &outcome.errors {
        ui::error(&error.to_string());
    }
}

/// JSON rendering of a reconciliation
pub fn outcome_json(outcome: &Reconciliation) -> Value {
    json!({
        "plan": outcome.plan,
        "results": outcome.results,
        "errors": outcome
            .errors
            .iter()
            .map(|e| json!({ "kind": e.kind(), "error": e.to_string() }))
            .collect::<Vec<_>>(),
    })
}

/// Print containers as a table
pub fn display_containers(rows: &[ContainerView]) {
    if rows.is_empty() {
        ui::info("No containers");
        return;
    }

    let header = format!(
        "{:<12}  {:<20}  {:<28}  {:<12}  {:<12}  {}",
        "ID", "NAME", "IMAGE", "IMAGE ID", "UPTIME", "MANAGED BY"
    );
    println!("{}", header.bold());
    for row in rows {
        let name = format!("{:<20}", ui::truncate(&row.name, 20));
        // Stopped containers are dimmed
        let name = if row.running {
            name.normal()
        } else {
            name.dimmed()
        };
        println!(
            "{:<12}  {}  {:<28}  {:<12}  {:<12}  {}",
            row.id,
            name,
            ui::truncate(&row.image, 28),
            reconcile::view::short_id(&row.image_id),
            row.uptime,
            row.managed_by
        );
    }
}

/// Print one container as labelled fields
pub fn display_container(view: &ContainerView) {
    let status = if view.running {
        view.status().green()
    } else {
        view.status().dimmed()
    };
    println!("{}", view.name.bold());
    println!("  {:<12} {}", "ID", view.id);
    println!("  {:<12} {}", "Image", view.image);
    println!(
        "  {:<12} {}",
        "Image ID",
        reconcile::view::short_id(&view.image_id)
    );
    println!("  {:<12} {}", "Status", status);
    println!("  {:<12} {}", "Uptime", view.uptime);
    println!("  {:<12} {}", "Managed by", view.managed_by);
}

/// Marker column for a search result
fn candidate_note(candidate: &PackageCandidate) -> String {
    let installed = candidate
        .installed
        .as_deref()
        .map(|v| format!("installed {v}"));
    match (candidate.selected, installed) {
        (true, Some(installed)) => format!("selected, {installed}"),
        (true, None) => "selected".to_string(),
        (false, Some(installed)) => installed,
        (false, None) => String::new(),
    }
}

/// Print repository candidates, one per line
pub fn display_candidates(candidates: &[PackageCandidate]) {
    if candidates.is_empty() {
        ui::info("No matching packages");
        return;
    }
    for candidate in candidates {
        let target = format!("{}/{}", candidate.repository, candidate.name);
        let target = format!("{target:<32}");
        let target = if candidate.selected {
            target.bold()
        } else {
            target.normal()
        };
        println!(
            "{} {:<20} {}",
            target,
            candidate.version,
            candidate_note(candidate).dimmed()
        );
    }
}
