use colored::Colorize;

use crate::executor::parallel::{ApplySummary, ScriptStatus};
use crate::planner::plan::{ExecutionPlan, PlannedScript, ScriptAction};
use crate::state::models::ScriptRecord;

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg.green());
}

/// Print an error message.
pub fn print_error(msg: &str) {
    println!("{} {}", "✗".red().bold(), msg.red());
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow().bold(), msg.yellow());
}

/// Print a script-level execution plan.
pub fn print_plan(plan: &ExecutionPlan) {
    println!();

    if !plan.has_changes() {
        println!("{}", "No changes. All scripts are up-to-date.".green());
        return;
    }

    println!("sqlprov will perform the following actions:");
    println!();

    for planned in &plan.scripts {
        print_planned_script(planned);
    }

    println!("{}", plan);
    println!();
}

fn print_planned_script(planned: &PlannedScript) {
    let (icon, desc) = match &planned.action {
        ScriptAction::Create => ("+".green().bold(), "will be run".to_string()),
        ScriptAction::Replace { changed } => (
            "-/+".magenta().bold(),
            format!("must be rerun ({} changed)", changed.join(", ")),
        ),
        ScriptAction::Update => ("~".yellow().bold(), "will be updated in-place".to_string()),
        ScriptAction::Forget => (
            "-".red().bold(),
            "will be forgotten (remote effects abandoned)".to_string(),
        ),
        ScriptAction::NoOp => return,
    };

    println!(
        "  {} {} {}",
        "#".dimmed(),
        planned.address.bold(),
        desc.dimmed()
    );

    if let Some(spec) = &planned.spec {
        println!("  {} name     = {:?}", icon, spec.request.name);
        println!("      instance = {:?}", spec.request.instance);
        if let Some(db) = &spec.request.database {
            println!("      database = {:?}", db);
        }
        println!("      project  = {:?}", spec.project);
        println!(
            "      id       = {}",
            if planned.action == ScriptAction::Update {
                spec.request.identity().to_string()
            } else {
                "(known after apply)".dimmed().to_string()
            }
        );
    } else if let Some(record) = &planned.record {
        println!("  {} id = {:?}", icon, record.id);
    }
    println!();
}

/// Print per-script results and the summary line.
pub fn print_apply_summary(summary: &ApplySummary) {
    println!();
    for result in &summary.results {
        match &result.status {
            ScriptStatus::Provisioned(id) => {
                print_success(&format!("{}: provisioned [id={}]", result.address, id))
            }
            ScriptStatus::Updated(id) => {
                print_success(&format!("{}: updated [id={}]", result.address, id))
            }
            ScriptStatus::Forgotten => print_success(&format!("{}: forgotten", result.address)),
            ScriptStatus::InstanceAbsent => print_warning(&format!(
                "{}: target instance not found, script not run",
                result.address
            )),
            ScriptStatus::Failed { kind, message } => {
                print_error(&format!("{} ({}): {}", result.address, kind, message))
            }
            ScriptStatus::Unchanged => {}
        }
    }
    println!();
    if summary.failed > 0 {
        println!("{}", summary.to_string().red().bold());
    } else {
        println!("{}", summary.to_string().green().bold());
    }
}

/// Print tracked scripts as a table.
pub fn print_script_list(records: &[ScriptRecord]) {
    if records.is_empty() {
        println!("{}", "No scripts in state.".dimmed());
        return;
    }

    println!();
    println!("{}", "Provisioned scripts".bold().cyan());
    println!("{}", "─".repeat(80));
    println!(
        "  {:<25} {:<30} {:<12} {}",
        "ADDRESS".bold(),
        "ID".bold(),
        "DATABASE".bold(),
        "CREATED".bold()
    );
    println!("{}", "─".repeat(80));

    for record in records {
        println!(
            "  {:<25} {:<30} {:<12} {}",
            record.address,
            record.id,
            record.database.as_deref().unwrap_or("-"),
            record.created_at.dimmed()
        );
    }

    println!();
    println!("  {} script(s) total.", records.len());
    println!();
}
