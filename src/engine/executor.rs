//! Orchestrator - runs the provisioners in order behind operator gates

use colored::Colorize;

use crate::prompt::Prompter;
use crate::resource::{ApplyResult, HostContext, Reconciler, ResourceKind};
use crate::session::SessionState;
use crate::ui;

/// What happened to one resource during the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub kind: ResourceKind,
    pub result: ApplyResult,
}

/// Summary of one configuration pass
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<Outcome>,
    pub created: usize,
    pub modified: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl RunSummary {
    pub fn total_changes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.changed()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, kind: ResourceKind, result: ApplyResult) {
        match &result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
        self.outcomes.push(Outcome { kind, result });
    }
}

/// Run every provisioner once, in order.
///
/// A failing provisioner is recorded and the next one still runs.
pub fn execute(
    resources: &[Box<dyn Reconciler>],
    ctx: &HostContext,
    session: &mut SessionState,
    prompter: &mut dyn Prompter,
) -> RunSummary {
    let mut summary = RunSummary::default();
    let total = resources.len();

    for (i, resource) in resources.iter().enumerate() {
        println!();
        ui::step(i + 1, total, &resource.description());

        let result = run_one(resource.as_ref(), ctx, session, prompter);
        print_outcome(resource.kind(), &result);
        summary.record(resource.kind(), result);
    }

    print_summary(&summary);
    summary
}

fn run_one(
    resource: &dyn Reconciler,
    ctx: &HostContext,
    session: &mut SessionState,
    prompter: &mut dyn Prompter,
) -> ApplyResult {
    match prompter.confirm(&resource.gate_prompt(), true) {
        Ok(true) => {}
        Ok(false) => {
            if let Some(notice) = resource.decline_notice() {
                ui::warn(&notice);
            }
            return ApplyResult::Skipped {
                reason: "declined by operator".to_string(),
            };
        }
        Err(e) => {
            return ApplyResult::Failed {
                error: format!("{e:#}"),
            };
        }
    }

    match resource.apply(ctx, session, prompter) {
        Ok(result) => result,
        Err(e) => {
            log::debug!("{} failed: {e:?}", resource.kind());
            ApplyResult::Failed {
                error: format!("{e:#}"),
            }
        }
    }
}

fn print_outcome(kind: ResourceKind, result: &ApplyResult) {
    let symbol = match result {
        ApplyResult::NoChange => "○".dimmed(),
        ApplyResult::Created | ApplyResult::Modified => "✓".green(),
        ApplyResult::Failed { .. } => "✗".red(),
        ApplyResult::Skipped { .. } => "⊘".yellow(),
    };
    match result {
        ApplyResult::NoChange => println!("  {symbol} {kind}: unchanged"),
        ApplyResult::Created => println!("  {symbol} {kind}: created"),
        ApplyResult::Modified => println!("  {symbol} {kind}: updated"),
        ApplyResult::Skipped { reason } => println!("  {symbol} {kind}: skipped ({reason})"),
        ApplyResult::Failed { error } => {
            eprintln!("  {symbol} {kind}: {}", error.red());
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Configuration pass finished", "✓".green().bold());
    } else {
        println!(
            "  {} Configuration pass finished with errors",
            "⚠".yellow().bold()
        );
    }

    if summary.created > 0 {
        println!("    • {} created", ui::plural(summary.created, "resource"));
    }
    if summary.modified > 0 {
        println!("    • {} modified", ui::plural(summary.modified, "resource"));
    }
    if summary.no_change > 0 {
        println!("    • {} unchanged", ui::plural(summary.no_change, "resource"));
    }
    if summary.skipped > 0 {
        println!("    • {} skipped", ui::plural(summary.skipped, "resource"));
    }
    if summary.failed > 0 {
        println!(
            "    • {} {}",
            ui::plural(summary.failed, "resource"),
            "failed".red()
        );
    }
}
