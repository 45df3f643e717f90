//! Operator-facing run summary

use std::fmt::Write;

use colored::{ColoredString, Colorize};

use crate::errors::DeployError;
use crate::models::outcome::{OutcomeStatus, PipelineRun};
use crate::pipeline::fsm::Stage;

fn marker(status: OutcomeStatus) -> ColoredString {
    match status {
        OutcomeStatus::Succeeded => "[ OK ]".green(),
        OutcomeStatus::Warning => "[WARN]".yellow(),
        OutcomeStatus::Failed => "[FAIL]".red().bold(),
    }
}

/// Summary of a finished (or aborted) run: one line per stage, the checks,
/// and a verdict
pub fn render_summary(
    run: &PipelineRun,
    cleanup: bool,
    result: &Result<(), DeployError>,
) -> String {
    let mut out = String::new();
    let title = if cleanup { "Cleanup summary" } else { "Deployment summary" };
    let _ = writeln!(out, "\n{}", title.bold());
    let _ = writeln!(
        out,
        "  {} -> {}",
        run.repository.app_id(),
        run.target.destination()
    );

    for outcome in &run.outcomes {
        let _ = writeln!(
            out,
            "  {} {:<22} {}",
            marker(outcome.status),
            outcome.stage.label(),
            outcome.detail
        );
    }

    if !run.checks.is_empty() {
        let _ = writeln!(out, "\n{}", "Checks".bold());
        for check in &run.checks {
            let status = if check.passed {
                OutcomeStatus::Succeeded
            } else {
                OutcomeStatus::Warning
            };
            let _ = writeln!(
                out,
                "  {} {:<30} {}",
                marker(status),
                check.name,
                check.detail
            );
        }
    }

    // Validation and cleanup warnings are already counted per failed check
    let warnings = run
        .warnings()
        .filter(|o| !matches!(o.stage, Stage::Validate | Stage::Cleanup))
        .count()
        + run.checks.iter().filter(|c| !c.passed).count();
    let verdict = match result {
        Err(e) => {
            let text = match e.stage() {
                Some(stage) => format!("Failed at {} (exit {}): {}", stage, e.exit_code(), e),
                None => format!("Failed (exit {}): {}", e.exit_code(), e),
            };
            text.as_str().red().bold()
        }
        Ok(()) if warnings > 0 => format!("Finished with {} warning(s)", warnings)
            .as_str()
            .yellow()
            .bold(),
        Ok(()) => "Finished successfully".green().bold(),
    };
    let _ = writeln!(out, "\n{}", verdict);
    out
}
