//! Guardrail scan commands
//!
//! Findings are printed; the command fails when any of them is critical.

use super::ScanCommands;
use crate::config::AppConfig;
use anyhow::{Context, Result};
use plugsmith_core::{Guardrails, OutputKind, Violation};

/// Run a scan subcommand.
pub fn run(cmd: ScanCommands, config: &AppConfig) -> Result<()> {
    let guardrails = Guardrails::new(config.guardrails.clone());

    let violations = match cmd {
        ScanCommands::Input { text } => guardrails.validate_input(&text, None),
        ScanCommands::File { path, kind } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            guardrails.validate_output(&content, OutputKind::from(kind))
        }
    };

    report(&violations);
    Guardrails::check_and_raise_critical(&violations)?;
    Ok(())
}

fn report(violations: &[Violation]) {
    if violations.is_empty() {
        println!("No guardrail violations");
        return;
    }

    for v in violations {
        println!("{}", v);
        if let Some(details) = &v.details {
            println!("    {}", details);
        }
        if let Some(fix) = &v.suggested_fix {
            println!("    fix: {}", fix);
        }
    }

    let summary = Guardrails::violations_summary(violations);
    println!(
        "\n{} finding(s): {} critical, {} high, {} medium, {} low",
        summary.total(),
        summary.critical,
        summary.high,
        summary.medium,
        summary.low
    );
}
