use anyhow::Result;
use colored::*;
use pipewarden_core::model::unescape_json_key;
use pipewarden_core::{RuleResult, ScanOutcome, SchemaError};
use std::io::Write;

/// Print the full scan outcome to the terminal.
pub fn print_outcome(outcome: &ScanOutcome) {
    println!();
    println!(
        "{}",
        format!(" Pipewarden v{}", env!("CARGO_PKG_VERSION")).bold()
    );
    println!();

    for warning in &outcome.warnings {
        println!(" {} {}", "warning:".yellow().bold(), warning);
    }
    for error in &outcome.rule_errors {
        println!(" {} {}", "rule skipped:".yellow().bold(), error);
    }
    if !outcome.warnings.is_empty() || !outcome.rule_errors.is_empty() {
        println!();
    }

    let mut failed: Vec<&RuleResult> = Vec::new();
    for result in outcome.results.values() {
        if result.valid {
            println!(" {} {}", "PASS".green().bold(), result.rule_name);
        } else {
            failed.push(result);
        }
    }
    if failed.is_empty() {
        println!();
        println!(
            " {} All evaluated rules passed.",
            "OK".green().bold()
        );
    }

    for result in &failed {
        println!();
        println!(" {} {}", "FAIL".red().bold(), result.rule_name.bold());
        println!("   {}", result.failure_message);
        print_error_table(&result.schema_errors);
    }

    println!();
    println!(" {}", "Summary".bold().underline());
    println!(" {} Owners scanned:      {}", "|-".dimmed(), outcome.summary.total_owners);
    println!(" {} Repositories:        {}", "|-".dimmed(), outcome.summary.total_repositories);
    println!(" {} Pipeline files:      {}", "|-".dimmed(), outcome.summary.total_pipelines);
    println!(" {} Rules evaluated:     {}", "|-".dimmed(), outcome.summary.total_rules_evaluated);
    let failed_count = outcome.summary.total_failed_rules;
    println!(
        " {} Rules failed:        {}",
        "|-".dimmed(),
        if failed_count > 0 {
            failed_count.to_string().red().bold().to_string()
        } else {
            "0".green().to_string()
        }
    );

    if !outcome.disabled_rules.is_empty() {
        println!();
        println!(
            " {} {}",
            "Disabled rules:".dimmed(),
            outcome.disabled_rules.join(", ").dimmed()
        );
    }

    if let Some(url) = &outcome.summary.url {
        println!();
        println!(
            " Select which rules run for your organization at {}",
            url.cyan()
        );
    }
    println!();
}

const TABLE_HEADERS: [&str; 5] = [
    "SCM Platform",
    "CICD Platform",
    "Owner Name",
    "Repository Name",
    "Pipeline Relative Path",
];

fn error_cells(error: &SchemaError) -> [String; 5] {
    [
        error.scm_platform.label().to_string(),
        error.ci_platform.map(|p| p.label().to_string()).unwrap_or_default(),
        unescape_json_key(&error.owner_name),
        unescape_json_key(&error.repository_name),
        unescape_json_key(&error.pipeline_rel_path),
    ]
}

fn print_error_table(errors: &[SchemaError]) {
    let rows: Vec<[String; 5]> = errors.iter().map(error_cells).collect();

    let mut widths: [usize; 5] = TABLE_HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.len());
        }
    }

    let header: Vec<String> = TABLE_HEADERS
        .iter()
        .zip(widths)
        .map(|(h, w)| format!("{h:<w$}"))
        .collect();
    println!("   {}", header.join("  ").dimmed());

    for row in &rows {
        let line: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect();
        println!("   {}", line.join("  "));
    }
}

/// Write failed-rule rows as CSV to stdout.
pub fn print_csv(outcome: &ScanOutcome) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "owner,repository,workflowRelPath,ruleName,failureMessage")?;

    for result in outcome.results.values() {
        if result.valid {
            continue;
        }
        for error in &result.schema_errors {
            writeln!(
                out,
                "{},{},{},{},{}",
                csv_field(&unescape_json_key(&error.owner_name)),
                csv_field(&unescape_json_key(&error.repository_name)),
                csv_field(&unescape_json_key(&error.pipeline_rel_path)),
                csv_field(&result.rule_name),
                csv_field(&result.failure_message),
            )?;
        }
    }
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
