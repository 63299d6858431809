use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// Run a test suite, failing the task if any test fails.
fn suite(label: &str, args: &[&str]) -> Result<()> {
    println!("{}", format!("  Running {label}...").cyan());
    let start = Instant::now();

    let output = Command::new("cargo")
        .args(args)
        .output()
        .with_context(|| format!("Failed to run {label}"))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() {
        eprintln!("{}", format!("  ✗ {label} failed").red().bold());
        eprintln!();
        for line in stdout.lines() {
            eprintln!("  {line}");
        }
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("{label} failed");
    }

    println!(
        "{}",
        format!(
            "  ✓ {label} passed {} in {:.2}s",
            extract_test_summary(&stdout),
            start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();
    Ok(())
}

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    println!();
    println!("{}", "🧪 Running tests...".cyan().bold());
    println!();

    let total_start = Instant::now();

    if !integration_only {
        suite("unit tests", &["test", "--lib", "--workspace"])?;
    }

    // Integration tests drive the sequencer against the simulated fixture.
    if !unit_only {
        suite(
            "integration tests",
            &["test", "--tests", "-p", "platform", "-p", "firmware"],
        )?;
    }

    println!("{}", "  Running doc tests...".cyan());
    let doc_output = Command::new("cargo")
        .args(["test", "--doc", "--workspace"])
        .output()
        .context("Failed to run doc tests")?;

    if doc_output.status.success() {
        let summary = extract_test_summary(&String::from_utf8_lossy(&doc_output.stdout));
        println!("{}", format!("  ✓ Doc tests passed {summary}").green());
    } else {
        eprintln!("{}", "  ⚠ Doc tests failed".yellow().bold());
    }
    println!();

    println!(
        "{}",
        format!(
            "✓ All tests completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}

/// Summary of the last `test result:` line in `output`.
fn extract_test_summary(output: &str) -> String {
    output
        .lines()
        .filter_map(|line| line.split("test result:").nth(1))
        .last()
        .map_or_else(
            || "(summary not available)".to_string(),
            |summary| summary.trim().to_string(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_is_taken_from_result_line() {
        let out = "running 3 tests\n...\ntest result: ok. 3 passed; 0 failed\n";
        assert_eq!(extract_test_summary(out), "ok. 3 passed; 0 failed");
    }

    #[test]
    fn missing_summary_is_reported() {
        assert_eq!(extract_test_summary("no tests"), "(summary not available)");
    }
}
