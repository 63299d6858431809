use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// Bare-metal target of the VexRiscv soft core.
pub const FIRMWARE_TARGET: &str = "riscv32i-unknown-none-elf";

/// Run one `cargo` invocation, failing the task if it fails.
fn required(label: &str, args: &[&str]) -> Result<()> {
    println!("{}", format!("  Checking {label}...").cyan());
    let start = Instant::now();

    let output = Command::new("cargo")
        .args(args)
        .output()
        .with_context(|| format!("Failed to check {label}"))?;

    if !output.status.success() {
        eprintln!("{}", format!("  ✗ {label} check failed").red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("{label} check failed");
    }

    println!(
        "{}",
        format!(
            "  ✓ {label} check passed in {:.2}s",
            start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();
    Ok(())
}

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking bring-up builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    // The BSP libraries are only needed to link, not to check.
    required(
        "firmware image (riscv32i)",
        &[
            "check",
            "-p",
            "firmware",
            "--target",
            FIRMWARE_TARGET,
            "--features",
            "hardware,defmt-logging",
        ],
    )?;

    required(
        "platform crate (no_std)",
        &[
            "check",
            "-p",
            "platform",
            "--target",
            FIRMWARE_TARGET,
            "--no-default-features",
        ],
    )?;

    required(
        "host build (std, tracing)",
        &["check", "-p", "firmware", "--features", "std,tracing"],
    )?;

    // Lints and formatting are advisory.
    println!("{}", "  Running clippy lints...".cyan());
    let clippy_start = Instant::now();

    let clippy_output = Command::new("cargo")
        .args(["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])
        .output()
        .context("Failed to run clippy")?;

    if clippy_output.status.success() {
        println!(
            "{}",
            format!(
                "  ✓ Clippy passed in {:.2}s",
                clippy_start.elapsed().as_secs_f64()
            )
            .green()
        );
    } else {
        eprintln!("{}", "  ⚠ Clippy warnings found".yellow().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&clippy_output.stderr));
    }
    println!();

    println!("{}", "  Checking code formatting...".cyan());

    let fmt_output = Command::new("cargo")
        .args(["fmt", "--all", "--check"])
        .output()
        .context("Failed to run cargo fmt")?;

    if fmt_output.status.success() {
        println!("{}", "  ✓ Formatting check passed".green());
    } else {
        eprintln!("{}", "  ⚠ Formatting issues found".yellow().bold());
        eprintln!("     Run 'cargo fmt --all' to fix");
    }
    println!();

    println!(
        "{}",
        format!(
            "✓ All checks completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
