//! Offline verdicts for a captured bring-up console log.
//!
//! Applies the bench harness rules to the `Test:` / `Info:` / `CH=` lines:
//! fatal steps pass or fail on their own line, the DAC sweep and reference
//! rails are checked against an RC charge model of the sense front-end when
//! `Test:ADC, Finish` arrives, and the battery path is checked when
//! `Test:BATT, Finish` arrives. A log without `Test:DONE, Finish` fails.

use anyhow::{Context, Result};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::Path;

// ── Front-end model ──────────────────────────────────────────────────────────

/// Supply of the sense comparator.
pub const SUPPLY_V: f64 = 3.3;
/// Charge time constant in ADC counts.
pub const RC_COUNTS: f64 = 40558.0;
/// Counts elapsed before the ramp starts.
pub const RC_OFFSET: f64 = 200.0;
/// Input divider on every sensed node.
pub const DIVIDER: f64 = 2.0;
/// DAC codes per full scale.
pub const DAC_FULL_SCALE: f64 = 4096.0;

/// Voltage at the comparator after `raw` counts of charging.
pub fn charge_voltage(raw: f64) -> f64 {
    SUPPLY_V * (1.0 - (-(raw + RC_OFFSET) / RC_COUNTS).exp())
}

/// Voltage on a sensed node (before the divider).
pub fn node_voltage(raw: u32) -> f64 {
    charge_voltage(f64::from(raw)) * DIVIDER
}

/// DAC output voltage for `code`.
pub fn dac_voltage(code: u32) -> f64 {
    f64::from(code) * SUPPLY_V / DAC_FULL_SCALE
}

// ── Limits ───────────────────────────────────────────────────────────────────

/// DAC outputs swept.
pub const SWEEP_CHANNELS: u8 = 6;
/// Largest mean relative error of a swept channel.
pub const SWEEP_TOLERANCE: f64 = 0.2;
/// Largest relative error of a reference rail.
pub const RAIL_TOLERANCE: f64 = 0.25;
/// Nominal rail voltages.
pub const RAILS: [(&str, f64); 5] = [
    ("VREF", 3.3),
    ("3V3", 3.3),
    ("1V35", 1.35),
    ("2V5", 2.5),
    ("1V1", 1.1),
];
/// Battery samples averaged before the charger responds.
pub const BATTERY_BEFORE: std::ops::Range<usize> = 1..6;
/// Battery samples averaged after the charger responds.
pub const BATTERY_AFTER: std::ops::Range<usize> = 8..12;
/// Rise in counts that shows the charger engaged.
pub const CHARGE_RISE: f64 = 1000.0;

// ── Verdicts ─────────────────────────────────────────────────────────────────

/// Result of one check.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub check: String,
    pub passed: bool,
    pub detail: String,
}

impl Verdict {
    fn pass(check: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(check: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

#[derive(Default)]
struct Collector {
    sweep: Vec<(u8, u32, u32)>,
    rails: BTreeMap<String, u32>,
    battery: Vec<u32>,
    verdicts: Vec<Verdict>,
    done: bool,
}

impl Collector {
    fn line(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix("Test:") {
            self.test_line(rest);
        } else if let Some(rest) = line.strip_prefix("Info:") {
            self.info_line(rest);
        } else if let Some(row) = parse_sweep_row(line) {
            self.sweep.push(row);
        }
    }

    fn test_line(&mut self, rest: &str) {
        if let Some((name, status)) = rest.split_once('|') {
            if status == "Pass" {
                self.verdicts.push(Verdict::pass(name, "pass"));
            } else if let Some(reason) = status.strip_prefix("Fail") {
                self.verdicts
                    .push(Verdict::fail(name, reason.trim_start_matches(", ")));
            }
            return;
        }
        match rest.split_once(", ") {
            Some(("ADC", "Finish")) => {
                self.verdicts.extend(sweep_verdicts(&self.sweep));
                self.verdicts.extend(rail_verdicts(&self.rails));
            }
            Some(("BATT", "Finish")) => self.verdicts.push(battery_verdict(&self.battery)),
            Some(("DONE", "Finish")) => self.done = true,
            _ => {}
        }
    }

    fn info_line(&mut self, rest: &str) {
        let Some((key, value)) = rest.split_once('=') else {
            return;
        };
        if let Some(step) = key.strip_suffix("-ERROR") {
            self.verdicts.push(Verdict::fail(step, value));
        } else if key == "ADC-VBAT" {
            if let Ok(raw) = value.parse() {
                self.battery.push(raw);
            }
        } else if let Some(rail) = key.strip_prefix("ADC-") {
            if let Ok(raw) = value.parse() {
                self.rails.insert(rail.to_string(), raw);
            }
        }
    }
}

/// `CH=<i>, DAC=<v>, ADC=<r>`
fn parse_sweep_row(line: &str) -> Option<(u8, u32, u32)> {
    let mut fields = line.split(", ");
    let ch = fields.next()?.strip_prefix("CH=")?.parse().ok()?;
    let dac = fields.next()?.strip_prefix("DAC=")?.parse().ok()?;
    let adc = fields.next()?.strip_prefix("ADC=")?.parse().ok()?;
    Some((ch, dac, adc))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0u32), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / f64::from(n))
}

fn sweep_verdicts(rows: &[(u8, u32, u32)]) -> Vec<Verdict> {
    (0..SWEEP_CHANNELS)
        .map(|ch| {
            let check = format!("DAC-CH{ch}");
            let errors = rows.iter().filter(|(c, _, _)| *c == ch).filter_map(|&(_, dac, adc)| {
                let x = dac_voltage(dac);
                let y = node_voltage(adc);
                (x != 0.0 && y != 0.0).then(|| ((x - y) / y).abs())
            });
            match mean(errors) {
                None => Verdict::fail(check, "no samples"),
                Some(err) if err > SWEEP_TOLERANCE => {
                    Verdict::fail(check, format!("mean error {:.1}%", err * 100.0))
                }
                Some(err) => Verdict::pass(check, format!("mean error {:.1}%", err * 100.0)),
            }
        })
        .collect()
}

fn rail_verdicts(rails: &BTreeMap<String, u32>) -> Vec<Verdict> {
    RAILS
        .iter()
        .map(|&(name, nominal)| {
            let check = format!("ADC-{name}");
            let Some(&raw) = rails.get(name) else {
                return Verdict::fail(check, "not reported");
            };
            let v = node_voltage(raw);
            let err = (v - nominal) / nominal;
            let detail = format!("{v:.2} V ({:+.1}%)", err * 100.0);
            if err.abs() > RAIL_TOLERANCE {
                Verdict::fail(check, detail)
            } else {
                Verdict::pass(check, detail)
            }
        })
        .collect()
}

fn battery_verdict(samples: &[u32]) -> Verdict {
    let window = |range: std::ops::Range<usize>| {
        samples
            .get(range)
            .and_then(|s| mean(s.iter().map(|&v| f64::from(v))))
    };
    match (window(BATTERY_BEFORE), window(BATTERY_AFTER)) {
        (Some(before), Some(after)) => {
            let rise = after - before;
            let detail = format!("rise {rise:.0} counts");
            if rise > CHARGE_RISE {
                Verdict::pass("BATT-CHARGE", detail)
            } else {
                Verdict::fail("BATT-CHARGE", detail)
            }
        }
        _ => Verdict::fail("BATT-CHARGE", format!("only {} samples", samples.len())),
    }
}

/// Evaluate a console log.
pub fn judge(log: &str) -> Vec<Verdict> {
    let mut collector = Collector::default();
    for line in log.lines() {
        collector.line(line.trim());
    }
    let mut verdicts = collector.verdicts;
    if !collector.done {
        verdicts.push(Verdict::fail("DONE", "run did not complete"));
    }
    verdicts
}

pub fn run(log: &Path) -> Result<()> {
    let text = std::fs::read_to_string(log)
        .with_context(|| format!("Failed to read {}", log.display()))?;

    println!();
    println!(
        "{}",
        format!("⚖ Judging {}...", log.display()).cyan().bold()
    );
    println!();

    let verdicts = judge(&text);
    for v in &verdicts {
        if v.passed {
            println!("  {} {:<12} {}", "✓".green(), v.check, v.detail.dimmed());
        } else {
            println!("  {} {:<12} {}", "✗".red().bold(), v.check, v.detail);
        }
    }
    println!();

    let failed = verdicts.iter().filter(|v| !v.passed).count();
    if failed > 0 {
        eprintln!("{}", format!("✗ {failed} check(s) failed").red().bold());
        anyhow::bail!("{failed} check(s) failed");
    }
    println!(
        "{}",
        format!("✓ All {} checks passed", verdicts.len())
            .green()
            .bold()
    );
    Ok(())
}
