use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::Path;

use lubulu_core::{
    HistoryRecord, HistoryStats, PityCounter, Settings, SpinReceipt, SpinResult, SpinVerdict,
};

use crate::simulate::SimulationSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Colored, human readable output
    Console,
    /// Machine readable JSON
    Json,
}

/// Buffered report sink: the `--output` file when given, stdout otherwise.
///
/// # Errors
///
/// Fails when the output file cannot be created.
pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let Some(path) = path else {
        return Ok(Box::new(BufWriter::new(stdout())));
    };
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry<'a> {
    pub date: &'a str,
    #[serde(flatten)]
    pub record: &'a HistoryRecord,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView<'a> {
    #[serde(flatten)]
    pub stats: &'a HistoryStats,
    pub pity: &'a PityCounter,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditView<'a> {
    pub date: &'a str,
    pub result: Option<SpinResult>,
    pub consecutive_failures: u32,
}

fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("failed to encode report")?;
    writeln!(out)?;
    Ok(())
}

fn result_label(result: SpinResult) -> colored::ColoredString {
    match result {
        SpinResult::Success => "🎉 Lu".bright_green().bold(),
        SpinResult::Failure => "😐 not Lu".yellow(),
    }
}

pub fn write_spin<W: Write>(out: &mut W, format: ReportFormat, verdict: &SpinVerdict) -> Result<()> {
    if format == ReportFormat::Json {
        return write_json(out, verdict);
    }
    match verdict {
        SpinVerdict::Spun(receipt) => write_receipt(out, receipt)?,
        SpinVerdict::AlreadySpun(rejection) => {
            writeln!(
                out,
                "⏳ Already spun for {}. Come back tomorrow.",
                rejection.date.bold()
            )?;
            if let Some(cached) = &rejection.cached {
                writeln!(out, "   Today's result: {}", result_label(cached.result))?;
            }
        }
    }
    Ok(())
}

fn write_receipt<W: Write>(out: &mut W, receipt: &SpinReceipt) -> Result<()> {
    writeln!(
        out,
        "{} {} (slice {})",
        receipt.date.bold(),
        result_label(receipt.result),
        receipt.slice_index
    )?;
    if receipt.pity_triggered {
        writeln!(out, "   {}", "Pity kicked in: this Lu was guaranteed.".cyan())?;
    }
    if !receipt.persisted {
        writeln!(out, "   {}", "Extra spin: not recorded.".dimmed())?;
    }
    writeln!(
        out,
        "   Consecutive failures: {}",
        receipt.consecutive_failures
    )?;
    Ok(())
}

pub fn write_settings<W: Write>(out: &mut W, format: ReportFormat, settings: &Settings) -> Result<()> {
    if format == ReportFormat::Json {
        return write_json(out, settings);
    }
    writeln!(out, "{}", "⚙️  Settings".bright_cyan().bold())?;
    writeln!(out, "   Lu probability: {}%", settings.lu_probability)?;
    if settings.pity_days == 0 {
        writeln!(out, "   Pity: off")?;
    } else {
        writeln!(out, "   Pity: after {} failed days", settings.pity_days)?;
    }
    let mode = if settings.mode.is_multi() { "multi" } else { "single" };
    writeln!(out, "   Mode: {mode}")?;
    Ok(())
}

pub fn write_history<W: Write>(
    out: &mut W,
    format: ReportFormat,
    records: &[(String, HistoryRecord)],
) -> Result<()> {
    if format == ReportFormat::Json {
        let entries: Vec<HistoryEntry<'_>> = records
            .iter()
            .map(|(date, record)| HistoryEntry { date, record })
            .collect();
        return write_json(out, &entries);
    }
    if records.is_empty() {
        writeln!(out, "No spins recorded yet.")?;
        return Ok(());
    }
    for (date, record) in records {
        let pity = if record.pity_triggered { " (pity)" } else { "" };
        writeln!(out, "{date}  {}{pity}", result_label(record.result))?;
    }
    Ok(())
}

pub fn write_edit<W: Write>(out: &mut W, format: ReportFormat, view: &EditView<'_>) -> Result<()> {
    if format == ReportFormat::Json {
        return write_json(out, view);
    }
    match view.result {
        Some(result) => writeln!(out, "✏️  {} set to {}", view.date.bold(), result_label(result))?,
        None => writeln!(out, "🗑️  {} cleared", view.date.bold())?,
    }
    writeln!(out, "   Consecutive failures: {}", view.consecutive_failures)?;
    Ok(())
}

pub fn write_stats<W: Write>(out: &mut W, format: ReportFormat, view: &StatsView<'_>) -> Result<()> {
    if format == ReportFormat::Json {
        return write_json(out, view);
    }
    let stats = view.stats;
    writeln!(out, "{}", "📊 Statistics".bright_cyan().bold())?;
    writeln!(out, "{}", "=============".cyan())?;
    writeln!(out, "Days recorded: {}", stats.total)?;
    writeln!(out, "Lu: {}", stats.lu_count.to_string().green())?;
    writeln!(out, "Not Lu: {}", stats.no_lu_count.to_string().yellow())?;
    writeln!(out, "Forced by pity: {}", stats.pity_count)?;
    writeln!(out, "Restraint rate: {:.1}%", stats.restraint_rate)?;
    writeln!(
        out,
        "Current streak: {} / {}",
        view.pity.consecutive_failures(),
        view.pity.threshold()
    )?;
    Ok(())
}

pub fn write_simulation<W: Write>(
    out: &mut W,
    format: ReportFormat,
    summary: &SimulationSummary,
) -> Result<()> {
    if format == ReportFormat::Json {
        return write_json(out, summary);
    }
    writeln!(out, "{}", "🎲 Pity Simulation".bright_yellow().bold())?;
    writeln!(out, "{}", "-".repeat(30).yellow())?;
    writeln!(
        out,
        "Probability {}%, pity {} days, {} runs x {} days (seed {})",
        summary.lu_probability, summary.pity_days, summary.runs, summary.days, summary.seed
    )?;
    writeln!(out, "Spins: {}", summary.spins)?;
    writeln!(
        out,
        "Observed Lu rate: {:.2}%",
        summary.observed_lu_rate * 100.0
    )?;
    writeln!(out, "Forced share of Lu: {:.2}%", summary.forced_share * 100.0)?;
    writeln!(out, "Longest failure streak: {}", summary.longest_failure_streak)?;
    Ok(())
}
