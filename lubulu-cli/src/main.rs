mod ledger;
mod report;
mod simulate;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::io::Write;
use std::path::PathBuf;

use ledger::{LedgerFile, LedgerLock};
use lubulu_core::constants::DEFAULT_HISTORY_LIMIT;
use lubulu_core::{
    Clock, SecureRandom, SettingsPatch, SpinMode, SpinResult, SpinService, SystemClock,
};
use report::{EditView, ReportFormat, StatsView};
use simulate::{SimulationParams, run_simulation};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// One spin per day
    Single,
    /// Unlimited spins, only the first is recorded
    Multi,
}

impl From<ModeArg> for SpinMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => Self::Single,
            ModeArg::Multi => Self::Multi,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EditResult {
    Lu,
    NoLu,
    /// Remove the entry
    Clear,
}

impl EditResult {
    const fn to_result(self) -> Option<SpinResult> {
        match self {
            Self::Lu => Some(SpinResult::Success),
            Self::NoLu => Some(SpinResult::Failure),
            Self::Clear => None,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Spin today's wheel
    Spin {
        /// Date key to spin for (YYYY-MM-DD); defaults to the local date
        #[arg(long)]
        date: Option<String>,
    },
    /// Show or change settings
    Settings {
        /// Lu probability in percent (1-98)
        #[arg(long, allow_negative_numbers = true)]
        probability: Option<i64>,
        /// Failed days before a Lu is guaranteed (0 disables pity)
        #[arg(long, allow_negative_numbers = true)]
        pity_days: Option<i64>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// List recorded days, newest first
    History {
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },
    /// Override or clear the recorded result for a day
    Edit {
        #[arg(long)]
        date: String,
        #[arg(long, value_enum)]
        result: EditResult,
        /// Date key treated as today when rebuilding the pity streak
        #[arg(long)]
        today: Option<String>,
    },
    /// Summarize the ledger
    Stats,
    /// Simulate many users to see how pity shapes the outcome
    Simulate {
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        probability: i64,
        #[arg(long, default_value_t = 7, allow_negative_numbers = true)]
        pity_days: i64,
        #[arg(long, default_value_t = 365)]
        days: u32,
        #[arg(long, default_value_t = 1337)]
        seed: u64,
        #[arg(long, default_value_t = 100)]
        runs: u32,
    },
}

#[derive(Debug, Parser)]
#[command(name = "lubulu", version)]
#[command(about = "Daily Lu roulette with a pity counter")]
struct Args {
    /// Ledger file holding settings and history
    #[arg(long, global = true, default_value = "lubulu.json")]
    store: PathBuf,

    /// Local user whose ledger to use
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// Output report format
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.report == ReportFormat::Console {
        announce_banner();
    }

    let mut out = report::open_output(args.output.as_deref())?;
    run(&args, &mut out)?;
    out.flush()?;
    Ok(())
}

fn announce_banner() {
    println!("{}", "🎡 Lubulu Daily Roulette".bright_cyan().bold());
    println!("{}", "========================".cyan());
}

fn run(args: &Args, out: &mut impl Write) -> Result<()> {
    if let Command::Simulate {
        probability,
        pity_days,
        days,
        seed,
        runs,
    } = args.command
    {
        let params = SimulationParams {
            lu_probability: probability,
            pity_days,
            days,
            seed,
            runs,
        };
        let summary = run_simulation(&params).context("simulation failed")?;
        return report::write_simulation(out, args.report, &summary);
    }

    // Held until the ledger is written back so concurrent runs queue up.
    let _lock = LedgerLock::acquire(&args.store)?;
    let mut ledger = LedgerFile::load(&args.store)?;
    let changed = run_against_ledger(args, &mut ledger, out)?;
    if changed {
        ledger.save(&args.store)?;
    }
    Ok(())
}

/// Execute a ledger command; returns whether the ledger needs saving.
fn run_against_ledger(
    args: &Args,
    ledger: &mut LedgerFile,
    out: &mut impl Write,
) -> Result<bool> {
    let clock = SystemClock;
    let user = ledger.user_mut(&args.user);
    let mut service = SpinService::new(
        &mut user.profile,
        &mut user.history,
        SecureRandom::new(),
        clock,
    )
    .with_context(|| format!("failed to open ledger for {}", args.user))?;

    match &args.command {
        Command::Spin { date } => {
            let today = date.clone().unwrap_or_else(|| clock.today());
            let verdict = service.spin(&today)?;
            report::write_spin(out, args.report, &verdict)?;
            Ok(true)
        }
        Command::Settings {
            probability,
            pity_days,
            mode,
        } => {
            let patch = SettingsPatch {
                lu_probability: *probability,
                pity_days: *pity_days,
                mode: mode.map(SpinMode::from),
                ..SettingsPatch::default()
            };
            let changed = !patch.is_empty();
            if changed {
                service.update_settings(&patch)?;
            }
            report::write_settings(out, args.report, service.settings())?;
            Ok(changed)
        }
        Command::History { limit } => {
            let records = service.history(Some(*limit))?;
            report::write_history(out, args.report, &records)?;
            Ok(false)
        }
        Command::Edit {
            date,
            result,
            today,
        } => {
            let today = today.clone().unwrap_or_else(|| clock.today());
            let result = result.to_result();
            let consecutive_failures = service.edit_history(date, result, &today)?;
            let view = EditView {
                date,
                result,
                consecutive_failures,
            };
            report::write_edit(out, args.report, &view)?;
            Ok(true)
        }
        Command::Stats => {
            let stats = service.stats()?;
            let view = StatsView {
                stats: &stats,
                pity: service.pity(),
            };
            report::write_stats(out, args.report, &view)?;
            Ok(false)
        }
        // Handled before the ledger is opened.
        Command::Simulate { .. } => Ok(false),
    }
}
