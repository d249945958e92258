mod billing;
mod error;
mod extractor;
mod prompt;
mod report;
mod usage_data;

use crate::billing::{BillingInputs, DateRange, compute};
use crate::extractor::{EmptyRangePolicy, EnergyUnit, ExtractOptions, extract};
use crate::prompt::Prompter;
use crate::report::Labels;
use crate::usage_data::UsageTable;
use anyhow::{Context, bail};
use bigdecimal::BigDecimal;
use clap::{ArgAction, Args, Parser};
use jiff::civil::Date;
use std::io::{self, StdinLock, Stdout};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Splits a household electricity bill between two people.
/// The standing charge and general usage are shared evenly; whoever owns the monitored device
/// (a PC on a smart plug, say) also pays for everything that device used.
/// Any value not given on the command line is asked for interactively.
#[derive(Parser, Debug)]
#[command(version, long_about)]
struct BillSplitter {
    /// Unit rate, in currency per kWh (e.g. 0.28 for 28p/kWh).
    #[arg(short, long)]
    unit_rate: Option<BigDecimal>,
    /// Daily standing charge, in currency per day (e.g. 0.45 for 45p/day).
    #[arg(short, long)]
    standing_charge: Option<BigDecimal>,
    /// Total kWh used by the whole household over the billing period.
    #[arg(short, long)]
    total_kwh: Option<BigDecimal>,
    #[command(flatten)]
    period: PeriodArgs,
    #[command(flatten)]
    device: DeviceUsageArgs,
    #[command(flatten)]
    usage_file_options: UsageFileArgs,
    #[command(flatten)]
    labels: LabelArgs,
    /// Fail instead of asking when a value is missing.
    #[arg(long)]
    no_prompt: bool,
    /// Log more detail to stderr. Repeat for even more.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
struct PeriodArgs {
    /// Number of days in the billing period.
    #[arg(short = 'd', long, conflicts_with_all = ["start", "end"])]
    bill_days: Option<u32>,
    /// First day of the billing period (YYYY-MM-DD). The day count includes both ends.
    #[arg(long, requires = "end")]
    start: Option<Date>,
    /// Last day of the billing period (YYYY-MM-DD).
    #[arg(long, requires = "start")]
    end: Option<Date>,
}

#[derive(Args, Debug)]
#[group(multiple = false)]
struct DeviceUsageArgs {
    /// kWh used by the device over the billing period, e.g. as shown in the smart plug app.
    #[arg(long)]
    device_kwh: Option<BigDecimal>,
    /// CSV (or semicolon/tab separated) usage export from the smart plug app.
    /// Readings dated within --start..--end are summed.
    #[arg(long, requires_all = ["start", "end"])]
    usage_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct UsageFileArgs {
    /// Column holding the reading dates, if it can't be found automatically.
    #[arg(long, requires = "usage_file")]
    timestamp_column: Option<String>,
    /// Column holding the energy readings, if it can't be found automatically.
    #[arg(long, requires = "usage_file")]
    energy_column: Option<String>,
    /// Unit of the energy readings. Needed when the column name mentions neither kWh nor Wh.
    #[arg(long, value_enum, requires = "usage_file")]
    energy_unit: Option<EnergyUnit>,
    /// Field separator of the usage file. Guessed from the header line by default.
    #[arg(long, requires = "usage_file")]
    delimiter: Option<char>,
    /// Treat a usage file with no readings in the billing period as an error rather than zero.
    #[arg(long, requires = "usage_file")]
    fail_on_empty_range: bool,
}

#[derive(Args, Debug)]
struct LabelArgs {
    /// Name shown for the device owner.
    #[arg(long, default_value = "You")]
    owner: String,
    /// Name shown for the other person.
    #[arg(long, default_value = "Housemate")]
    other: String,
    /// Currency symbol for amounts.
    #[arg(long, default_value = "£")]
    currency: String,
}

type TerminalPrompter = Prompter<StdinLock<'static>, Stdout>;

fn main() -> anyhow::Result<()> {
    let args = BillSplitter::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(match args.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let mut prompter = (!args.no_prompt).then(|| Prompter::new(io::stdin().lock(), io::stdout()));
    let inputs = gather_inputs(&args, &mut prompter)?;
    tracing::debug!(?inputs, "computing split");
    let breakdown = compute(&inputs);

    let labels = Labels {
        owner: args.labels.owner,
        other: args.labels.other,
        currency: args.labels.currency,
    };
    println!();
    print!("{}", report::render(&breakdown, &labels));
    Ok(())
}

fn gather_inputs(
    args: &BillSplitter,
    prompter: &mut Option<TerminalPrompter>,
) -> anyhow::Result<BillingInputs> {
    let unit_rate = value_or_ask(
        args.unit_rate.clone(),
        prompter,
        "unit rate",
        "Electricity unit rate (e.g. 0.28 for 28p/kWh)",
        "a decimal number",
    )?;
    let standing_charge = value_or_ask(
        args.standing_charge.clone(),
        prompter,
        "standing charge",
        "Daily standing charge (e.g. 0.45 for 45p/day)",
        "a decimal number",
    )?;

    let range = match (args.period.start, args.period.end) {
        (Some(start), Some(end)) => Some(DateRange::new(start, end)?),
        _ => None,
    };
    let bill_days = match range {
        Some(range) => range.days(),
        None => value_or_ask(
            args.period.bill_days,
            prompter,
            "bill days",
            "Number of days in this billing period",
            "a whole number",
        )?,
    };

    let total_kwh = value_or_ask(
        args.total_kwh.clone(),
        prompter,
        "total usage",
        "TOTAL kWh usage for the household",
        "a decimal number",
    )?;

    let device_kwh = match (&args.device.device_kwh, &args.device.usage_file, range) {
        (Some(kwh), _, _) => kwh.clone(),
        (None, Some(path), Some(range)) => {
            device_usage_from_file(path, &range, &args.usage_file_options)?
        }
        (None, Some(_), None) => {
            bail!("--usage-file needs the billing period as --start and --end")
        }
        (None, None, _) => value_or_ask(
            None,
            prompter,
            "device usage",
            "Device kWh usage (from the smart plug app)",
            "a decimal number",
        )?,
    };

    Ok(BillingInputs::new(
        unit_rate,
        standing_charge,
        bill_days,
        total_kwh,
        device_kwh,
    )?)
}

fn device_usage_from_file(
    path: &Path,
    range: &DateRange,
    options: &UsageFileArgs,
) -> anyhow::Result<BigDecimal> {
    let delimiter = match options.delimiter {
        Some(c) if c.is_ascii() => Some(c as u8),
        Some(c) => bail!("Delimiter {c:?} must be a single ASCII character"),
        None => None,
    };
    let table = UsageTable::from_path(path, delimiter)?;
    eprintln!(
        "Found {} usage rows in {}",
        table.rows().len(),
        path.display()
    );
    let usage = extract(
        &table,
        range,
        &ExtractOptions {
            timestamp_column: options.timestamp_column.clone(),
            energy_column: options.energy_column.clone(),
            unit: options.energy_unit,
            empty_range: if options.fail_on_empty_range {
                EmptyRangePolicy::Error
            } else {
                EmptyRangePolicy::Zero
            },
            ..Default::default()
        },
    )
    .with_context(|| format!("Could not work out device usage from {}", path.display()))?;
    eprintln!(
        "Using {:?} for dates and {:?} ({}) for energy",
        usage.timestamp_column.name,
        usage.energy_column.name,
        match usage.unit {
            EnergyUnit::KilowattHours => "kWh",
            EnergyUnit::WattHours => "Wh",
        }
    );
    for (kind, flag, column) in [
        ("date", "--timestamp-column", &usage.timestamp_column),
        ("energy", "--energy-column", &usage.energy_column),
    ] {
        if !column.alternatives.is_empty() {
            eprintln!(
                "  other possible {kind} columns: {} (choose with {flag})",
                column.alternatives.join(", ")
            );
        }
    }
    eprintln!(
        "Device used {:.3} kWh across {} readings between {} and {}",
        usage.kwh,
        usage.rows_included,
        range.start(),
        range.end()
    );
    Ok(usage.kwh)
}

/// Uses the command line value if there is one, otherwise asks for it.
fn value_or_ask<T: FromStr>(
    value: Option<T>,
    prompter: &mut Option<TerminalPrompter>,
    field: &'static str,
    question: &str,
    expected: &'static str,
) -> anyhow::Result<T> {
    if let Some(value) = value {
        return Ok(value);
    }
    let Some(prompter) = prompter else {
        bail!("No {field} given, and prompting is disabled");
    };
    Ok(prompter.ask(field, question, expected)?)
}
