//! # Kiosco Register Command Line
//!
//! Drives the register from a terminal or a script.
//!
//! ## Usage
//! ```bash
//! kiosco-register status
//! kiosco-register open Marta 1000
//! kiosco-register open Marta 0 --yes          # no opening cash
//! kiosco-register withdraw 500 Depósito banco
//! kiosco-register expense 120 Limpieza lavandina y trapos
//! kiosco-register close --yes
//! kiosco-register closures
//! kiosco-register export-transactions arqueo.csv
//! kiosco-register export-closures cierres.csv
//! kiosco-register import-legacy backup.json
//! ```
//!
//! Exit code 0 on success, 1 on a register error, 2 on bad usage.

use std::env;
use std::process::ExitCode;

use kiosco_core::closure::{average_per_sale, duration_hours, ClosureFilter, ClosureSort};
use kiosco_core::Money;
use kiosco_register::{init_tracing, Register, RegisterConfig, RegisterError};

const USAGE: &str = "\
Usage: kiosco-register <COMMAND>

Commands:
  status                           Storage backend and active shift totals
  open <admin> <amount> [--yes]    Open a shift (--yes to confirm zero cash)
  withdraw <amount> <note...>      Take cash out of the drawer
  expense <amount> <concept> [detail...]
                                   Pay an expense from the drawer
  close --yes                      Close the active shift (irreversible)
  closures                         List closed shifts, newest first
  export-transactions <path>       Write the active shift's CSV
  export-closures <path>           Write the closure history CSV
  import-legacy <path>             Import a JSON backup of the old register";

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        println!("{USAGE}");
        return ExitCode::from(2);
    };
    if matches!(command, "--help" | "-h" | "help") {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    let config = match RegisterConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {}", RegisterError::from(e));
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_filter.as_deref());

    match run(&config, command, &args[1..]).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(message)) => {
            eprintln!("{message}");
            eprintln!();
            eprintln!("{USAGE}");
            ExitCode::from(2)
        }
        Err(CliError::Register(e)) => {
            eprintln!("✗ {e}");
            ExitCode::FAILURE
        }
    }
}

enum CliError {
    Usage(String),
    Register(RegisterError),
}

impl From<RegisterError> for CliError {
    fn from(err: RegisterError) -> Self {
        CliError::Register(err)
    }
}

fn amount(raw: Option<&String>) -> Result<Money, CliError> {
    let raw = raw.ok_or_else(|| CliError::Usage("missing amount".to_string()))?;
    raw.parse::<Money>()
        .map_err(|e| CliError::Register(RegisterError::validation(e.to_string())))
}

fn path(raw: Option<&String>) -> Result<&str, CliError> {
    raw.map(String::as_str)
        .ok_or_else(|| CliError::Usage("missing file path".to_string()))
}

async fn write_file(path: &str, contents: String) -> Result<(), CliError> {
    tokio::fs::write(path, contents).await.map_err(|e| {
        CliError::Register(RegisterError::internal(format!("cannot write {path}: {e}")))
    })
}

async fn run(config: &RegisterConfig, command: &str, args: &[String]) -> Result<(), CliError> {
    let confirmed = args.iter().any(|a| a == "--yes" || a == "-y");
    let words: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

    let register = Register::open(config).await?;

    match command {
        "status" => {
            let backend = register.storage_backend();
            println!("{}", register.store_name());
            println!("Storage: {} ({})", backend.label, backend.path.display());
            match register.get_active_shift().await? {
                Some(ledger) => {
                    let totals = ledger.totals();
                    println!();
                    println!("Active shift: {} since {}", ledger.shift.admin_name, ledger.shift.started_at);
                    println!("  Sales:          {}", ledger.sales_count());
                    println!("  Efectivo:       {}", totals.cash);
                    println!("  Transferencia:  {}", totals.transfer);
                    println!("  Expensa:        {}", totals.account_credit);
                    println!("  General:        {}", totals.general);
                }
                None => println!("No active shift"),
            }
        }
        "open" => {
            let admin = words
                .first()
                .ok_or_else(|| CliError::Usage("missing administrator name".to_string()))?;
            let cash = amount(words.get(1).copied())?;
            let ledger = register.open_shift(admin, cash, confirmed).await?;
            println!("✓ Shift opened for {} with {}", ledger.shift.admin_name, cash);
        }
        "withdraw" => {
            let cash = amount(words.first().copied())?;
            let note = words[1..].iter().map(|w| w.as_str()).collect::<Vec<_>>().join(" ");
            let w = register.record_withdrawal(cash, &note).await?;
            println!("✓ {} {} ({})", w.withdrawal_id, w.amount, w.receipt_number);
        }
        "expense" => {
            let cash = amount(words.first().copied())?;
            let concept = words.get(1).map(|w| w.as_str()).unwrap_or_default();
            let detail = words
                .iter()
                .skip(2)
                .map(|w| w.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let e = register.record_expense(cash, concept, &detail).await?;
            println!("✓ Expense {} {} ({})", e.concept, e.amount, e.receipt_number);
        }
        "close" => {
            let closure = register.close_shift(confirmed).await?;
            println!("✓ Shift of {} closed", closure.admin_name);
            println!("  Sales:          {}", closure.sales_count);
            println!("  Efectivo:       {}", closure.totals.cash);
            println!("  Transferencia:  {}", closure.totals.transfer);
            println!("  Expensa:        {}", closure.totals.account_credit);
            println!("  General:        {}", closure.totals.general);
        }
        "closures" => {
            let closures = register
                .list_closures(&ClosureFilter::default(), ClosureSort::default())
                .await?;
            if closures.is_empty() {
                println!("No closures yet");
            }
            for c in &closures {
                println!(
                    "{}  {:<20} {:>6.2} h  {:>4} sales  {:>14}  avg {}",
                    c.ended_at.format("%Y-%m-%d %H:%M"),
                    c.admin_name,
                    duration_hours(c),
                    c.sales_count,
                    c.totals.general.to_string(),
                    average_per_sale(c),
                );
            }
            let summary = register.closure_summary(&ClosureFilter::default()).await?;
            println!();
            println!("{} closures, {} sales, {} in total", summary.closures, summary.sales_count, summary.general);
        }
        "export-transactions" => {
            let target = path(words.first().copied())?;
            let ledger = register
                .get_active_shift()
                .await?
                .ok_or_else(|| RegisterError::from(kiosco_core::CoreError::NoActiveShift))?;
            let csv = register.export_transactions_csv(&ledger.shift.id).await?;
            write_file(target, csv).await?;
            println!("✓ Wrote {target}");
        }
        "export-closures" => {
            let target = path(words.first().copied())?;
            let csv = register
                .export_closures_csv(&ClosureFilter::default(), ClosureSort::default())
                .await?;
            write_file(target, csv).await?;
            println!("✓ Wrote {target}");
        }
        "import-legacy" => {
            let source = path(words.first().copied())?;
            let json = tokio::fs::read_to_string(source).await.map_err(|e| {
                CliError::Register(RegisterError::validation(format!("cannot read {source}: {e}")))
            })?;
            let report = register.import_legacy_json(&json).await?;
            println!("✓ Imported legacy data");
            println!("  Shifts:       {}", report.shifts);
            println!("  Sales:        {}", report.sales);
            println!("  Withdrawals:  {}", report.withdrawals);
            println!("  Expenses:     {}", report.expenses);
            println!("  Closures:     {}", report.closures);
            if report.skipped > 0 {
                println!("⚠ {} records skipped (see log)", report.skipped);
            }
        }
        other => return Err(CliError::Usage(format!("unknown command '{other}'"))),
    }

    Ok(())
}
