mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::loan::{AfterTaxArgs, LoanArgs, ScheduleArgs};

/// Amortization schedules for Danish mortgage-bond loans
#[derive(Parser)]
#[command(
    name = "rk",
    version,
    about = "Amortization schedules for Danish mortgage-bond loans",
    long_about = "Computes level-payment amortization schedules for fixed-rate \
                  realkredit loans with decimal precision: bond debt after the \
                  issuance price, periodic annuity, bidrag, totals and the \
                  borrower's yield to maturity."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Full period-by-period amortization schedule with summary
    Schedule(ScheduleArgs),
    /// Summary figures only (loan amount, totals, yield)
    Summary(LoanArgs),
    /// Schedule with interest and bidrag reduced by a tax deduction
    AfterTax(AfterTaxArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Schedule(args) => commands::loan::run_schedule(args),
        Commands::Summary(args) => commands::loan::run_summary(args),
        Commands::AfterTax(args) => commands::loan::run_after_tax(args),
        Commands::Version => {
            println!("rk {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
