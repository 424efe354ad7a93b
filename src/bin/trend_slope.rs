use clap::Parser;
use geo_yearly_export::core::trend::{append_slope_column, TrendOptions};
use geo_yearly_export::utils::logger;
use geo_yearly_export::YearRange;
use std::fs::File;
use std::io::{BufReader, BufWriter};

#[derive(Parser)]
#[command(name = "trend-slope")]
#[command(about = "Append the per-row linear trend of yearly columns to a CSV table")]
struct Args {
    /// Input CSV with one column per year
    #[arg(short, long)]
    input: String,

    /// Output CSV
    #[arg(short, long)]
    output: String,

    /// Yearly column prefix
    #[arg(long, default_value = "BA_")]
    prefix: String,

    #[arg(long, default_value_t = 2000)]
    start_year: i32,

    #[arg(long, default_value_t = 2024)]
    end_year: i32,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let options = TrendOptions {
        prefix: args.prefix.clone(),
        years: YearRange::new(args.start_year, args.end_year)?,
    };

    tracing::info!("📈 Computing {} from {}", options.slope_column(), args.input);

    let reader = BufReader::new(File::open(&args.input)?);
    let writer = BufWriter::new(File::create(&args.output)?);

    match append_slope_column(reader, writer, &options) {
        Ok(rows) => {
            tracing::info!("✅ Wrote {} rows to {}", rows, args.output);
            println!("Linear regression calculation completed, results saved to {}", args.output);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    }
}
