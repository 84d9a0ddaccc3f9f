//! Reestr CLI - prepare SIM registry files
//!
//! # Commands
//!
//! ```bash
//! reestr process sims.xlsx --id-column ICCID --phone-column Phone \
//!     --step id:strip-non-digits --step id:append-check-digit --step prefix-plus-seven
//! reestr inspect sims.csv           # Show detected format and first rows
//! reestr checksum 8970101234567     # Print the Luhn check digit
//! reestr operations                 # Show available operations
//! reestr serve                      # Start HTTP server (port 3000)
//! ```

use clap::{Parser, Subcommand};
use reestr::transform::format_delimiter;
use reestr::{
    compute_check_digit, is_luhn_valid, operations_description, parse_file, process_file,
    OutputEncoding, ProcessOptions, ServerConfig, Step, Table,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "reestr")]
#[command(about = "Prepare ID/phone registry files from CSV and XLSX uploads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: parse, select columns, apply steps, write registry
    Process {
        /// Input CSV or XLSX file
        input: PathBuf,

        /// Column holding the identifiers
        #[arg(long)]
        id_column: String,

        /// Column holding the phone numbers
        #[arg(long)]
        phone_column: String,

        /// Step to apply, `target:operation` or `operation` (repeatable)
        #[arg(short, long = "step")]
        steps: Vec<Step>,

        /// Output file (default: generated name in the current directory)
        #[arg(short, long, conflicts_with = "output_dir")]
        output: Option<PathBuf>,

        /// Directory for the generated file name
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Output charset: windows-1251 or utf-8
        #[arg(short, long)]
        encoding: Option<OutputEncoding>,

        /// Number of result rows to show
        #[arg(long, default_value = "10")]
        preview: usize,
    },

    /// Show detected format, columns and first rows of a file
    Inspect {
        /// Input CSV or XLSX file
        input: PathBuf,

        /// Number of rows to show
        #[arg(short, long, default_value = "2")]
        rows: usize,
    },

    /// Compute or verify a Luhn check digit
    Checksum {
        /// Digit string
        digits: String,

        /// Check that the last digit is a valid check digit instead
        #[arg(long)]
        verify: bool,
    },

    /// Show available operations
    Operations,

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: REESTR_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Process {
            input,
            id_column,
            phone_column,
            steps,
            output,
            output_dir,
            encoding,
            preview,
        } => {
            let encoding = encoding.unwrap_or_else(|| ServerConfig::from_env().output_encoding);
            let options = ProcessOptions::new(id_column, phone_column)
                .with_steps(steps)
                .with_encoding(encoding);
            cmd_process(
                &input,
                &options,
                output.as_deref(),
                output_dir.as_deref(),
                preview,
            )
        }

        Commands::Inspect { input, rows } => cmd_inspect(&input, rows),

        Commands::Checksum { digits, verify } => cmd_checksum(&digits, verify),

        Commands::Operations => cmd_operations(),

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_process(
    input: &Path,
    options: &ProcessOptions,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    preview: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let result = process_file(input, options)?;
    let registry = &result.registry;

    let path = match (output, output_dir) {
        (Some(p), _) => p.to_path_buf(),
        (None, Some(dir)) => dir.join(&registry.file_name),
        (None, None) => PathBuf::from(&registry.file_name),
    };

    if preview > 0 {
        eprintln!("\n📊 Result (first {} rows):", preview.min(registry.row_count()));
        print_table(&registry.table.head(preview));
    }

    fs::write(&path, &registry.content)?;
    eprintln!("\n💾 Registry written to: {}", path.display());
    eprintln!("   Rows:     {}", registry.row_count());
    eprintln!("   Encoding: {}", registry.encoding);
    if !result.steps.is_empty() {
        let steps: Vec<String> = result.steps.iter().map(Step::to_string).collect();
        eprintln!("   Steps:    {}", steps.join(", "));
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_inspect(input: &Path, rows: usize) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🔍 Inspecting: {}", input.display());

    let parsed = parse_file(input)?;
    eprintln!("   Format:    {}", parsed.format.as_str());
    if let Some(ref enc) = parsed.encoding {
        eprintln!("   Encoding:  {}", enc);
    }
    if let Some(d) = parsed.delimiter {
        eprintln!("   Delimiter: '{}'", format_delimiter(d));
    }
    eprintln!("   Rows:      {}", parsed.table.len());
    eprintln!("   Columns:   {}", parsed.table.columns().join(", "));
    eprintln!();

    print_table(&parsed.table.head(rows));
    Ok(())
}

fn cmd_checksum(digits: &str, verify: bool) -> Result<(), Box<dyn std::error::Error>> {
    if verify {
        let valid = is_luhn_valid(digits)?;
        println!("{}", if valid { "valid" } else { "invalid" });
    } else {
        println!("{}", compute_check_digit(digits)?);
    }
    Ok(())
}

fn cmd_operations() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", operations_description());
    Ok(())
}

async fn cmd_serve(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ServerConfig::from_env();
    if let Some(port) = port {
        config = config.with_port(port);
    }
    reestr::server::start_server(config).await
}

/// Print a table as `|`-separated lines on stdout
fn print_table(table: &Table) {
    println!("{}", table.columns().join(" | "));
    for row in table.raw_rows() {
        println!("{}", row.join(" | "));
    }
}
