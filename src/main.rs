//! CLI entry point for `olmshell`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use olmshell::extract::{self, ExtractOptions};
use olmshell::model::result::ExtractionResult;

#[derive(Parser)]
#[command(
    name = "olmshell",
    version,
    about = "Convert Outlook for Mac (.olm) archives into plain message files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every message of an OLM archive into a message file
    Convert {
        /// OLM archive to read
        olm: PathBuf,
        /// Directory for the message files (created if missing)
        output: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
        /// Keep the extracted archive on disk
        #[arg(long)]
        keep_scratch: bool,
        /// Worker threads for record parsing (0 = one per CPU)
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
    },
    /// List the message records of an OLM archive
    List {
        olm: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Write a CSV manifest of a directory of message files
    Csv {
        dir: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = olmshell::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let mut options = ExtractOptions::from(&config.extract);

    match cli.command {
        Commands::Convert {
            olm,
            output,
            json,
            keep_scratch,
            workers,
        } => {
            options.keep_scratch |= keep_scratch;
            if let Some(n) = workers {
                options.workers = n;
            }
            cmd_convert(&olm, &output, &options, json)
        }
        Commands::List { olm, json } => cmd_list(&olm, &options, json),
        Commands::Csv { dir, output } => cmd_csv(&dir, &output),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &olmshell::config::Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = olmshell::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "olmshell.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "olmshell", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Convert an OLM archive and print a summary.
fn cmd_convert(
    olm: &Path,
    output: &Path,
    options: &ExtractOptions,
    json: bool,
) -> anyhow::Result<()> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Converting [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    if json {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let start = Instant::now();
    let result = extract::run(
        olm,
        output,
        options,
        Some(&|current, total| {
            pb.set_length(total as u64);
            pb.set_position(current as u64);
        }),
    )?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    if json {
        print_summary_json(olm, output, &result, elapsed)?;
    } else {
        print_summary_table(olm, output, &result, elapsed);
    }

    Ok(())
}

/// Print the record paths of an OLM archive.
fn cmd_list(olm: &Path, options: &ExtractOptions, json: bool) -> anyhow::Result<()> {
    let records = extract::list_records(olm, options)?;

    if json {
        let paths: Vec<String> = records
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        println!("{}", serde_json::to_string_pretty(&paths)?);
    } else if records.is_empty() {
        println!("No message records found.");
    } else {
        for path in &records {
            println!("{}", path.display());
        }
        println!();
        println!("{} record(s)", records.len());
    }
    Ok(())
}

/// Write a CSV manifest for a directory of message files.
fn cmd_csv(dir: &Path, output: &Path) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }
    let rows = olmshell::export::csv::export_csv(dir, output)?;
    println!("Wrote {rows} row(s) to {}", output.display());
    Ok(())
}

fn print_summary_table(
    olm: &Path,
    output: &Path,
    result: &ExtractionResult,
    elapsed: std::time::Duration,
) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Archive", olm.display());
    if result.is_empty() {
        println!("  {:<20} none", "Records found");
        println!();
        return;
    }
    println!("  {:<20} {}", "Output", output.display());
    println!("  {:<20} {}", "Records found", result.located);
    println!("  {:<20} {}", "Messages written", result.emitted);
    if result.heuristic > 0 {
        println!("  {:<20} {}", "Recovered (fallback)", result.heuristic);
    }
    println!(
        "  {:<20} {}",
        "Bytes written",
        format_size(result.bytes_written, BINARY)
    );
    println!("  {:<20} {:.2?}", "Time", elapsed);

    if !result.failures.is_empty() {
        println!();
        println!("  Failed records ({}):", result.failures.len());
        for failure in &result.failures {
            println!("    {}  {}", failure.path.display(), failure.reason);
        }
    }
    println!();
}

/// Print the conversion summary as JSON.
fn print_summary_json(
    olm: &Path,
    output: &Path,
    result: &ExtractionResult,
    elapsed: std::time::Duration,
) -> anyhow::Result<()> {
    let summary = serde_json::json!({
        "archive": olm.to_string_lossy(),
        "output": output.to_string_lossy(),
        "located": result.located,
        "emitted": result.emitted,
        "heuristic": result.heuristic,
        "bytes_written": result.bytes_written,
        "elapsed_ms": elapsed.as_millis(),
        "failures": result.failures,
    });

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
