use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ingest::SourceFile;
use std::fs::File;
use std::path::PathBuf;
use time::OffsetDateTime;
use tracing::{debug, info};

mod config;
mod logging;
mod pipeline;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json }

#[derive(Debug, Parser)]
#[command(name = "cortex-unify", version, about = "Unify Cortex XDR endpoint exports into one deduplicated workbook")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./cortex-unify.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Merge, deduplicate and summarize exports into one .xlsx report
    Process {
        /// Exported .xlsx files (first worksheet of each is read)
        files: Vec<PathBuf>,
        /// Column identifying an endpoint; repeat for a composite key (default: endpoint_name, endpoint_alias)
        #[arg(long = "dedup-key", value_name = "COLUMN")]
        dedup_key: Vec<String>,
        /// Directory for the generated workbook (default: current directory)
        #[arg(long, value_name = "DIR", conflicts_with = "out")]
        out_dir: Option<PathBuf>,
        /// Exact workbook path instead of the timestamped name
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Also write the clean base as CSV next to the workbook
        #[arg(long, default_value_t = false)]
        csv: bool,
        /// Rows sampled per sheet when sizing columns
        #[arg(long)]
        sample_for_width: Option<usize>,
        /// Summary format on stdout
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show detected header row, columns and row count per file (JSON lines)
    Inspect { files: Vec<PathBuf> },
}

fn read_sources(files: &[PathBuf]) -> Result<Vec<SourceFile>> {
    files
        .iter()
        .map(|p| SourceFile::read(p).with_context(|| format!("reading {}", p.display())))
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);
    let loaded_cfg = config::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Version => {
            println!(
                "cortex-unify {} (core {})",
                env!("CARGO_PKG_VERSION"),
                unify_core::version()
            );
        }
        Commands::Process { files, dedup_key, out_dir, out, csv, sample_for_width, format } => {
            let settings = config::Settings::resolve(
                loaded_cfg.as_ref(),
                config::Overrides { dedup_keys: dedup_key, out_dir, sample_for_width, csv },
            );
            debug!(keys = ?settings.dedup_keys.as_slice(), out_dir = %settings.out_dir.display(), "settings resolved");

            let sources = read_sources(&files)?;
            let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
            let mut output = pipeline::run(&sources, &settings.dedup_keys, &settings.export, now)?;

            let path = out.unwrap_or_else(|| settings.out_dir.join(report_xlsx::suggested_file_name(now)));
            std::fs::write(&path, &output.workbook)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), bytes = output.workbook.len(), mime = report_xlsx::XLSX_MIME, "workbook saved");
            output.summary.output = Some(path.display().to_string());

            if settings.csv {
                let csv_path = path.with_extension("csv");
                let fh = File::create(&csv_path)
                    .with_context(|| format!("creating {}", csv_path.display()))?;
                pipeline::write_csv(&output.base_clean, fh)?;
                output.summary.csv = Some(csv_path.display().to_string());
            }

            match format {
                OutputFormat::Text => println!("{}", output.summary.to_text()),
                OutputFormat::Json => println!("{}", serde_json::to_string(&output.summary)?),
            }
        }
        Commands::Inspect { files } => {
            for p in files {
                let result = SourceFile::read(&p)
                    .map_err(anyhow::Error::from)
                    .and_then(|src| pipeline::ingest(std::slice::from_ref(&src)));
                match result {
                    Ok(ingested) => {
                        for s in ingested.sources {
                            println!("{}", serde_json::to_string(&s)?);
                        }
                    }
                    Err(e) => {
                        let obj = serde_json::json!({ "file": p.to_string_lossy(), "error": format!("{e:#}") });
                        println!("{}", serde_json::to_string(&obj)?);
                    }
                }
            }
        }
    }
    Ok(())
}
