use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use leadscrape::config::AppConfig;
use leadscrape::core::queries;
use leadscrape::core::shutdown::ShutdownSignal;
use leadscrape::core::{LeadScraper, SingleRunReport};
use leadscrape::export::ExportFormat;
use leadscrape::logging::init_logging;
use leadscrape::model::{Query, SourceSelection};
use leadscrape::utils;

#[derive(Parser)]
#[command(name = "leadscrape")]
#[command(about = "Extract business leads from Google Maps and Yelp listings")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    verbose: bool,

    #[arg(short, long, global = true, help = "Configuration file path")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single search query
    Run {
        #[arg(short, long, help = "Business type or keyword to search for")]
        keyword: String,

        #[arg(short, long, help = "Location to search in")]
        location: String,

        #[arg(short, long, value_enum, default_value_t = SourceArg::Both, help = "Sources to scrape")]
        source: SourceArg,

        #[arg(short = 'n', long, help = "Maximum results per source")]
        max_results: Option<usize>,

        #[arg(short = 'f', long, value_enum, help = "Output format")]
        output_format: Option<OutputFormat>,

        #[arg(short, long, help = "Output directory")]
        output_dir: Option<PathBuf>,
    },

    /// Run every query of a CSV batch file
    Batch {
        #[arg(short, long, help = "CSV file with keyword,location[,source,max_results] columns")]
        queries_file: PathBuf,

        #[arg(short, long, help = "Output directory")]
        output_dir: Option<PathBuf>,

        #[arg(short, long, value_enum, help = "Output format")]
        format: Option<OutputFormat>,

        #[arg(short = 'n', long, help = "Default maximum results per source")]
        max_results: Option<usize>,

        #[arg(short, long, help = "Queries processed concurrently")]
        workers: Option<usize>,
    },

    /// Prompt for queries until an empty keyword is entered
    Interactive {
        #[arg(short, long, help = "Output directory")]
        output_dir: Option<PathBuf>,

        #[arg(short = 'f', long, value_enum, help = "Output format")]
        output_format: Option<OutputFormat>,
    },

    /// Write an example batch file
    Sample {
        #[arg(short, long, default_value = "sample_queries.csv", help = "Where to write the file")]
        path: PathBuf,
    },
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum OutputFormat {
    Csv,
    Json,
    Both,
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum SourceArg {
    Google,
    Yelp,
    Both,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        AppConfig::load_from_file(config_path).await?
    } else {
        AppConfig::load().await?
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    init_logging(&config.logging)?;
    info!("leadscrape v{}", env!("CARGO_PKG_VERSION"));

    if let Commands::Sample { path } = &cli.command {
        let count = queries::write_sample_queries(path)?;
        println!("Sample queries file created: {} ({} queries)", path.display(), count);
        return Ok(());
    }

    let shutdown = ShutdownSignal::new();
    shutdown.install_ctrl_c_handler();
    let app = LeadScraper::new(config, shutdown)
        .await
        .context("Failed to initialize browsing backend")?;

    match cli.command {
        Commands::Run {
            keyword,
            location,
            source,
            max_results,
            output_format,
            output_dir,
        } => {
            let max_results = max_results.unwrap_or(app.config().scraping.max_results);
            let query = Query::new(keyword, location, convert_source(source), max_results)?;
            let format = output_format.map(convert_format).unwrap_or(app.config().export.default_format);
            let output_dir = output_dir.unwrap_or_else(|| app.config().export.output_directory.clone());

            let report = app.run_single(&query, format, &output_dir).await?;
            print_single(&report);
        }
        Commands::Batch {
            queries_file,
            output_dir,
            format,
            max_results,
            workers,
        } => {
            let format = format.map(convert_format).unwrap_or(app.config().export.default_format);
            let output_dir = output_dir.unwrap_or_else(|| app.config().export.batch_output_directory.clone());
            let max_results = max_results.unwrap_or(app.config().scraping.max_results);

            let (report, written) = app
                .run_batch(&queries_file, format, &output_dir, max_results, workers)
                .await?;

            println!("Batch processing completed!");
            println!("Processed queries: {}/{}", report.results.len(), report.queries_total);
            println!("Successful queries: {}", report.successful());
            println!("Total leads: {}", report.total_leads());
            for file in &written.files {
                println!("  {} ({})", file.path.display(), utils::format_file_size(file.file_size_bytes));
            }
            if written.failures > 0 {
                println!("{} export(s) failed, see log for details", written.failures);
            }
        }
        Commands::Interactive {
            output_dir,
            output_format,
        } => {
            let format = output_format.map(convert_format).unwrap_or(app.config().export.default_format);
            let output_dir = output_dir.unwrap_or_else(|| app.config().export.output_directory.clone());
            run_interactive(&app, format, output_dir).await?;
        }
        Commands::Sample { .. } => {}
    }

    info!("leadscrape shutting down");
    Ok(())
}

async fn run_interactive(app: &LeadScraper, format: ExportFormat, output_dir: PathBuf) -> Result<()> {
    println!("Business lead scraper - interactive mode");
    let mut input = std::io::stdin().lock();
    let completed = app
        .run_interactive(&mut input, &mut std::io::stdout(), format, &output_dir)
        .await?;
    println!("Goodbye! {} queries completed", completed);
    Ok(())
}

fn print_single(report: &SingleRunReport) {
    println!("Found {} unique leads for {}", report.leads.len(), report.query);
    for (source, count) in &report.per_source {
        println!("  {}: {}", source, count);
    }
    for file in &report.files {
        println!("Saved {} ({})", file.path.display(), utils::format_file_size(file.file_size_bytes));
    }
}

fn convert_format(format: OutputFormat) -> ExportFormat {
    match format {
        OutputFormat::Csv => ExportFormat::Csv,
        OutputFormat::Json => ExportFormat::Json,
        OutputFormat::Both => ExportFormat::Both,
    }
}

fn convert_source(source: SourceArg) -> SourceSelection {
    match source {
        SourceArg::Google => SourceSelection::Google,
        SourceArg::Yelp => SourceSelection::Yelp,
        SourceArg::Both => SourceSelection::Both,
    }
}
