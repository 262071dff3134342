// Entry point and high-level CLI flow.
//
// `run` rebuilds the staging table, the three dimensions and the fact table,
// then previews each table and writes `run_summary.json` next to the warehouse
// tables. `stage` stops after the staging table.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use star_etl::config::PipelineConfig;
use star_etl::output;
use star_etl::pipeline;
use star_etl::storage::CsvStore;
use star_etl::util::format_int;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Load cleaned statistics into a star schema", long_about = None)]
struct Cli {
    /// Pipeline configuration file
    #[arg(long, default_value = "etl.toml")]
    config: PathBuf,
    /// Override the storage root from the configuration
    #[arg(long)]
    root: Option<PathBuf>,
    /// Rows to preview per table (0 disables previews)
    #[arg(long, default_value_t = 3)]
    preview: usize,
    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild staging, dimensions and facts
    Run,
    /// Ingest, validate and coerce the cleaned sheets into the staging table only
    Stage,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let mut config = PipelineConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(root) = cli.root {
        config.storage.root = root;
    }
    let store = CsvStore::new(&config.storage.root);
    info!(root = %store.root().display(), "using table store");

    match cli.command.unwrap_or(Command::Run) {
        Command::Stage => {
            let masters = pipeline::load_masters(&store, &config).context("loading master data")?;
            let staged = pipeline::build_staging(&store, &config, &masters)
                .context("building staging table")?;
            println!(
                "Staging complete: {} source rows melted into {} long rows, {} staging rows.\n",
                format_int(staged.melt.wide_rows),
                format_int(staged.melt.long_rows),
                format_int(staged.rows.len())
            );
            output::preview_table("Staging", &staged.rows, cli.preview);
        }
        Command::Run => {
            let outcome = pipeline::run(&store, &config).context("running pipeline")?;
            let wh = &config.warehouse;

            output::preview_table(&wh.dim_year, &outcome.dim_year, cli.preview);
            output::preview_table(&wh.dim_location, &outcome.dim_location, cli.preview);
            output::preview_table(&wh.dim_indicator, &outcome.dim_indicator, cli.preview);
            output::preview_table(&wh.fact, &outcome.facts, cli.preview);

            let summary_path = store.location_dir(&wh.location).join("run_summary.json");
            output::write_json(&summary_path, &outcome.summary)
                .with_context(|| format!("writing {}", summary_path.display()))?;

            let s = &outcome.summary;
            println!(
                "Run complete: {} staging rows -> {} fact rows ({} dropped as unresolved).",
                format_int(s.staging_rows),
                format_int(s.fact_rows),
                format_int(s.unresolved.total())
            );
            println!("(Summary exported to {})", summary_path.display());
        }
    }

    Ok(())
}
