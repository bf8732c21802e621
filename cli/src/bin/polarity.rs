use clap::{Parser, Subcommand};
use cli::{AnalysisJob, ImageEntry};
use color_eyre::eyre::{eyre, Result};
use polarity::{GrayscaleImage, ImageReport, JsonResultSink, Pipeline, ResultSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify cells in every image of a job file
    Analyze {
        /// Path to the TOML or JSON job file
        #[arg(short, long)]
        config: PathBuf,
        /// Results document path (overrides the job file)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory for per-image GeoJSON (overrides the job file)
        #[arg(long)]
        geojson_dir: Option<PathBuf>,
    },
    /// Print the JSON schema of the job file
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { config, output, geojson_dir } => {
            let mut job = AnalysisJob::from_file(&config)?;
            if let Some(output) = output {
                job.output = output;
            }
            if geojson_dir.is_some() {
                job.geojson_dir = geojson_dir;
            }
            analyze(job).await?;
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(AnalysisJob);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}

async fn analyze(job: AnalysisJob) -> Result<()> {
    job.validate()?;
    let pipeline = Arc::new(Pipeline::from_config(job.analysis.clone())?);
    info!("{}", pipeline.info());

    if let Some(dir) = &job.geojson_dir {
        std::fs::create_dir_all(dir)?;
    }

    let handles: Vec<_> = job
        .images
        .iter()
        .cloned()
        .map(|entry| {
            let pipeline = Arc::clone(&pipeline);
            let geojson_path = job.geojson_path(&entry.name);
            let name = entry.name.clone();
            (name, tokio::task::spawn_blocking(move || {
                process_image(&pipeline, &entry, geojson_path.as_deref())
            }))
        })
        .collect();

    let mut sink = JsonResultSink::new(&job.output);
    let mut failed = 0usize;
    for (name, handle) in handles {
        match handle.await {
            Ok(Ok(report)) => sink.write_report(&report)?,
            Ok(Err(err)) => {
                failed += 1;
                error!(image = %name, "Skipping image: {err:#}");
            }
            Err(err) => {
                failed += 1;
                error!(image = %name, "Worker failed: {err}");
            }
        }
    }

    let summary = sink.finish()?;
    if failed > 0 {
        warn!("{failed} of {} images produced no records", job.images.len());
    }
    info!(
        "✅ {} images: {} Apical-in, {} Apical-out -> {}",
        summary.images,
        summary.total_apical_in,
        summary.total_apical_out,
        sink.path().display()
    );

    if summary.images == 0 {
        return Err(eyre!("no image could be analysed"));
    }
    Ok(())
}

fn process_image(
    pipeline: &Pipeline,
    entry: &ImageEntry,
    geojson_path: Option<&Path>,
) -> Result<ImageReport> {
    info!("Processing image '{}' from {:?}", entry.name, entry.path);
    let image = GrayscaleImage::open(&entry.path)?;
    let analysis = pipeline.classify_cells(&image)?;

    if let Some(path) = geojson_path {
        analysis.save_geojson(&entry.name, path)?;
    }

    Ok(ImageReport::new(&entry.name, &analysis))
}
