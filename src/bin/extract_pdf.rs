use anyhow::{Context, Result};
use clap::Parser;
use feescraper::extract::{Extract, FeeScheduleExtractor};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Extract one local fee schedule PDF into the dataset.
#[derive(Parser, Debug)]
#[command(name = "extract_pdf")]
struct Args {
    /// PDF to read.
    pdf: PathBuf,

    /// Name recorded in the PDF Name column. Defaults to the file name.
    #[arg(long)]
    name: Option<String>,

    #[arg(long, env = "FEESCRAPER_DATASET", default_value = "webscraper_schedule.csv")]
    dataset: PathBuf,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env).init();

    let args = Args::parse();
    let name = match args.name {
        Some(n) => n,
        None => args
            .pdf
            .file_name()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .with_context(|| format!("no file name in {}", args.pdf.display()))?,
    };

    let extractor = FeeScheduleExtractor::new(&args.dataset);
    let outcome = extractor.extract(&args.pdf, &name)?;
    info!(pdf = %name, ?outcome, dataset = %args.dataset.display(), "done");
    Ok(())
}
