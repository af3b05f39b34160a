use anyhow::Result;
use clap::Parser;
use feescraper::{
    config::Config, crawl::Crawler, extract::FeeScheduleExtractor, fetch::HttpFetcher,
};
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) configure ────────────────────────────────────────────────
    let cfg = Config::parse();
    info!(
        start_url = %cfg.start_url,
        intake = %cfg.intake_dir().display(),
        archive = %cfg.archive_dir().display(),
        dataset = %cfg.dataset_path().display(),
        "configured"
    );

    // ─── 3) crawl ────────────────────────────────────────────────────
    let fetcher = HttpFetcher::from_config(&cfg)?;
    let extractor = FeeScheduleExtractor::new(cfg.dataset_path());
    let mut crawler = Crawler::new(cfg, fetcher, extractor)?;

    let start = Instant::now();
    let summary = crawler.run().await?;

    info!(
        swept = summary.swept,
        duplicates_deleted = summary.duplicates_deleted,
        links = summary.links_found,
        kept = summary.links_kept,
        pending = summary.pending,
        skipped = summary.skipped,
        downloaded = summary.downloaded,
        elapsed = ?start.elapsed(),
        "all done"
    );
    Ok(())
}
