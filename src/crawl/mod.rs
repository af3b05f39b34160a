// src/crawl/mod.rs

pub mod state;

use crate::{
    config::{Config, Layout},
    extract::{Extract, ExtractOutcome},
    fetch::{urls, Fetcher},
    runlog::RunLog,
};
use anyhow::{Context, Result};
use glob::{glob, Pattern};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{task, time::Instant};
use tracing::{debug, info, warn};
use url::Url;

pub use state::PdfState;

/// Counts reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Leftover intake PDFs extracted and archived.
    pub swept: usize,
    /// Leftover intake PDFs deleted because the archive already had them.
    pub duplicates_deleted: usize,
    /// `.pdf` anchors on the page, before any filtering.
    pub links_found: usize,
    /// Links left after the domain filter and one-per-file-name.
    pub links_kept: usize,
    /// Links that were in neither directory when the page was processed.
    pub pending: usize,
    pub skipped: usize,
    pub downloaded: usize,
}

/// State scoped to one run: directory layout, run log and the pending counter.
#[derive(Debug)]
pub struct RunContext {
    pub layout: Layout,
    pub log: RunLog,
    pub pending: usize,
    pub summary: RunSummary,
}

/// Discovers, downloads, extracts and archives fee schedule PDFs.
pub struct Crawler<F, E> {
    cfg: Config,
    fetcher: F,
    extractor: Arc<E>,
    ctx: RunContext,
}

impl<F, E> Crawler<F, E>
where
    F: Fetcher,
    E: Extract + Send + Sync + 'static,
{
    /// Creates the intake and archive directories and opens the run log.
    pub fn new(cfg: Config, fetcher: F, extractor: E) -> Result<Self> {
        let layout = cfg.layout();
        for d in [&layout.intake, &layout.archive] {
            fs::create_dir_all(d)
                .with_context(|| format!("creating directory {}", d.display()))?;
        }
        let log = RunLog::new(cfg.log_path())?;
        log.message("Crawler initialized. Checking for new PDFs.")?;

        Ok(Self {
            cfg,
            fetcher,
            extractor: Arc::new(extractor),
            ctx: RunContext {
                layout,
                log,
                pending: 0,
                summary: RunSummary::default(),
            },
        })
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Sweep leftovers, then process the start page.
    pub async fn run(&mut self) -> Result<RunSummary> {
        self.sweep_intake().await?;

        let start = Url::parse(&self.cfg.start_url)
            .with_context(|| format!("parsing start URL {}", self.cfg.start_url))?;
        info!(url = %start, "fetching start page");
        let html = self.fetcher.fetch_page(&start).await?;
        self.process_page(&html, &start).await?;

        Ok(self.ctx.summary.clone())
    }

    /// Extract and archive every PDF left in the intake directory by an
    /// earlier run. Copies already present in the archive are deleted.
    pub async fn sweep_intake(&mut self) -> Result<()> {
        let leftovers = self.intake_pdfs()?;
        if leftovers.is_empty() {
            return self.ctx.log.message("No leftover PDFs found for processing.");
        }

        self.ctx.log.message(format!(
            "Found {} unprocessed PDFs. Processing now.",
            leftovers.len()
        ))?;

        for (name, path) in leftovers {
            if PdfState::locate(&self.ctx.layout, &name) == PdfState::Archived {
                self.ctx.log.message(format!(
                    "Duplicate found: {} already processed. Deleting duplicate.",
                    name
                ))?;
                fs::remove_file(&path)
                    .with_context(|| format!("deleting duplicate {}", path.display()))?;
                self.ctx.summary.duplicates_deleted += 1;
            } else {
                self.ctx
                    .log
                    .message(format!("Processing leftover PDF: {}", name))?;
                self.extract_and_archive(&name).await?;
                self.ctx.summary.swept += 1;
            }
        }
        Ok(())
    }

    /// PDF links on the page that are inside the allowed domain, one per file name.
    pub fn discover(&mut self, html: &str, page_url: &Url) -> Result<Vec<Url>> {
        let mut names = HashSet::new();
        let found = urls::pdf_links(html, page_url);
        self.ctx.summary.links_found = found.len();
        self.ctx
            .log
            .message(format!("Found {} PDF links on the page.", found.len()))?;

        let links: Vec<Url> = found
            .into_iter()
            .filter(|link| {
                let allowed = urls::is_allowed(link, &self.cfg.allowed_domain);
                if !allowed {
                    debug!(url = %link, "ignoring offsite link");
                }
                allowed
            })
            .filter(|link| match urls::pdf_name(link) {
                Some(name) => names.insert(name),
                None => {
                    warn!(url = %link, "PDF link without a file name");
                    false
                }
            })
            .collect();

        self.ctx.summary.links_kept = links.len();
        if links.len() != self.ctx.summary.links_found {
            self.ctx.log.message(format!(
                "Kept {} PDF links after filtering.",
                links.len()
            ))?;
        }
        Ok(links)
    }

    /// Number of links whose file name is in neither the intake nor the archive.
    pub fn pending_count(&self, links: &[Url]) -> usize {
        links
            .iter()
            .filter_map(urls::pdf_name)
            .filter(|name| !PdfState::locate(&self.ctx.layout, name).is_known())
            .count()
    }

    /// Download and handle every new PDF linked from `html`.
    pub async fn process_page(&mut self, html: &str, page_url: &Url) -> Result<()> {
        let links = self.discover(html, page_url)?;
        self.ctx.pending = self.pending_count(&links);
        self.ctx.summary.pending = self.ctx.pending;

        if self.ctx.pending == 0 {
            return self.ctx.log.final_message("No new PDFs to process.");
        }

        for link in links {
            let Some(name) = urls::pdf_name(&link) else {
                continue;
            };

            if PdfState::locate(&self.ctx.layout, &name).is_known() {
                self.ctx
                    .log
                    .message(format!("Skipping (Already Exists): {}", name))?;
                self.ctx.summary.skipped += 1;
                continue;
            }

            self.ctx.log.message(format!("Downloading: {}", name))?;
            debug!(pdf = %name, state = PdfState::Downloading.as_str());
            let started = Instant::now();
            let bytes = self.fetcher.fetch_bytes(&link).await?;
            info!(pdf = %name, bytes = bytes.len(), elapsed = ?started.elapsed(), "downloaded");
            self.handle_download(&name, &bytes).await?;
        }
        Ok(())
    }

    /// Store a finished download in the intake, extract it and archive it.
    pub async fn handle_download(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.ctx.layout.intake_path(name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        self.ctx
            .log
            .message(format!("Extracting data from {}", name))?;
        self.extract_and_archive(name).await?;

        self.ctx.summary.downloaded += 1;
        self.ctx.pending = self.ctx.pending.saturating_sub(1);
        if self.ctx.pending == 0 {
            self.ctx.log.final_message("Finished processing all PDFs.")?;
        }
        Ok(())
    }

    async fn extract_and_archive(&mut self, name: &str) -> Result<()> {
        let from = self.ctx.layout.intake_path(name);
        let outcome = self.extract_blocking(&from, name).await?;
        debug!(pdf = name, state = PdfState::Extracted.as_str(), ?outcome);

        let to = self.ctx.layout.archive_path(name);
        fs::rename(&from, &to)
            .with_context(|| format!("moving {} to {}", from.display(), to.display()))?;
        self.ctx.log.message(format!(
            "Moved {} to {}",
            name,
            self.ctx.layout.archive.display()
        ))
    }

    async fn extract_blocking(&self, path: &Path, name: &str) -> Result<ExtractOutcome> {
        let extractor = Arc::clone(&self.extractor);
        let path = path.to_path_buf();
        let name = name.to_string();
        task::spawn_blocking(move || extractor.extract(&path, &name))
            .await
            .context("extraction task failed")?
    }

    /// `*.pdf` files directly under the intake directory, by name.
    fn intake_pdfs(&self) -> Result<Vec<(String, PathBuf)>> {
        let dir = Pattern::escape(&self.ctx.layout.intake.display().to_string());
        let pattern = format!("{}/*.pdf", dir);
        let mut out = Vec::new();
        for entry in glob(&pattern).context("invalid glob pattern for intake scan")? {
            let path = match entry {
                Ok(p) => p,
                Err(e) => {
                    warn!("cannot read intake entry: {:?}", e);
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                out.push((name.to_string(), path.clone()));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::extract::{pdf, FeeScheduleExtractor};
    use anyhow::{anyhow, Result};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    const START: &str = "https://www.pa.gov/fees/part-b.html";

    #[derive(Default)]
    struct FakeFetcher {
        page: String,
        files: HashMap<String, Vec<u8>>,
        requested: Mutex<Vec<String>>,
    }

    impl Fetcher for FakeFetcher {
        async fn fetch_page(&self, _url: &Url) -> Result<String> {
            Ok(self.page.clone())
        }

        async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>> {
            self.requested.lock().unwrap().push(url.to_string());
            self.files
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| anyhow!("404 {}", url))
        }
    }

    #[derive(Default)]
    struct RecordingExtractor {
        calls: Mutex<Vec<(PathBuf, String)>>,
    }

    impl Extract for RecordingExtractor {
        fn extract(&self, path: &Path, name: &str) -> Result<ExtractOutcome> {
            assert!(path.exists(), "extract called on a missing file");
            self.calls
                .lock()
                .unwrap()
                .push((path.to_path_buf(), name.to_string()));
            Ok(ExtractOutcome::NoRows)
        }
    }

    impl RecordingExtractor {
        fn names(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(_, n)| n.clone())
                .collect()
        }
    }

    fn config(tmp: &TempDir) -> Config {
        let mut cfg = Config::with_base_dir(tmp.path());
        cfg.start_url = START.to_string();
        cfg
    }

    fn idle_crawler(cfg: &Config) -> Result<Crawler<FakeFetcher, RecordingExtractor>> {
        Crawler::new(
            cfg.clone(),
            FakeFetcher::default(),
            RecordingExtractor::default(),
        )
    }

    fn log_text(cfg: &Config) -> String {
        fs::read_to_string(cfg.log_path()).unwrap()
    }

    fn page(hrefs: &[&str]) -> String {
        let anchors: Vec<String> = hrefs
            .iter()
            .map(|h| format!(r#"<a href="{}">pdf</a>"#, h))
            .collect();
        format!("<html><body>{}</body></html>", anchors.join("\n"))
    }

    #[tokio::test]
    async fn sweep_deletes_archived_duplicates() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config(&tmp);
        let mut crawler = idle_crawler(&cfg)?;
        let layout = crawler.context().layout.clone();
        fs::write(layout.intake_path("a.pdf"), b"intake")?;
        fs::write(layout.archive_path("a.pdf"), b"archive")?;

        crawler.sweep_intake().await?;

        assert!(!layout.intake_path("a.pdf").exists());
        assert_eq!(fs::read(layout.archive_path("a.pdf"))?, b"archive");
        assert!(crawler.extractor().names().is_empty());
        assert_eq!(crawler.context().summary.duplicates_deleted, 1);
        assert!(log_text(&cfg)
            .contains("Duplicate found: a.pdf already processed. Deleting duplicate."));
        Ok(())
    }

    #[tokio::test]
    async fn sweep_extracts_and_archives_leftovers() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config(&tmp);
        let mut crawler = idle_crawler(&cfg)?;
        let layout = crawler.context().layout.clone();
        fs::write(layout.intake_path("b.pdf"), b"leftover")?;
        fs::write(layout.intake_path("readme.txt"), b"not a pdf")?;

        crawler.sweep_intake().await?;

        assert_eq!(crawler.extractor().names(), vec!["b.pdf"]);
        assert!(!layout.intake_path("b.pdf").exists());
        assert!(layout.archive_path("b.pdf").exists());
        assert!(layout.intake_path("readme.txt").exists());
        let log = log_text(&cfg);
        assert!(log.contains("Found 1 unprocessed PDFs. Processing now."));
        assert!(log.contains("Processing leftover PDF: b.pdf"));
        assert!(log.contains(&format!("Moved b.pdf to {}", layout.archive.display())));
        Ok(())
    }

    #[tokio::test]
    async fn empty_intake_is_logged() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config(&tmp);
        let mut crawler = idle_crawler(&cfg)?;
        crawler.sweep_intake().await?;
        assert!(log_text(&cfg).contains("No leftover PDFs found for processing."));
        Ok(())
    }

    #[tokio::test]
    async fn only_unseen_links_are_requested() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config(&tmp);
        let fetcher = FakeFetcher {
            page: page(&["/dam/old.pdf", "/dam/new.pdf"]),
            files: HashMap::from([(
                "https://www.pa.gov/dam/new.pdf".to_string(),
                b"%PDF-new".to_vec(),
            )]),
            ..Default::default()
        };
        let mut crawler = Crawler::new(cfg.clone(), fetcher, RecordingExtractor::default())?;
        let layout = crawler.context().layout.clone();
        fs::write(layout.archive_path("old.pdf"), b"done")?;

        let summary = crawler.run().await?;

        assert_eq!(summary.links_found, 2);
        assert_eq!(summary.links_kept, 2);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(
            *crawler.fetcher.requested.lock().unwrap(),
            vec!["https://www.pa.gov/dam/new.pdf".to_string()]
        );
        assert_eq!(crawler.extractor().names(), vec!["new.pdf"]);
        assert_eq!(fs::read(layout.archive_path("new.pdf"))?, b"%PDF-new");
        assert!(!layout.intake_path("new.pdf").exists());
        assert_eq!(crawler.context().pending, 0);

        let log = log_text(&cfg);
        assert!(log.contains("Found 2 PDF links on the page."));
        assert!(log.contains("Skipping (Already Exists): old.pdf"));
        assert!(log.contains("Downloading: new.pdf"));
        assert!(log.contains("Extracting data from new.pdf"));
        assert!(log.ends_with("Finished processing all PDFs.\n\n"));
        Ok(())
    }

    #[tokio::test]
    async fn nothing_pending_ends_the_run() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config(&tmp);
        let fetcher = FakeFetcher {
            page: page(&["/dam/old.pdf", "https://example.com/elsewhere.pdf"]),
            ..Default::default()
        };
        let mut crawler = Crawler::new(cfg.clone(), fetcher, RecordingExtractor::default())?;
        fs::write(crawler.context().layout.archive_path("old.pdf"), b"done")?;

        let summary = crawler.run().await?;

        assert_eq!(summary.links_found, 2);
        assert_eq!(summary.links_kept, 1);
        assert_eq!(summary.pending, 0);
        assert!(crawler.fetcher.requested.lock().unwrap().is_empty());
        let log = log_text(&cfg);
        assert!(log.contains("Found 2 PDF links on the page."));
        assert!(log.contains("Kept 1 PDF links after filtering."));
        assert!(log.ends_with("No new PDFs to process.\n\n"));
        Ok(())
    }

    #[tokio::test]
    async fn pending_counts_intake_and_archive() -> Result<()> {
        let tmp = tempdir()?;
        let crawler = idle_crawler(&config(&tmp))?;
        let layout = &crawler.context().layout;
        fs::write(layout.intake_path("a.pdf"), b"x")?;
        fs::write(layout.archive_path("b.pdf"), b"x")?;

        let links: Vec<Url> = ["a.pdf", "b.pdf", "c.pdf", "d.pdf"]
            .iter()
            .map(|n| Url::parse(&format!("https://www.pa.gov/dam/{}", n)).unwrap())
            .collect();
        assert_eq!(crawler.pending_count(&links), 2);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_names_are_discovered_once() -> Result<()> {
        let tmp = tempdir()?;
        let mut crawler = idle_crawler(&config(&tmp))?;
        let base = Url::parse(START)?;
        let links = crawler.discover(
            &page(&["/a/fee.pdf", "/b/fee.pdf", "/a/fee.pdf", "/c/other.pdf"]),
            &base,
        )?;
        let names: Vec<String> = links.iter().filter_map(urls::pdf_name).collect();
        assert_eq!(names, vec!["fee.pdf", "other.pdf"]);
        assert_eq!(crawler.context().summary.links_found, 4);
        assert_eq!(crawler.context().summary.links_kept, 2);
        Ok(())
    }

    #[tokio::test]
    async fn failed_download_halts_the_run() -> Result<()> {
        let tmp = tempdir()?;
        let fetcher = FakeFetcher {
            page: page(&["/dam/missing.pdf"]),
            ..Default::default()
        };
        let mut crawler = Crawler::new(config(&tmp), fetcher, RecordingExtractor::default())?;
        assert!(crawler.run().await.is_err());
        assert!(crawler.extractor().names().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn end_to_end_with_real_pdf() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config(&tmp);

        let pdf_path = tmp.path().join("source.pdf");
        pdf::tests::write_pdf(
            &pdf_path,
            &[&[
                &["Code", "Mod", "Loc", "GSI", "MSI", "Prevailing", "Fee", "Site"],
                &["99213", "26", "01", "000", "2", "120.00", "100.00", "80.00"],
                &["99214", "", "01", "000", "2", "140.00", "110.00", "90.00"],
                &["99215", "TC", "01", "000", "2", "160.00", "130.00", "95.00"],
            ]],
            pdf::tests::RowStyle::PerCell,
        )?;
        let fetcher = FakeFetcher {
            page: page(&["/dam/fee_2023.pdf"]),
            files: HashMap::from([(
                "https://www.pa.gov/dam/fee_2023.pdf".to_string(),
                fs::read(&pdf_path)?,
            )]),
            ..Default::default()
        };
        let extractor = FeeScheduleExtractor::new(cfg.dataset_path());
        let mut crawler = Crawler::new(cfg.clone(), fetcher, extractor)?;
        crawler.run().await?;

        let ds = Dataset::load(cfg.dataset_path())?;
        let ids: Vec<u64> = ds.rows().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(ds.rows()[1].modifier, "");
        assert!(ds.rows().iter().all(|r| r.pdf_name == "fee_2023.pdf"));
        assert!(cfg.archive_dir().join("fee_2023.pdf").exists());
        Ok(())
    }
}
