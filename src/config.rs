// src/config.rs

use clap::Parser;
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_START_URL: &str = "https://www.pa.gov/agencies/dli/programs-services/workers-compensation/wc-health-care-services-review/wc-fee-schedule/part-b-fee-schedules.html";

/// Command line and environment configuration for a crawl.
#[derive(Debug, Clone, Parser)]
#[command(name = "feescraper", about = "Fetch PA Part B fee schedule PDFs into a CSV dataset")]
pub struct Config {
    /// Page listing the fee schedule PDFs.
    #[arg(long, env = "FEESCRAPER_START_URL", default_value = DEFAULT_START_URL)]
    pub start_url: String,

    /// PDF links outside this domain (and its subdomains) are ignored.
    #[arg(long, env = "FEESCRAPER_ALLOWED_DOMAIN", default_value = "pa.gov")]
    pub allowed_domain: String,

    /// Root for the default intake, archive, dataset and log locations.
    #[arg(long, env = "FEESCRAPER_BASE_DIR", default_value = ".")]
    pub base_dir: PathBuf,

    #[arg(long, env = "FEESCRAPER_INTAKE_DIR")]
    pub intake_dir: Option<PathBuf>,

    #[arg(long, env = "FEESCRAPER_ARCHIVE_DIR")]
    pub archive_dir: Option<PathBuf>,

    #[arg(long, env = "FEESCRAPER_DATASET")]
    pub dataset: Option<PathBuf>,

    #[arg(long, env = "FEESCRAPER_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "FEESCRAPER_TIMEOUT_SECS", default_value_t = 60)]
    pub timeout_secs: u64,

    #[arg(long, env = "FEESCRAPER_USER_AGENT", default_value = concat!("feescraper/", env!("CARGO_PKG_VERSION")))]
    pub user_agent: String,
}

/// Intake and archive directories. Presence of a file name in either one is
/// the whole processing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub intake: PathBuf,
    pub archive: PathBuf,
}

impl Layout {
    pub fn new(intake: impl Into<PathBuf>, archive: impl Into<PathBuf>) -> Self {
        Self {
            intake: intake.into(),
            archive: archive.into(),
        }
    }

    pub fn intake_path(&self, name: &str) -> PathBuf {
        self.intake.join(name)
    }

    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.archive.join(name)
    }
}

impl Config {
    /// Defaults rooted at `base_dir`, as used by tests and library callers.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            allowed_domain: "pa.gov".to_string(),
            base_dir: base_dir.into(),
            intake_dir: None,
            archive_dir: None,
            dataset: None,
            log_file: None,
            timeout_secs: 60,
            user_agent: concat!("feescraper/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn intake_dir(&self) -> PathBuf {
        self.intake_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("pdf_downloads"))
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.archive_dir
            .clone()
            .unwrap_or_else(|| self.intake_dir().join("processed"))
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.dataset
            .clone()
            .unwrap_or_else(|| self.base_dir.join("webscraper_schedule.csv"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.base_dir.join("spider_logs.txt"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn layout(&self) -> Layout {
        Layout::new(self.intake_dir(), self.archive_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_base_dir() {
        let cfg = Config::try_parse_from(["feescraper", "--base-dir", "/data"]).unwrap();
        assert_eq!(cfg.start_url, DEFAULT_START_URL);
        assert_eq!(cfg.intake_dir(), PathBuf::from("/data/pdf_downloads"));
        assert_eq!(
            cfg.archive_dir(),
            PathBuf::from("/data/pdf_downloads/processed")
        );
        assert_eq!(
            cfg.dataset_path(),
            PathBuf::from("/data/webscraper_schedule.csv")
        );
        assert_eq!(cfg.log_path(), PathBuf::from("/data/spider_logs.txt"));
        assert_eq!(cfg.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn explicit_paths_win() {
        let cfg = Config::try_parse_from([
            "feescraper",
            "--intake-dir",
            "/in",
            "--archive-dir",
            "/done",
            "--dataset",
            "/out.csv",
        ])
        .unwrap();
        assert_eq!(cfg.layout(), Layout::new("/in", "/done"));
        assert_eq!(cfg.dataset_path(), PathBuf::from("/out.csv"));
    }

    #[test]
    fn archive_defaults_under_custom_intake() {
        let mut cfg = Config::with_base_dir("/data");
        cfg.intake_dir = Some(PathBuf::from("/in"));
        assert_eq!(cfg.archive_dir(), PathBuf::from("/in/processed"));
    }
}
