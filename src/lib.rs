pub mod config;
pub mod crawl;
pub mod dataset;
pub mod extract;
pub mod fetch;
pub mod runlog;
