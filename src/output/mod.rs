//! Output module for persisting crawl results
//!
//! This module handles:
//! - The URL list file (one discovered URL per line)
//! - Storing downloaded page bodies
//! - Naming of stored pages

mod export;
mod naming;
mod store;

pub use export::{write_url_list, ExportReport, Exporter};
pub use naming::PageNaming;
pub use store::{FileStore, PageStore};
