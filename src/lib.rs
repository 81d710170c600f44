pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::TomlConfig;

pub use adapters::browser::{BrowserOptions, ChromiumLauncher};
pub use adapters::site::SiteAdapter;
pub use core::engine::CrawlEngine;
pub use domain::model::{CrawlRequest, DocumentKind, Period};
pub use utils::error::{CrawlError, CrawlFailure, ErrorCategory, Result, Stage};
