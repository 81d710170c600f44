pub mod deadline;
pub mod download;
pub mod engine;
pub mod export;
pub mod filter;

pub use crate::domain::ports::{BrowserLauncher, BrowserSession, ConfigProvider, RemotePage};
pub use crate::utils::error::Result;
pub use engine::CrawlEngine;
