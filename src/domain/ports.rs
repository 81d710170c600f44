use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// The interactions the crawler needs from a remote page. Every selector is an
/// XPath expression evaluated against the current document.
#[async_trait]
pub trait RemotePage: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Activates the node once it exists and is visible.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Assigns `value` to a form control once it exists and is visible.
    async fn set_value(&self, selector: &str, value: &str) -> Result<()>;

    /// Displayed text of the node, trimmed.
    async fn text_of(&self, selector: &str) -> Result<String>;

    /// Number of nodes currently matching `selector`. Does not wait.
    async fn count(&self, selector: &str) -> Result<usize>;
}

#[async_trait]
pub trait BrowserSession: RemotePage {
    /// Tears the session down. Safe to call more than once.
    async fn close(&mut self);
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Session: BrowserSession;

    /// Starts a session whose downloads land in `download_dir`.
    async fn launch(&self, download_dir: &Path) -> Result<Self::Session>;
}

pub trait ConfigProvider: Send + Sync {
    fn month(&self) -> u32;
    fn year(&self) -> i32;
    fn output_folder(&self) -> &Path;
    fn download_timeout(&self) -> Duration;
    fn general_timeout(&self) -> Duration;
    fn time_between_steps(&self) -> Duration;
    fn step_timeout(&self) -> Duration;
}
