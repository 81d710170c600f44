#![allow(dead_code)]

use async_trait::async_trait;
use mpms_crawler::domain::ports::{BrowserLauncher, BrowserSession, RemotePage};
use mpms_crawler::{CrawlError, CrawlRequest, Period, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// What the scripted portal does when a selector is clicked.
#[derive(Debug, Clone)]
enum Reaction {
    /// Drops a freshly modified spreadsheet into the download directory.
    Download,
    /// Like `Download`, but only while nothing has been downloaded yet.
    FirstDownloadOnly,
    /// Never answers.
    Hang,
    /// Deletes the download directory.
    RemoveDownloadDir,
}

#[derive(Default)]
struct PortalState {
    reactions: Vec<(String, Reaction)>,
    row_count: usize,
    fail_launch: bool,
    download_dir: Mutex<Option<PathBuf>>,
    actions: Mutex<Vec<String>>,
    downloads: AtomicU64,
    closed: AtomicBool,
}

/// A scripted stand-in for the remote browser and the portal behind it.
#[derive(Clone, Default)]
pub struct FakePortal {
    state: Arc<PortalState>,
}

/// Builder for [`FakePortal`].
#[derive(Default)]
pub struct FakePortalBuilder {
    state: PortalState,
}

impl FakePortalBuilder {
    pub fn download_on(mut self, selector: impl Into<String>) -> Self {
        self.state.reactions.push((selector.into(), Reaction::Download));
        self
    }

    pub fn download_once_on(mut self, selector: impl Into<String>) -> Self {
        self.state
            .reactions
            .push((selector.into(), Reaction::FirstDownloadOnly));
        self
    }

    pub fn hang_on(mut self, selector: impl Into<String>) -> Self {
        self.state.reactions.push((selector.into(), Reaction::Hang));
        self
    }

    pub fn remove_download_dir_on(mut self, selector: impl Into<String>) -> Self {
        self.state
            .reactions
            .push((selector.into(), Reaction::RemoveDownloadDir));
        self
    }

    pub fn rows(mut self, row_count: usize) -> Self {
        self.state.row_count = row_count;
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.state.fail_launch = true;
        self
    }

    pub fn build(self) -> FakePortal {
        FakePortal {
            state: Arc::new(self.state),
        }
    }
}

impl FakePortal {
    pub fn builder() -> FakePortalBuilder {
        FakePortalBuilder::default()
    }

    pub fn launcher(&self) -> FakeLauncher {
        FakeLauncher {
            portal: self.clone(),
        }
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.actions.lock().unwrap().clone()
    }

    pub fn clicked(&self, selector: &str) -> bool {
        self.actions()
            .iter()
            .any(|a| a == &format!("click {}", selector))
    }

    pub fn downloads(&self) -> u64 {
        self.state.downloads.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    fn record(&self, action: String) {
        self.state.actions.lock().unwrap().push(action);
    }

    fn reaction(&self, selector: &str) -> Option<Reaction> {
        self.state
            .reactions
            .iter()
            .find(|(s, _)| s == selector)
            .map(|(_, r)| r.clone())
    }

    fn download_dir(&self) -> PathBuf {
        self.state
            .download_dir
            .lock()
            .unwrap()
            .clone()
            .expect("session was launched")
    }

    /// Every download gets a later timestamp than the previous one so the
    /// newest-file lookup never sees a tie.
    fn write_download(&self) {
        let n = self.state.downloads.fetch_add(1, Ordering::SeqCst) + 1;
        let path = self.download_dir().join(format!("export ({}).xlsx", n));
        std::fs::write(&path, format!("spreadsheet {}", n)).unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60 * n))
            .unwrap();
    }
}

pub struct FakeLauncher {
    portal: FakePortal,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    type Session = FakeSession;

    async fn launch(&self, download_dir: &Path) -> Result<FakeSession> {
        if self.portal.state.fail_launch {
            return Err(CrawlError::connection("chromium exited during startup"));
        }
        *self.portal.state.download_dir.lock().unwrap() = Some(download_dir.to_path_buf());
        Ok(FakeSession {
            portal: self.portal.clone(),
        })
    }
}

pub struct FakeSession {
    portal: FakePortal,
}

#[async_trait]
impl RemotePage for FakeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.portal.record(format!("navigate {}", url));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        match self.portal.reaction(selector) {
            Some(Reaction::Hang) => std::future::pending::<()>().await,
            Some(Reaction::Download) => self.portal.write_download(),
            Some(Reaction::FirstDownloadOnly) => {
                if self.portal.downloads() == 0 {
                    self.portal.write_download()
                }
            }
            Some(Reaction::RemoveDownloadDir) => {
                std::fs::remove_dir_all(self.portal.download_dir()).unwrap()
            }
            None => {}
        }
        self.portal.record(format!("click {}", selector));
        Ok(())
    }

    async fn set_value(&self, selector: &str, value: &str) -> Result<()> {
        self.portal.record(format!("set {}={}", selector, value));
        Ok(())
    }

    async fn text_of(&self, _selector: &str) -> Result<String> {
        Ok(String::new())
    }

    async fn count(&self, _selector: &str) -> Result<usize> {
        Ok(self.portal.state.row_count)
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn close(&mut self) {
        self.portal.state.closed.store(true, Ordering::SeqCst);
    }
}

pub fn request(period: Period, output_directory: &Path) -> CrawlRequest {
    CrawlRequest {
        period,
        output_directory: output_directory.to_path_buf(),
        per_file_timeout: Duration::from_secs(20),
        total_timeout: Duration::from_secs(360),
        inter_step_delay: Duration::from_secs(5),
        step_timeout: Duration::from_secs(30),
    }
}

pub fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}
