//! Remote browser session over the Chrome DevTools Protocol.

use crate::domain::ports::{BrowserLauncher, BrowserSession, RemotePage};
use crate::utils::error::{CrawlError, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Identity the portal sees.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/77.0.3830.0 Safari/537.36";

/// How often a pending node lookup is retried.
const NODE_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    /// DevTools endpoint of an already running browser (`ws://` or `http://`).
    pub remote_url: Option<String>,
    pub user_agent: String,
    pub extra_args: Vec<String>,
    /// Timeout for individual CDP requests.
    pub request_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            remote_url: None,
            user_agent: USER_AGENT.to_string(),
            extra_args: Vec::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Launches (or attaches to) Chromium for each crawl.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    options: BrowserOptions,
}

impl ChromiumLauncher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    fn find_chrome(&self) -> Result<PathBuf> {
        if let Some(path) = &self.options.chrome_executable {
            return Ok(path.clone());
        }

        for path in Self::CHROME_PATHS {
            let p = Path::new(path);
            if p.exists() {
                tracing::debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        tracing::debug!("Found Chrome in PATH: {}", path);
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(CrawlError::connection(
            "Chrome/Chromium not found; install it or pass --chrome-executable",
        ))
    }

    async fn start(&self) -> Result<(Browser, chromiumoxide::handler::Handler)> {
        if let Some(remote) = &self.options.remote_url {
            let ws_url = resolve_ws_url(remote).await?;
            tracing::info!("Connecting to remote browser at {}", ws_url);
            let config = chromiumoxide::handler::HandlerConfig {
                request_timeout: self.options.request_timeout,
                ..Default::default()
            };
            return Browser::connect_with_config(ws_url, config)
                .await
                .map_err(|e| CrawlError::connection(format!("failed to connect: {}", e)));
        }

        let chrome = self.find_chrome()?;
        tracing::info!("Launching browser (headless={})", self.options.headless);

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome)
            .no_sandbox()
            .request_timeout(self.options.request_timeout)
            .arg(format!("--user-agent={}", self.options.user_agent))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !self.options.headless {
            builder = builder.with_head();
        }
        for arg in &self.options.extra_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| CrawlError::connection(format!("invalid browser config: {}", e)))?;
        Browser::launch(config)
            .await
            .map_err(|e| CrawlError::connection(format!("failed to launch browser: {}", e)))
    }
}

/// Turns a DevTools address into its WebSocket debugger URL. `ws://` URLs are
/// used as given; `http(s)://` ones are looked up through `/json/version`.
pub async fn resolve_ws_url(remote: &str) -> Result<String> {
    if remote.starts_with("ws://") || remote.starts_with("wss://") {
        return Ok(remote.to_string());
    }

    let version_url = format!("{}/json/version", remote.trim_end_matches('/'));
    let version: serde_json::Value = reqwest::Client::new()
        .get(&version_url)
        .send()
        .await
        .map_err(|e| CrawlError::connection(format!("{}: {}", version_url, e)))?
        .json()
        .await
        .map_err(|e| CrawlError::connection(format!("{}: {}", version_url, e)))?;

    version
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| CrawlError::connection(format!("no webSocketDebuggerUrl at {}", version_url)))
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self, download_dir: &Path) -> Result<ChromiumSession> {
        let (mut browser, mut handler) = self.start().await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let setup = async {
            let params = SetDownloadBehaviorParams::builder()
                .behavior(SetDownloadBehaviorBehavior::AllowAndName)
                .download_path(download_dir.to_string_lossy().into_owned())
                .events_enabled(true)
                .build()
                .map_err(CrawlError::connection)?;
            browser
                .execute(params)
                .await
                .map_err(|e| CrawlError::connection(format!("setting download directory: {}", e)))?;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| CrawlError::connection(format!("opening page: {}", e)))
        };

        let setup = setup.await;
        match setup {
            Ok(page) => Ok(ChromiumSession {
                browser: Some(browser),
                owned: self.options.remote_url.is_none(),
                page,
                handler: Some(handler_task),
            }),
            Err(e) => {
                if self.options.remote_url.is_none() {
                    let _ = browser.close().await;
                }
                handler_task.abort();
                Err(e)
            }
        }
    }
}

/// One browser and the page the crawl drives.
pub struct ChromiumSession {
    browser: Option<Browser>,
    /// False when attached to a browser someone else started; it is left running.
    owned: bool,
    page: Page,
    handler: Option<JoinHandle<()>>,
}

/// In-page outcome of a node lookup.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum NodeState {
    Missing,
    Hidden,
    Done,
}

#[derive(Debug, Deserialize)]
struct NodeText {
    found: bool,
    text: String,
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Script locating `xpath`; when it is present and visible, runs `action`
/// with the node bound to `n`.
fn node_script(xpath: &str, action: &str) -> String {
    format!(
        r#"(() => {{
  const n = document.evaluate({xpath}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
  if (!n) return "missing";
  if (n.nodeType === Node.ELEMENT_NODE && n.getClientRects().length === 0) return "hidden";
  {action}
  return "done";
}})()"#,
        xpath = js_string(xpath),
        action = action,
    )
}

impl ChromiumSession {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| CrawlError::unavailable(e.to_string()))?
            .into_value()
            .map_err(|e| CrawlError::unavailable(e.to_string()))
    }

    /// Retries `action` on the node until it is visible. Callers bound the
    /// wait; this never gives up on its own.
    async fn on_node(&self, xpath: &str, action: &str) -> Result<()> {
        let script = node_script(xpath, action);
        loop {
            match self.eval::<NodeState>(script.clone()).await? {
                NodeState::Done => return Ok(()),
                state => tracing::trace!("{} is {:?}, retrying", xpath, state),
            }
            tokio::time::sleep(NODE_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl RemotePage for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| CrawlError::connection(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.on_node(selector, "n.click();").await
    }

    async fn set_value(&self, selector: &str, value: &str) -> Result<()> {
        let action = format!(
            "n.value = {}; n.dispatchEvent(new Event('input', {{ bubbles: true }})); n.dispatchEvent(new Event('change', {{ bubbles: true }}));",
            js_string(value)
        );
        self.on_node(selector, &action).await
    }

    async fn text_of(&self, selector: &str) -> Result<String> {
        let script = format!(
            r#"(() => {{
  const n = document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
  if (!n) return {{ found: false, text: "" }};
  return {{ found: true, text: String(n.innerText || n.value || n.textContent || "").trim() }};
}})()"#,
            js_string(selector)
        );
        loop {
            let node: NodeText = self.eval(script.clone()).await?;
            if node.found {
                return Ok(node.text);
            }
            tokio::time::sleep(NODE_POLL_INTERVAL).await;
        }
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let script = format!(
            "document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength",
            js_string(selector)
        );
        self.eval(script).await
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn close(&mut self) {
        if let Some(mut browser) = self.browser.take().filter(|_| self.owned) {
            if let Err(e) = browser.close().await {
                tracing::warn!("Browser did not close cleanly: {}", e);
            }
            let _ = browser.wait().await;
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}
