use crate::domain::ports::ConfigProvider;
use crate::utils::error::{CrawlError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub const fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

/// Everything one invocation needs. Built once by the configuration layer and
/// only read afterwards.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub period: Period,
    pub output_directory: PathBuf,
    /// Budget for one export-and-download cycle; also the settle duration
    /// waited before looking for the downloaded file.
    pub per_file_timeout: Duration,
    /// Overall collection deadline.
    pub total_timeout: Duration,
    /// Fixed wait after every remote-UI interaction.
    pub inter_step_delay: Duration,
    /// Budget for locating and activating a single control.
    pub step_timeout: Duration,
}

impl CrawlRequest {
    /// The output folder is resolved against the working directory so the
    /// browser and the resolver agree on it.
    pub fn from_config(config: &dyn ConfigProvider) -> Result<Self> {
        let folder = config.output_folder();
        let output_directory =
            std::path::absolute(folder).map_err(|e| CrawlError::system(folder, e))?;

        Ok(Self {
            period: Period::new(config.year(), config.month()),
            output_directory,
            per_file_timeout: config.download_timeout(),
            total_timeout: config.general_timeout(),
            inter_step_delay: config.time_between_steps(),
            step_timeout: config.step_timeout(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Payroll,
    Indemnities,
}

impl DocumentKind {
    /// Name used by the downstream parser.
    pub fn slug(self) -> &'static str {
        match self {
            DocumentKind::Payroll => "contracheque",
            DocumentKind::Indemnities => "verbas-indenizatorias",
        }
    }
}

/// One spreadsheet to collect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTask {
    pub kind: DocumentKind,
    pub canonical_name: String,
}

impl DocumentTask {
    pub fn new(kind: DocumentKind, period: Period) -> Self {
        Self {
            kind,
            canonical_name: format!(
                "membros-ativos-{}-{:02}-{}.xlsx",
                kind.slug(),
                period.month,
                period.year
            ),
        }
    }

    pub fn target_path(&self, directory: &Path) -> PathBuf {
        directory.join(&self.canonical_name)
    }
}

/// The period as the active portal layout expects to see it. Derived once per
/// crawl; never rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodSelector {
    pub period: Period,
    /// Value written into a year control, or the year widget's display text.
    pub year_label: String,
    /// Zero-padded month number, for value-assigned month controls.
    pub month_value: String,
    /// Localized three-letter abbreviation, for display-text widgets.
    pub month_label: &'static str,
}

/// A directory entry picked as "the" download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}
