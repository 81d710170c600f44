use crate::domain::model::DocumentKind;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Invalid input for {field} (\"{value}\"): {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Remote browser connection failed: {message}")]
    Connection { message: String },

    #[error("Data unavailable: {message}")]
    DataUnavailable { message: String },

    #[error("{operation} did not complete within {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Collection deadline exceeded during {operation}")]
    DeadlineExceeded { operation: String },

    #[error("Filesystem error on {path}: {source}")]
    System {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output error: {message}")]
    Output { message: String },
}

impl CrawlError {
    pub fn invalid_input(field: &str, value: impl fmt::Display, reason: impl Into<String>) -> Self {
        CrawlError::InvalidInput {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        CrawlError::Connection {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        CrawlError::DataUnavailable {
            message: message.into(),
        }
    }

    pub fn output(message: impl Into<String>) -> Self {
        CrawlError::Output {
            message: message.into(),
        }
    }

    pub fn system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrawlError::System {
            path: path.into(),
            source,
        }
    }

    /// Re-tags interaction failures as connection failures. Used for the
    /// initial navigation, where an unreachable page is a connectivity problem
    /// rather than missing data.
    pub fn into_connection(self) -> Self {
        match self {
            CrawlError::DataUnavailable { message } => CrawlError::Connection { message },
            CrawlError::Timeout { operation, after } => CrawlError::Connection {
                message: format!("{} did not complete within {:?}", operation, after),
            },
            other => other,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CrawlError::InvalidInput { .. } => ErrorCategory::InvalidInput,
            CrawlError::Connection { .. } | CrawlError::DeadlineExceeded { .. } => {
                ErrorCategory::ConnectionError
            }
            CrawlError::DataUnavailable { .. } | CrawlError::Timeout { .. } => {
                ErrorCategory::DataUnavailable
            }
            CrawlError::System { .. } => ErrorCategory::SystemError,
            CrawlError::Output { .. } => ErrorCategory::OutputError,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::InvalidInput => "Check MONTH (1-12), YEAR and the duration settings",
            ErrorCategory::ConnectionError => {
                "Check that Chrome/Chromium is installed and the portal is reachable, or raise GENERAL_TIMEOUT"
            }
            ErrorCategory::DataUnavailable => {
                "The portal may not publish this period yet, or its layout changed; raise TIME_BETWEEN_STEPS if the site is slow"
            }
            ErrorCategory::SystemError => "Check permissions on the output folder",
            ErrorCategory::OutputError => "The download did not land in time; raise DOWNLOAD_TIMEOUT",
        }
    }
}

/// Termination categories reported at the process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidInput,
    ConnectionError,
    DataUnavailable,
    SystemError,
    OutputError,
}

impl ErrorCategory {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCategory::InvalidInput => 1,
            ErrorCategory::ConnectionError => 2,
            ErrorCategory::DataUnavailable => 3,
            ErrorCategory::SystemError => 4,
            ErrorCategory::OutputError => 5,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::InvalidInput => "invalid input",
            ErrorCategory::ConnectionError => "connection error",
            ErrorCategory::DataUnavailable => "data unavailable",
            ErrorCategory::SystemError => "system error",
            ErrorCategory::OutputError => "output error",
        };
        f.write_str(name)
    }
}

/// Orchestrator states. A failure is tagged with the state its transition was
/// heading to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Navigated,
    SectionOpened,
    FilterApplied,
    Exported,
    Downloaded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A crawl that stopped at `stage`. `completed` lists documents already
/// renamed into place before the failure; they are not reported as output.
#[derive(Debug)]
pub struct CrawlFailure {
    pub stage: Stage,
    pub document: Option<DocumentKind>,
    pub completed: Vec<PathBuf>,
    pub error: CrawlError,
}

impl fmt::Display for CrawlFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed", self.stage)?;
        if let Some(document) = self.document {
            write!(f, " ({})", document.slug())?;
        }
        write!(f, ": {}", self.error)
    }
}

impl std::error::Error for CrawlFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl CrawlFailure {
    pub fn at(stage: Stage, error: CrawlError) -> Self {
        Self {
            stage,
            document: None,
            completed: Vec::new(),
            error,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.error.category()
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
