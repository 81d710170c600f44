use crate::adapters::browser::{BrowserOptions, USER_AGENT};
use crate::config::toml_config::TomlConfig;
use crate::domain::model::Period;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    parse_number, validate_devtools_url, validate_path, validate_positive_duration,
    validate_range, Validate,
};
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn month_arg(raw: &str) -> std::result::Result<u32, String> {
    parse_number("month", raw).map_err(|e| e.to_string())
}

fn year_arg(raw: &str) -> std::result::Result<i32, String> {
    parse_number("year", raw).map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Parser)]
#[command(name = "mpms-crawler")]
#[command(version)]
#[command(about = "Downloads MPMS payroll and indemnity spreadsheets for one month")]
pub struct CliConfig {
    #[arg(long, env = "MONTH", value_parser = month_arg)]
    pub month: u32,

    #[arg(long, env = "YEAR", value_parser = year_arg)]
    pub year: i32,

    #[arg(long, env = "OUTPUT_FOLDER", default_value = "/output")]
    pub output_folder: PathBuf,

    /// How long to wait for each spreadsheet to land on disk.
    #[arg(long, env = "DOWNLOAD_TIMEOUT", default_value = "20s", value_parser = humantime::parse_duration)]
    pub download_timeout: Duration,

    /// Budget for the whole collection.
    #[arg(long, env = "GENERAL_TIMEOUT", default_value = "6m", value_parser = humantime::parse_duration)]
    pub general_timeout: Duration,

    #[arg(long, env = "TIME_BETWEEN_STEPS", default_value = "5s", value_parser = humantime::parse_duration)]
    pub time_between_steps: Duration,

    /// Budget for locating and activating a single control.
    #[arg(long, env = "STEP_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    pub step_timeout: Duration,

    #[arg(long, env = "HEADLESS", action = ArgAction::Set)]
    pub headless: Option<bool>,

    #[arg(long, env = "CHROME_EXECUTABLE")]
    pub chrome_executable: Option<PathBuf>,

    /// DevTools endpoint of a running browser; a local one is launched otherwise.
    #[arg(long, env = "CHROMIUM_REMOTE_DEBUGGING_URL")]
    pub remote_url: Option<String>,

    /// Optional TOML file with browser and portal settings.
    #[arg(long = "config", env = "CRAWLER_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(long, help = "Log CPU and memory usage")]
    pub monitor: bool,
}

impl CliConfig {
    pub fn period(&self) -> Period {
        Period::new(self.year, self.month)
    }

    /// Loads the TOML overlay named by `--config`, or an empty one.
    pub fn load_overlay(&self) -> Result<TomlConfig> {
        let overlay = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };
        overlay.validate()?;
        Ok(overlay)
    }

    /// Flags and environment win over the file, the file over built-in defaults.
    pub fn browser_options(&self, overlay: &TomlConfig) -> BrowserOptions {
        let file = &overlay.browser;
        BrowserOptions {
            headless: self.headless.or(file.headless).unwrap_or(true),
            chrome_executable: self
                .chrome_executable
                .clone()
                .or_else(|| file.chrome_executable.clone()),
            remote_url: self.remote_url.clone().or_else(|| file.remote_url.clone()),
            user_agent: file
                .user_agent
                .clone()
                .unwrap_or_else(|| USER_AGENT.to_string()),
            extra_args: file.extra_args.clone(),
            request_timeout: self.step_timeout,
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_range("month", self.month, 1, 12)?;
        validate_range("year", self.year, 1000, 9999)?;
        validate_path("output_folder", &self.output_folder)?;
        validate_positive_duration("download_timeout", self.download_timeout)?;
        validate_positive_duration("general_timeout", self.general_timeout)?;
        validate_positive_duration("step_timeout", self.step_timeout)?;
        if let Some(url) = &self.remote_url {
            validate_devtools_url("remote_url", url)?;
        }
        Ok(())
    }
}

impl ConfigProvider for CliConfig {
    fn month(&self) -> u32 {
        self.month
    }

    fn year(&self) -> i32 {
        self.year
    }

    fn output_folder(&self) -> &Path {
        &self.output_folder
    }

    fn download_timeout(&self) -> Duration {
        self.download_timeout
    }

    fn general_timeout(&self) -> Duration {
        self.general_timeout
    }

    fn time_between_steps(&self) -> Duration {
        self.time_between_steps
    }

    fn step_timeout(&self) -> Duration {
        self.step_timeout
    }
}
