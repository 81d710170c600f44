use crate::utils::error::{CrawlError, Result};
use std::path::Path;
use std::time::Duration;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(CrawlError::invalid_input(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(CrawlError::invalid_input(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(CrawlError::invalid_input(
            field_name,
            url_str,
            format!("Invalid URL format: {}", e),
        )),
    }
}

/// DevTools endpoints: `ws(s)://` or `http(s)://`.
pub fn validate_devtools_url(field_name: &str, url_str: &str) -> Result<()> {
    match Url::parse(url_str) {
        Ok(url) if matches!(url.scheme(), "ws" | "wss" | "http" | "https") => Ok(()),
        Ok(url) => Err(CrawlError::invalid_input(
            field_name,
            url_str,
            format!("Unsupported URL scheme: {}", url.scheme()),
        )),
        Err(e) => Err(CrawlError::invalid_input(
            field_name,
            url_str,
            format!("Invalid URL format: {}", e),
        )),
    }
}

pub fn validate_path(field_name: &str, path: &Path) -> Result<()> {
    let display = path.display();
    if path.as_os_str().is_empty() {
        return Err(CrawlError::invalid_input(field_name, display, "Path cannot be empty"));
    }

    if path.to_string_lossy().contains('\0') {
        return Err(CrawlError::invalid_input(field_name, display, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(CrawlError::invalid_input(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

pub fn validate_positive_duration(field_name: &str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(CrawlError::invalid_input(
            field_name,
            humantime::format_duration(value),
            "Duration must be greater than zero",
        ));
    }
    Ok(())
}

/// Parses integers the way they arrive from the environment: surrounding
/// whitespace and leading zeros allowed.
pub fn parse_number<T: std::str::FromStr>(field_name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| CrawlError::invalid_input(field_name, raw, e.to_string()))
}
