use crate::utils::error::{CrawlError, Result};
use crate::utils::validation::{validate_devtools_url, validate_url, Validate};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Optional file overlay for settings that rarely change between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub browser: BrowserSection,
    #[serde(default)]
    pub portal: PortalSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrowserSection {
    pub headless: Option<bool>,
    pub chrome_executable: Option<PathBuf>,
    pub remote_url: Option<String>,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortalSection {
    pub base_url: Option<String>,
}

const ENV_VAR_PATTERN: &str = r"\$\{([^}]+)\}";

fn env_var_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(ENV_VAR_PATTERN).ok())
        .as_ref()
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CrawlError::system(path, e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        toml::from_str(&processed).map_err(|e| {
            CrawlError::invalid_input("config", "TOML", format!("TOML parsing error: {}", e))
        })
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> String {
        let Some(pattern) = env_var_pattern() else {
            return content.to_string();
        };
        pattern
            .replace_all(content, |caps: &Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        if let Some(url) = &self.portal.base_url {
            validate_url("portal.base_url", url)?;
        }
        if let Some(url) = &self.browser.remote_url {
            validate_devtools_url("browser.remote_url", url)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[browser]
headless = false
chrome_executable = "/usr/bin/chromium"
extra_args = ["--lang=pt-BR"]

[portal]
base_url = "http://localhost:8080/contracheque"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.browser.headless, Some(false));
        assert_eq!(
            config.browser.chrome_executable.as_deref(),
            Some(Path::new("/usr/bin/chromium"))
        );
        assert_eq!(config.browser.extra_args, vec!["--lang=pt-BR"]);
        assert_eq!(
            config.portal.base_url.as_deref(),
            Some("http://localhost:8080/contracheque")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert!(config.browser.headless.is_none());
        assert!(config.portal.base_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MPMS_TEST_DEVTOOLS", "ws://127.0.0.1:9222");

        let config = TomlConfig::from_toml_str(
            r#"
[browser]
remote_url = "${MPMS_TEST_DEVTOOLS}"
user_agent = "${MPMS_TEST_UNSET_VARIABLE}"
"#,
        )
        .unwrap();
        assert_eq!(config.browser.remote_url.as_deref(), Some("ws://127.0.0.1:9222"));
        assert_eq!(
            config.browser.user_agent.as_deref(),
            Some("${MPMS_TEST_UNSET_VARIABLE}")
        );

        std::env::remove_var("MPMS_TEST_DEVTOOLS");
    }

    #[test]
    fn test_config_validation() {
        let config = TomlConfig::from_toml_str(
            r#"
[portal]
base_url = "invalid-url"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = TomlConfig::from_toml_str("[portal]\nbase = \"x\"\n").unwrap_err();
        assert!(matches!(err, CrawlError::InvalidInput { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[browser]\nheadless = true\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.browser.headless, Some(true));
    }

    #[test]
    fn test_missing_file_is_a_system_error() {
        let err = TomlConfig::from_file("/nonexistent/crawler.toml").unwrap_err();
        assert!(matches!(err, CrawlError::System { .. }));
    }
}
