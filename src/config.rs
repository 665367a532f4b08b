use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file structure for the payslip collector.
///
/// Lets users keep their API settings and run defaults between runs.
/// Command-line flags always take precedence over values read here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// HR API connection settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Collection parameters
    #[serde(default)]
    pub run: RunConfig,

    /// Where and how results are written
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiConfig {
    /// Partner API bearer token
    pub token: Option<String>,

    /// Partner API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Token introspection service base URL
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Timeout applied to every HTTP request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    /// 0-based page kept from each payslip document
    #[serde(default = "default_page_index")]
    pub page_index: u32,

    /// Collaborators processed at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory receiving archives, exports and reports
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,

    /// Write `run_report.json` after each collection run
    #[serde(default)]
    pub report: bool,

    /// Also write the extracted PDFs as individual files
    #[serde(default)]
    pub extract: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_base_url(),
            auth_url: default_auth_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            page_index: default_page_index(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            pretty: false,
            report: false,
            extract: false,
        }
    }
}

fn default_base_url() -> String {
    "https://partner-api.payfit.com".to_string()
}

fn default_auth_url() -> String {
    "https://oauth.payfit.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_index() -> u32 {
    1
}

fn default_concurrency() -> usize {
    1
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

const CANDIDATES: [&str; 4] = [
    "payslips.toml",
    "payslips.json",
    "payslips.yaml",
    "payslips.yml",
];

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./payslips.toml
    /// 3. ./payslips.json
    /// 4. ./payslips.yaml
    /// 5. ./payslips.yml
    /// 6. `payslip-collector/config.toml` under the platform config directory
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let user_config = dirs::config_dir().map(|dir| dir.join("payslip-collector/config.toml"));
        Self::load_from_candidates(Path::new("."), user_config.as_deref())
    }

    fn load_from_candidates(dir: &Path, user_config: Option<&Path>) -> Result<Self> {
        for candidate in &CANDIDATES {
            let path = dir.join(candidate);
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        if let Some(path) = user_config.filter(|path| path.exists()) {
            return Self::load_from_path(path);
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let config: Self = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml" | "yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
