use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::{LeadScrapeError, LeadScrapeResult};
use crate::export::ExportFormat;
use crate::logging::LoggingConfig;

/// Upper bound for a single rate-limit pause
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scraping: ScrapingConfig,
    pub rate_limit: RateLimitConfig,
    pub export: ExportConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
}

/// Which implementation of the browsing capability to open sessions with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// Fetch the results page over HTTP and query the static snapshot
    Http,
    /// Drive headless Chromium through Playwright (cargo feature `browser`)
    Browser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    pub backend: SessionBackend,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub page_load_timeout_secs: u64,
    pub wait_timeout_secs: u64,
    pub max_results: usize,
    pub max_scroll_attempts: usize,
    pub scroll_pause_ms: u64,
    pub click_delay_ms: u64,
    /// Label set for the Maps address/phone lookups: default, es, fr or de
    pub locale: String,
    pub extract_emails: bool,
    pub user_agents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub default_format: ExportFormat,
    pub output_directory: PathBuf,
    pub batch_output_directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::Http,
            headless: true,
            window_width: 1920,
            window_height: 1080,
            page_load_timeout_secs: 30,
            wait_timeout_secs: 10,
            max_results: 50,
            max_scroll_attempts: 3,
            scroll_pause_ms: 2000,
            click_delay_ms: 3000,
            locale: "default".to_string(),
            extract_emails: false,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            ],
        }
    }
}

impl ScrapingConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }

    pub fn click_delay(&self) -> Duration {
        Duration::from_millis(self.click_delay_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: 1.0,
            max_delay_secs: 3.0,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_format: ExportFormat::Both,
            output_directory: PathBuf::from("./output"),
            batch_output_directory: PathBuf::from("./batch_output"),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

impl AppConfig {
    /// Load configuration from the platform config directory, or defaults if none exists
    pub async fn load() -> LeadScrapeResult<Self> {
        let config_path = get_config_path();

        let mut config = if config_path.exists() {
            Self::read_file(&config_path).await?
        } else {
            info!("No configuration file found, using defaults");
            Self::default()
        };

        ConfigOverrides::apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> LeadScrapeResult<Self> {
        let mut config = Self::read_file(path.as_ref()).await?;
        ConfigOverrides::apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    async fn read_file(path: &Path) -> LeadScrapeResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| LeadScrapeError::InvalidConfig {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: AppConfig = toml::from_str(&content).map_err(|e| LeadScrapeError::InvalidConfig {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> LeadScrapeResult<()> {
        let rate = &self.rate_limit;
        for delay in [rate.min_delay_secs, rate.max_delay_secs] {
            if !delay.is_finite() || delay > MAX_DELAY_SECS {
                return Err(LeadScrapeError::config(format!(
                    "Rate limit delays must be finite and at most {} seconds, got {}",
                    MAX_DELAY_SECS, delay
                )));
            }
        }
        if rate.min_delay_secs < 0.0 || rate.max_delay_secs < 0.0 {
            return Err(LeadScrapeError::config("Rate limit delays must not be negative"));
        }
        if rate.min_delay_secs > rate.max_delay_secs {
            return Err(LeadScrapeError::config(format!(
                "Rate limit min_delay_secs ({}) exceeds max_delay_secs ({})",
                rate.min_delay_secs, rate.max_delay_secs
            )));
        }

        if self.scraping.max_results == 0 {
            return Err(LeadScrapeError::config("Scraping max_results must be > 0"));
        }

        if self.scraping.wait_timeout_secs == 0 || self.scraping.page_load_timeout_secs == 0 {
            return Err(LeadScrapeError::config("Scraping timeouts must be > 0"));
        }

        if self.scraping.user_agents.is_empty() {
            return Err(LeadScrapeError::config("At least one user agent must be configured"));
        }

        if self.batch.workers == 0 {
            return Err(LeadScrapeError::config("Batch workers must be > 0"));
        }

        Ok(())
    }
}

/// Get the configuration file path
fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "leadscrape", "leadscrape")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("config.toml"))
}

/// Environment-based configuration overrides
pub struct ConfigOverrides;

impl ConfigOverrides {
    /// Apply `LEADSCRAPE_*` environment variable overrides to configuration
    pub fn apply(config: &mut AppConfig) {
        Self::apply_from(config, |key| std::env::var(key).ok());
    }

    fn apply_from(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(backend) = lookup("LEADSCRAPE_BACKEND") {
            match backend.to_lowercase().as_str() {
                "http" => config.scraping.backend = SessionBackend::Http,
                "browser" => config.scraping.backend = SessionBackend::Browser,
                _ => {}
            }
        }

        if let Some(delay) = lookup("LEADSCRAPE_MIN_DELAY").and_then(|v| v.parse::<f64>().ok()) {
            config.rate_limit.min_delay_secs = delay;
        }

        if let Some(delay) = lookup("LEADSCRAPE_MAX_DELAY").and_then(|v| v.parse::<f64>().ok()) {
            config.rate_limit.max_delay_secs = delay;
        }

        if let Some(max) = lookup("LEADSCRAPE_MAX_RESULTS").and_then(|v| v.parse::<usize>().ok()) {
            config.scraping.max_results = max;
        }

        if let Some(workers) = lookup("LEADSCRAPE_WORKERS").and_then(|v| v.parse::<usize>().ok()) {
            config.batch.workers = workers;
        }

        if let Some(dir) = lookup("LEADSCRAPE_OUTPUT_DIR") {
            config.export.output_directory = PathBuf::from(dir);
        }

        if let Some(level) = lookup("LEADSCRAPE_LOG_LEVEL") {
            config.logging.level = level;
        }
    }
}
