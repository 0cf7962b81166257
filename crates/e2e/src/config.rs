//! Suite configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{E2eError, E2eResult};

pub const DEFAULT_SITE_URL: &str = "https://demoqa.com";
pub const DEFAULT_API_BASE_URL: &str = "https://api.restful-api.dev";

/// Configuration for one suite run
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Base URL of the site under test
    pub site_url: String,

    /// Base URL of the object API
    pub api_base_url: String,

    /// Browser session settings
    pub browser: BrowserConfig,

    /// Wait budgets
    pub timeouts: Timeouts,

    /// Output directory for results
    pub output_dir: PathBuf,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            browser: BrowserConfig::default(),
            timeouts: Timeouts::default(),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

/// Browser session settings
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Existing WebDriver endpoint; when unset a chromedriver is spawned
    pub webdriver_url: Option<String>,

    /// chromedriver binary used when spawning
    pub chromedriver: PathBuf,

    /// Where Chrome saves downloads
    pub downloads_dir: PathBuf,

    pub viewport_width: u32,
    pub viewport_height: u32,
    pub headless: bool,

    /// Timeout for chromedriver startup
    pub startup_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: None,
            chromedriver: PathBuf::from("chromedriver"),
            downloads_dir: PathBuf::from("target/e2e-downloads"),
            viewport_width: 1366,
            viewport_height: 768,
            headless: true,
            startup_timeout: Duration::from_secs(30),
        }
    }
}

/// Wait budgets used by every DOM-dependent read
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Single DOM reads and clicks
    pub command: Duration,

    /// Post-mutation assertions (row counts, collapse)
    pub ui_settle: Duration,

    /// Full page navigation
    pub page_load: Duration,

    /// Files appearing on disk
    pub file_io: Duration,

    /// Fixed grid settle delay
    pub grid_settle: Duration,

    /// Delay between polls
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command: Duration::from_secs(10),
            ui_settle: Duration::from_secs(15),
            page_load: Duration::from_secs(90),
            file_io: Duration::from_secs(40),
            grid_settle: Duration::from_millis(120),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl Timeouts {
    pub fn command_budget(&self) -> Budget {
        Budget::new(self.command, self.poll_interval)
    }

    pub fn settle_budget(&self) -> Budget {
        Budget::new(self.ui_settle, self.poll_interval)
    }

    pub fn page_load_budget(&self) -> Budget {
        Budget::new(self.page_load, self.poll_interval)
    }

    pub fn file_budget(&self) -> Budget {
        Budget::new(self.file_io, self.poll_interval)
    }
}

/// Timeout plus polling interval for one bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Budget {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Command-line options, flattened into the scenario runner's CLI
#[derive(clap::Args, Debug, Clone)]
pub struct SuiteArgs {
    /// Base URL of the site under test
    #[arg(long, env = "DEMOQA_BASE_URL", default_value = DEFAULT_SITE_URL)]
    pub site_url: String,

    /// Base URL of the object API
    #[arg(long, env = "API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,

    /// Connect to an already running WebDriver instead of spawning chromedriver
    #[arg(long, env = "WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,

    /// chromedriver binary
    #[arg(long, env = "CHROMEDRIVER", default_value = "chromedriver")]
    pub chromedriver: PathBuf,

    /// Download directory for the browser
    #[arg(long, env = "E2E_DOWNLOADS_DIR", default_value = "target/e2e-downloads")]
    pub downloads_dir: PathBuf,

    /// Run Chrome headless
    #[arg(long, env = "E2E_HEADLESS", default_value = "true", action = clap::ArgAction::Set)]
    pub headless: bool,

    /// Output directory for results
    #[arg(long, env = "E2E_OUTPUT_DIR", default_value = "test-results")]
    pub output: PathBuf,

    /// Run the scenarios against the live site; without it the runner exits cleanly
    #[arg(long, env = "DEMOQA_E2E")]
    pub live: bool,
}

impl SuiteArgs {
    pub fn into_config(self) -> E2eResult<SuiteConfig> {
        let site_url = normalize_base(&self.site_url)?;
        let api_base_url = normalize_base(&self.api_base_url)?;

        Ok(SuiteConfig {
            site_url,
            api_base_url,
            browser: BrowserConfig {
                webdriver_url: self.webdriver_url,
                chromedriver: self.chromedriver,
                downloads_dir: self.downloads_dir,
                headless: self.headless,
                ..Default::default()
            },
            output_dir: self.output,
            ..Default::default()
        })
    }
}

/// Strips trailing slashes so paths can be appended with `format!("{base}{path}")`.
pub fn normalize_base(url: &str) -> E2eResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(E2eError::InvalidConfig(format!(
            "base url must be http(s): {url:?}"
        )));
    }
    Ok(trimmed.to_string())
}
