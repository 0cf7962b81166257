//! Run-wide state shared by every scenario, and the results file

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::api::ApiFallbackContext;
use crate::browser::{BrowserSession, WebDriverPage};
use crate::config::SuiteConfig;
use crate::error::E2eResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub feature: String,
    pub name: String,
    pub status: ScenarioStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Feature files that failed to parse; they have no scenario outcomes
    #[serde(default)]
    pub parsing_errors: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    /// A skipped scenario has an undefined or unmatched step and counts against the run.
    pub fn success(&self) -> bool {
        self.failed == 0 && self.skipped == 0 && self.parsing_errors == 0
    }
}

/// Configuration, the object API context and the lazily started browser
#[derive(Debug)]
pub struct Suite {
    config: SuiteConfig,
    api: ApiFallbackContext,
    browser: OnceCell<BrowserSession>,
    outcomes: Mutex<Vec<ScenarioOutcome>>,
    started: Instant,
}

impl Suite {
    pub fn new(config: SuiteConfig) -> E2eResult<Self> {
        Ok(Self {
            config,
            api: ApiFallbackContext::new()?,
            browser: OnceCell::new(),
            outcomes: Mutex::new(Vec::new()),
            started: Instant::now(),
        })
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiFallbackContext {
        &self.api
    }

    /// Starts Chrome on first use; API-only runs never open a browser.
    pub async fn page(&self) -> E2eResult<&WebDriverPage> {
        let session = self
            .browser
            .get_or_try_init(|| BrowserSession::start(&self.config.browser, &self.config.site_url))
            .await?;
        Ok(session.page())
    }

    pub fn record(&self, outcome: ScenarioOutcome) {
        match outcome.status {
            ScenarioStatus::Passed => info!("✓ {} ({} ms)", outcome.name, outcome.duration_ms),
            ScenarioStatus::Skipped => warn!("- {} (skipped)", outcome.name),
            ScenarioStatus::Failed => error!(
                "✗ {} - {}",
                outcome.name,
                outcome.error.as_deref().unwrap_or("step failed")
            ),
        }
        self.outcomes.lock().push(outcome);
    }

    pub fn summary(&self) -> SuiteReport {
        let results = self.outcomes.lock().clone();
        let count = |s: ScenarioStatus| results.iter().filter(|o| o.status == s).count();
        let report = SuiteReport {
            total: results.len(),
            passed: count(ScenarioStatus::Passed),
            failed: count(ScenarioStatus::Failed),
            skipped: count(ScenarioStatus::Skipped),
            parsing_errors: 0,
            duration_ms: self.started.elapsed().as_millis() as u64,
            results,
        };
        info!(
            "Scenario results: {} passed, {} failed, {} skipped ({} ms)",
            report.passed, report.failed, report.skipped, report.duration_ms
        );
        report
    }

    pub fn write_results(&self, report: &SuiteReport) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }

    /// Closes the browser if one was started.
    pub async fn shutdown(self: Arc<Self>) -> E2eResult<()> {
        match Arc::try_unwrap(self) {
            Ok(suite) => match suite.browser.into_inner() {
                Some(session) => session.close().await,
                None => Ok(()),
            },
            Err(_) => {
                warn!("Suite still shared at shutdown; chromedriver is stopped on drop");
                Ok(())
            }
        }
    }
}
