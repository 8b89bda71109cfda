//! Main test runner that gives every scenario its own session

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::automation::AutomationLauncher;
use crate::canvas::PageSettings;
use crate::config::SuiteConfig;
use crate::error::{E2eError, E2eResult};
use crate::scenarios::{self, Scenario};
use crate::session::{ScenarioState, Session};

/// Result of running a single scenario
#[derive(Debug, Clone)]
pub struct TestResult {
    pub id: String,
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,

    /// Where the journey was when it ended, before teardown
    pub final_state: ScenarioState,

    pub error: Option<String>,
}

/// Result of running a set of scenarios
#[derive(Debug, Clone)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,

    /// Registered scenarios left out by a filter
    pub skipped: usize,

    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: SuiteConfig,
    settings: PageSettings,
    launcher: Arc<dyn AutomationLauncher>,
}

impl TestRunner {
    pub fn new(config: SuiteConfig, launcher: Arc<dyn AutomationLauncher>) -> Self {
        let settings = PageSettings::from_suite(&config);
        Self {
            config,
            settings,
            launcher,
        }
    }

    /// Run every registered scenario
    pub async fn run_all(&self) -> TestSuiteResult {
        let selected: Vec<&Scenario> = scenarios::all().iter().collect();
        self.run_scenarios(&selected).await
    }

    /// Run scenarios carrying a tag
    pub async fn run_tagged(&self, tag: &str) -> TestSuiteResult {
        let selected = scenarios::tagged(tag);
        if selected.is_empty() {
            warn!("No scenarios tagged '{}'", tag);
        }
        self.run_scenarios(&selected).await
    }

    /// Run a specific scenario by id or name
    pub async fn run_test(&self, id_or_name: &str) -> E2eResult<TestSuiteResult> {
        let scenario = scenarios::find(id_or_name)
            .ok_or_else(|| E2eError::ScenarioNotFound(id_or_name.to_string()))?;
        Ok(self.run_scenarios(&[scenario]).await)
    }

    /// Run a list of scenarios. Results keep the order of `selected`.
    pub async fn run_scenarios(&self, selected: &[&Scenario]) -> TestSuiteResult {
        let start = Instant::now();
        let parallel = self.config.max_parallel.max(1);

        if parallel > 1 {
            warn!(
                "Running up to {} scenarios at once; they share project state \
                 unless each has its own project",
                parallel
            );
        }
        info!("Running {} scenario(s)...", selected.len());

        let mut indexed: Vec<(usize, TestResult)> = stream::iter(selected.iter().enumerate())
            .map(|(index, scenario)| async move { (index, self.run_scenario(scenario).await) })
            .buffer_unordered(parallel)
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);
        let results: Vec<TestResult> = indexed.into_iter().map(|(_, result)| result).collect();

        let passed = results.iter().filter(|r| r.success).count();
        let failed = results.len() - passed;
        let skipped = scenarios::all().len().saturating_sub(selected.len());
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        TestSuiteResult {
            total: results.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        }
    }

    /// Run one scenario in a fresh session. The session is closed on every path.
    pub async fn run_scenario(&self, scenario: &Scenario) -> TestResult {
        let started_at = Utc::now();
        let start = Instant::now();
        debug!("Running scenario: {} {}", scenario.id, scenario.name);

        let (final_state, outcome) = match self.launcher.launch().await {
            Ok(driver) => {
                let mut session = Session::new(driver, self.settings.clone());
                let body = self.execute(&mut session, scenario).await;
                let final_state = session.state();
                let teardown = session.close().await;
                (final_state, body.and(teardown))
            }
            Err(e) => (ScenarioState::Unauthenticated, Err(e)),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let error = outcome.err().map(|e| e.to_string());
        match &error {
            None => info!("✓ {} {} ({} ms)", scenario.id, scenario.name, duration_ms),
            Some(e) => error!("✗ {} {} - {}", scenario.id, scenario.name, e),
        }

        TestResult {
            id: scenario.id.to_string(),
            name: scenario.name.to_string(),
            success: error.is_none(),
            duration_ms,
            started_at,
            final_state,
            error,
        }
    }

    async fn execute(&self, session: &mut Session, scenario: &Scenario) -> E2eResult<()> {
        session
            .authenticate(&self.config.credentials, &self.config.project_selector)
            .await?;
        session.prepare_surface().await?;
        (scenario.run)(session).await
    }
}
