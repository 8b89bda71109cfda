//! Suite configuration
//!
//! Every field has a default so a YAML file only needs to name what differs.
//! Credentials are normally injected from the environment by the harness.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser '{}'", other))),
        }
    }
}

/// Account used to sign in. The password never shows up in debug output.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280, height: 720 }
    }
}

/// Modifier used for select-all and undo chords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Control,
    Meta,
}

impl Modifier {
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Modifier::Meta
        } else {
            Modifier::Control
        }
    }

    pub fn chord(&self, key: &str) -> String {
        match self {
            Modifier::Control => format!("Control+{}", key),
            Modifier::Meta => format!("Meta+{}", key),
        }
    }
}

impl Default for Modifier {
    fn default() -> Self {
        Self::platform_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Entry URL of the application
    pub base_url: String,

    /// Selector of the project card opened after login
    pub project_selector: String,

    pub credentials: Credentials,

    pub browser: Browser,

    pub headless: bool,

    /// Delay Playwright inserts between actions
    pub slow_mo_ms: u64,

    pub viewport: Viewport,

    /// Bound for navigation, clicks and element waits
    pub action_timeout_ms: u64,

    /// Bound for property panel expectations and the area readout
    pub property_timeout_ms: u64,

    /// Pause after opening a new plan so the surface finishes loading
    pub settle_ms: u64,

    /// Vertical band at the top of the surface covered by toolbar chrome
    pub safe_y_offset: f64,

    pub modifier: Modifier,

    /// Scenarios run concurrently, each in its own browser
    pub max_parallel: usize,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://app.snaptrude.com".to_string(),
            project_selector: String::new(),
            credentials: Credentials::default(),
            browser: Browser::Chromium,
            headless: false,
            slow_mo_ms: 500,
            viewport: Viewport::default(),
            action_timeout_ms: 30_000,
            property_timeout_ms: 5_000,
            settle_ms: 3_000,
            safe_y_offset: 150.0,
            modifier: Modifier::platform_default(),
            max_parallel: 1,
        }
    }
}

impl SuiteConfig {
    /// Parse a config from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    /// Parse a config from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Reject configs that cannot possibly drive a session
    pub fn validate(&self) -> E2eResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(E2eError::Config("base_url is empty".into()));
        }
        if self.project_selector.trim().is_empty() {
            return Err(E2eError::Config("project_selector is empty".into()));
        }
        if self.credentials.email.trim().is_empty() || self.credentials.password.is_empty() {
            return Err(E2eError::Config("account email and password are required".into()));
        }
        if self.action_timeout_ms == 0 || self.property_timeout_ms == 0 {
            return Err(E2eError::Config("timeouts must be greater than zero".into()));
        }
        if self.max_parallel == 0 {
            return Err(E2eError::Config("max_parallel must be at least 1".into()));
        }
        Ok(())
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn property_timeout(&self) -> Duration {
        Duration::from_millis(self.property_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
