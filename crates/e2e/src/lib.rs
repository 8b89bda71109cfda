//! Rectangle E2E Test Framework
//!
//! This crate drives a hosted CAD application's rectangle tool through a
//! real browser and checks what the page reports back:
//! - Spawns Playwright behind a line-oriented JSON bridge, one page per scenario
//! - Wraps selectors and mouse/keyboard gestures in a small page object
//! - Tracks each scenario's journey so illegal gesture orders fail fast
//! - Runs the scenario set with unconditional per-scenario teardown
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── launcher.launch() -> Box<dyn Automation>             │
//! │    ├── Session::authenticate / prepare_surface              │
//! │    ├── (scenario.run)(&mut Session)                         │
//! │    └── Session::close()            (every exit path)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CanvasPage (page object)                                   │
//! │    ├── login, new_plan, clear_default_shape                 │
//! │    ├── draw, select_at, delete_at, drag, undo               │
//! │    └── read_area, property_value, set_property, expect_*    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Automation (trait)                                         │
//! │    └── PlaywrightHandle  ── stdin/stdout JSON ──>  node     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod automation;
pub mod canvas;
pub mod config;
pub mod error;
pub mod format;
pub mod locators;
pub mod playwright;
pub mod runner;
pub mod scenarios;
pub mod session;

pub use automation::{Automation, AutomationLauncher, BoundingBox, MouseButton, Point, WaitState};
pub use canvas::{AreaReading, CanvasPage, PageSettings};
pub use config::SuiteConfig;
pub use error::{E2eError, E2eResult};
pub use runner::TestRunner;
pub use session::{ScenarioState, Session};
