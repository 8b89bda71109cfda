//! Browser automation capability
//!
//! The facade never talks to a browser engine directly. It consumes this
//! trait, which the Playwright bridge implements for live runs and the
//! in-memory application implements for offline tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// Pixel rectangle of an element within the viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Center of the box, relative to its own origin
    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    /// Convert a box-relative point into viewport coordinates
    pub fn to_viewport(&self, point: Point) -> (f64, f64) {
        (self.x + point.x, self.y + point.y)
    }
}

/// A point relative to the drawing surface origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

/// Primitive operations over one isolated browser page.
///
/// Selectors use Playwright syntax (CSS, XPath starting with `//`, `text=`).
/// Every wait is bounded; exceeding the bound yields `E2eError::Timeout`.
#[async_trait]
pub trait Automation: Send + Sync {
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()>;

    async fn click(&self, selector: &str) -> E2eResult<()>;

    /// Press a key chord on an element, or on the page keyboard when no selector is given
    async fn press(&self, selector: Option<&str>, key: &str) -> E2eResult<()>;

    async fn wait_for(&self, selector: &str, state: WaitState, timeout: Duration)
        -> E2eResult<()>;

    async fn count(&self, selector: &str) -> E2eResult<usize>;

    async fn is_visible(&self, selector: &str) -> E2eResult<bool>;

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>>;

    async fn input_value(&self, selector: &str) -> E2eResult<String>;

    async fn bounding_box(&self, selector: &str) -> E2eResult<Option<BoundingBox>>;

    async fn mouse_click(&self, x: f64, y: f64, button: MouseButton) -> E2eResult<()>;

    async fn mouse_move(&self, x: f64, y: f64) -> E2eResult<()>;

    async fn mouse_down(&self) -> E2eResult<()>;

    async fn mouse_up(&self) -> E2eResult<()>;

    /// Release the page and its browser. Calling it twice is harmless.
    async fn close(&self) -> E2eResult<()>;
}

/// Produces a fresh, isolated automation handle for each scenario
#[async_trait]
pub trait AutomationLauncher: Send + Sync {
    async fn launch(&self) -> E2eResult<Box<dyn Automation>>;
}
