//! Page object for the drawing canvas
//!
//! `CanvasPage` turns selector-level automation into the handful of user
//! gestures the scenarios are written in. It keeps no state of its own: the
//! surface box is queried again for every gesture because the application
//! can re-layout between operations.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::automation::{Automation, BoundingBox, MouseButton, Point, WaitState};
use crate::config::{Credentials, Modifier, SuiteConfig};
use crate::error::{E2eError, E2eResult};
use crate::format::{parse_area_text, parse_property_value};
use crate::locators::{self, PropertyField};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Knobs the page object needs from the suite config
#[derive(Debug, Clone)]
pub struct PageSettings {
    pub base_url: String,
    pub action_timeout: Duration,
    pub property_timeout: Duration,
    pub settle: Duration,
    pub safe_y_offset: f64,
    pub modifier: Modifier,
}

impl PageSettings {
    pub fn from_suite(config: &SuiteConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            action_timeout: config.action_timeout(),
            property_timeout: config.property_timeout(),
            settle: config.settle(),
            safe_y_offset: config.safe_y_offset,
            modifier: config.modifier,
        }
    }
}

impl Default for PageSettings {
    fn default() -> Self {
        Self::from_suite(&SuiteConfig::default())
    }
}

/// What the area readout showed
#[derive(Debug, Clone, PartialEq)]
pub enum AreaReading {
    /// The readout never appeared, i.e. nothing is selected
    NoSelection,
    /// The readout exists but its text is empty or not a number
    Unreadable(String),
    Measured(f64),
}

impl AreaReading {
    /// Numeric view where anything but a measurement counts as zero
    pub fn value(&self) -> f64 {
        match self {
            AreaReading::Measured(area) => *area,
            AreaReading::NoSelection | AreaReading::Unreadable(_) => 0.0,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.value() > 0.0
    }
}

impl std::fmt::Display for AreaReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AreaReading::NoSelection => write!(f, "no selection"),
            AreaReading::Unreadable(text) => write!(f, "unreadable {:?}", text),
            AreaReading::Measured(area) => write!(f, "{}", area),
        }
    }
}

pub struct CanvasPage<'a> {
    driver: &'a dyn Automation,
    settings: &'a PageSettings,
}

impl<'a> CanvasPage<'a> {
    pub fn new(driver: &'a dyn Automation, settings: &'a PageSettings) -> Self {
        Self { driver, settings }
    }

    /// Sign in and open the project whose card matches `project_selector`
    pub async fn login(&self, credentials: &Credentials, project_selector: &str) -> E2eResult<()> {
        info!("Signing in as {}", credentials.email);
        let timeout = self.settings.action_timeout;

        self.driver.goto(&self.settings.base_url).await?;
        self.driver.fill(locators::EMAIL_INPUT, &credentials.email).await?;
        self.driver.fill(locators::PASSWORD_INPUT, &credentials.password).await?;
        self.driver.click(locators::SUBMIT_BUTTON).await?;

        self.driver.wait_for(project_selector, WaitState::Visible, timeout).await?;
        self.driver.click(project_selector).await?;
        self.driver.wait_for(locators::CANVAS, WaitState::Visible, timeout).await
    }

    /// Open a fresh plan. Exactly one new-plan control must be on the page.
    pub async fn new_plan(&self) -> E2eResult<()> {
        let deadline = Instant::now() + self.settings.action_timeout;
        let mut found = self.driver.count(locators::NEW_PLAN_BUTTON).await?;
        while found != 1 && Instant::now() < deadline {
            sleep(POLL_INTERVAL).await;
            found = self.driver.count(locators::NEW_PLAN_BUTTON).await?;
        }
        if found != 1 {
            return Err(E2eError::Precondition(format!(
                "expected exactly one new-plan control, found {}",
                found
            )));
        }

        self.driver
            .wait_for(locators::CANVAS, WaitState::Visible, self.settings.action_timeout)
            .await?;
        self.driver.click(locators::NEW_PLAN_BUTTON).await
    }

    /// Remove whatever shape a new plan starts with. Nothing there is fine.
    pub async fn clear_default_shape(&self) -> E2eResult<()> {
        let Some(surface) = self.driver.bounding_box(locators::CANVAS).await? else {
            warn!("No canvas to clear");
            return Ok(());
        };

        self.driver.click(locators::SELECT_TOOL).await?;
        self.click_at(&surface, surface.center(), MouseButton::Right).await?;

        if self.driver.is_visible(locators::DELETE_BUTTON).await? {
            info!("Clearing default shape");
            self.driver.click(locators::DELETE_BUTTON).await?;
            self.wait_for_baseline().await?;
        } else {
            warn!("No default shape to clear");
        }
        Ok(())
    }

    /// Current box of the drawing surface
    pub async fn surface(&self) -> E2eResult<BoundingBox> {
        self.driver
            .bounding_box(locators::CANVAS)
            .await?
            .ok_or_else(|| E2eError::Precondition("Canvas not ready".into()))
    }

    /// Draw a rectangle between two opposite corners
    pub async fn draw(&self, from: Point, to: Point) -> E2eResult<()> {
        let surface = self.surface().await?;
        debug!("Drawing rectangle {:?} -> {:?}", from, to);

        self.driver.click(locators::RECTANGLE_TOOL).await?;
        self.click_at(&surface, from, MouseButton::Left).await?;
        self.click_at(&surface, to, MouseButton::Left).await
    }

    /// Read the area of the selected shape
    pub async fn read_area(&self) -> E2eResult<AreaReading> {
        match self
            .driver
            .wait_for(locators::AREA_TEXT, WaitState::Visible, self.settings.property_timeout)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_timeout() => return Ok(AreaReading::NoSelection),
            Err(e) => return Err(e),
        }

        let text = self.driver.text_content(locators::AREA_TEXT).await?.unwrap_or_default();
        Ok(match parse_area_text(&text) {
            Some(area) => AreaReading::Measured(area),
            None => AreaReading::Unreadable(text),
        })
    }

    pub async fn select_at(&self, point: Point) -> E2eResult<()> {
        let surface = self.surface().await?;
        self.driver.click(locators::SELECT_TOOL).await?;
        self.click_at(&surface, point, MouseButton::Left).await
    }

    /// Delete the shape under `point` through its context menu
    pub async fn delete_at(&self, point: Point) -> E2eResult<()> {
        let surface = self.surface().await?;
        self.driver.click(locators::SELECT_TOOL).await?;
        self.click_at(&surface, point, MouseButton::Right).await?;

        self.driver
            .wait_for(locators::DELETE_BUTTON, WaitState::Visible, self.settings.action_timeout)
            .await?;
        self.driver.click(locators::DELETE_BUTTON).await?;
        self.wait_for_baseline().await
    }

    /// Current text of a property input. Waits at most `property_timeout`
    /// for the input to show up before reading it.
    pub async fn property_value(&self, field: PropertyField) -> E2eResult<String> {
        let selector = field.selector();
        self.driver
            .wait_for(&selector, WaitState::Visible, self.settings.property_timeout)
            .await?;
        self.driver.input_value(&selector).await
    }

    pub async fn property_number(&self, field: PropertyField) -> E2eResult<f64> {
        let text = self.property_value(field).await?;
        parse_property_value(&text).ok_or_else(|| {
            E2eError::assertion(format!("{} is numeric", field), "a number", format!("{:?}", text))
        })
    }

    /// Overwrite a property with the keyboard and confirm with Enter
    pub async fn set_property(&self, field: PropertyField, value: &str) -> E2eResult<()> {
        let selector = field.selector();
        debug!("Setting {} to {}", field, value);

        self.driver.click(&selector).await?;
        self.driver
            .press(Some(&selector), &self.settings.modifier.chord("a"))
            .await?;
        self.driver.press(Some(&selector), "Backspace").await?;
        self.driver.fill(&selector, value).await?;
        self.driver.press(Some(&selector), "Enter").await
    }

    pub async fn expect_property_visible(&self, field: PropertyField) -> E2eResult<()> {
        self.driver
            .wait_for(&field.selector(), WaitState::Visible, self.settings.property_timeout)
            .await
    }

    /// Wait until the property shows exactly `expected`
    pub async fn expect_property(&self, field: PropertyField, expected: &str) -> E2eResult<()> {
        let selector = field.selector();
        let deadline = Instant::now() + self.settings.property_timeout;
        loop {
            // Reading an absent input would block for the full action timeout
            let actual = if self.driver.count(&selector).await? == 0 {
                "<absent>".to_string()
            } else {
                match self.driver.input_value(&selector).await {
                    Ok(value) => value,
                    Err(e) => format!("<{}>", e),
                }
            };
            if actual == expected {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(E2eError::assertion(format!("{} value", field), expected, actual));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait until no input for the property is on the page
    pub async fn expect_property_absent(&self, field: PropertyField) -> E2eResult<()> {
        let selector = field.selector();
        let deadline = Instant::now() + self.settings.property_timeout;
        loop {
            let count = self.driver.count(&selector).await?;
            if count == 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(E2eError::assertion(format!("{} inputs on page", field), 0, count));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn enter_design_edit(&self) -> E2eResult<()> {
        self.driver.click(locators::DESIGN_EDIT_TOOL).await
    }

    /// Press at `from`, move by the given delta and release
    pub async fn drag(&self, from: Point, dx: f64, dy: f64) -> E2eResult<()> {
        let surface = self.surface().await?;
        let to = from.offset(dx, dy);
        self.warn_if_reserved(from);
        self.warn_if_reserved(to);

        let (start_x, start_y) = surface.to_viewport(from);
        let (end_x, end_y) = surface.to_viewport(to);
        debug!("Dragging ({:.0},{:.0}) -> ({:.0},{:.0})", start_x, start_y, end_x, end_y);

        self.driver.mouse_move(start_x, start_y).await?;
        self.driver.mouse_down().await?;
        self.driver.mouse_move(end_x, end_y).await?;
        self.driver.mouse_up().await
    }

    pub async fn undo(&self) -> E2eResult<()> {
        self.driver.press(None, &self.settings.modifier.chord("z")).await
    }

    async fn click_at(
        &self,
        surface: &BoundingBox,
        point: Point,
        button: MouseButton,
    ) -> E2eResult<()> {
        self.warn_if_reserved(point);
        let (x, y) = surface.to_viewport(point);
        self.driver.mouse_click(x, y, button).await
    }

    async fn wait_for_baseline(&self) -> E2eResult<()> {
        self.driver
            .wait_for(locators::BASELINE_MARKER, WaitState::Visible, self.settings.action_timeout)
            .await
    }

    fn warn_if_reserved(&self, point: Point) {
        if point.y < self.settings.safe_y_offset {
            warn!(
                "Gesture at y={:.0} lands in the top {:.0}px reserved for toolbar chrome",
                point.y, self.settings.safe_y_offset
            );
        }
    }
}
