//! Scenario session
//!
//! A `Session` owns one automation handle for the life of a scenario and
//! tracks where the journey is:
//!
//! ```text
//! Unauthenticated -> Authenticated -> EmptySurface -> ShapeDrawn -> ShapeSelected
//!                                                          |             |
//!                                                          |   Edited | Resized | Deleted -> Undone
//!                                                          +-----------------------------------+
//! any state -> Closed
//! ```
//!
//! Gestures check the table before touching the page, so an out-of-order
//! journey (resize with nothing selected, undo without a delete) fails
//! immediately instead of producing a confusing UI assertion later.

use std::fmt;

use tracing::{debug, info, warn};

use crate::automation::{Automation, BoundingBox, Point};
use crate::canvas::{AreaReading, CanvasPage, PageSettings};
use crate::config::Credentials;
use crate::error::{E2eError, E2eResult};
use crate::locators::PropertyField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioState {
    Unauthenticated,
    Authenticated,
    EmptySurface,
    ShapeDrawn,
    ShapeSelected,
    Edited,
    Resized,
    Deleted,
    Undone,
    Closed,
}

impl ScenarioState {
    /// States in which the drawing surface is open and usable
    pub fn has_surface(self) -> bool {
        !matches!(
            self,
            ScenarioState::Unauthenticated | ScenarioState::Authenticated | ScenarioState::Closed
        )
    }

    /// States in which the property panel refers to a selected shape
    pub fn has_selection(self) -> bool {
        matches!(
            self,
            ScenarioState::ShapeSelected | ScenarioState::Edited | ScenarioState::Resized
        )
    }

    pub fn can_transition_to(self, next: ScenarioState) -> bool {
        use ScenarioState::*;

        match (self, next) {
            (_, Closed) => true,
            (Closed, _) => false,
            (Unauthenticated, Authenticated) => true,
            (Authenticated, EmptySurface) => true,
            (from, ShapeDrawn) => from.has_surface(),
            (from, ShapeSelected) => from.has_surface() && from != Deleted,
            (ShapeSelected | Edited, Edited) => true,
            (ShapeSelected | Resized, Resized) => true,
            (ShapeDrawn | ShapeSelected | Edited | Resized | Undone, Deleted) => true,
            (Deleted, Undone) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One scenario's browser session and journey state
pub struct Session {
    driver: Box<dyn Automation>,
    settings: PageSettings,
    state: ScenarioState,
}

impl Session {
    pub fn new(driver: Box<dyn Automation>, settings: PageSettings) -> Self {
        Self {
            driver,
            settings,
            state: ScenarioState::Unauthenticated,
        }
    }

    pub fn state(&self) -> ScenarioState {
        self.state
    }

    pub fn page(&self) -> CanvasPage<'_> {
        CanvasPage::new(self.driver.as_ref(), &self.settings)
    }

    fn check_transition(&self, next: ScenarioState) -> E2eResult<()> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(E2eError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            })
        }
    }

    fn enter(&mut self, next: ScenarioState) {
        debug!("Scenario state {} -> {}", self.state, next);
        self.state = next;
    }

    fn require(&self, operation: &str, allowed: fn(ScenarioState) -> bool) -> E2eResult<()> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(E2eError::InvalidState {
                state: self.state.to_string(),
                operation: operation.to_string(),
            })
        }
    }

    pub async fn authenticate(
        &mut self,
        credentials: &Credentials,
        project_selector: &str,
    ) -> E2eResult<()> {
        self.check_transition(ScenarioState::Authenticated)?;
        self.page().login(credentials, project_selector).await?;
        self.enter(ScenarioState::Authenticated);
        Ok(())
    }

    /// New plan, settle, then clear any default shape
    pub async fn prepare_surface(&mut self) -> E2eResult<()> {
        self.check_transition(ScenarioState::EmptySurface)?;
        self.page().new_plan().await?;
        tokio::time::sleep(self.settings.settle).await;
        self.page().clear_default_shape().await?;
        self.enter(ScenarioState::EmptySurface);
        Ok(())
    }

    pub async fn surface(&self) -> E2eResult<BoundingBox> {
        self.require("query surface", ScenarioState::has_surface)?;
        self.page().surface().await
    }

    pub async fn draw(&mut self, from: Point, to: Point) -> E2eResult<()> {
        self.check_transition(ScenarioState::ShapeDrawn)?;
        self.page().draw(from, to).await?;
        self.enter(ScenarioState::ShapeDrawn);
        Ok(())
    }

    /// Click with the selection tool. After a delete this only probes the
    /// emptied spot, so the journey stays in `Deleted` until an undo.
    pub async fn select_at(&mut self, point: Point) -> E2eResult<()> {
        if self.state == ScenarioState::Deleted {
            return self.page().select_at(point).await;
        }
        self.check_transition(ScenarioState::ShapeSelected)?;
        self.page().select_at(point).await?;
        self.enter(ScenarioState::ShapeSelected);
        Ok(())
    }

    pub async fn delete_at(&mut self, point: Point) -> E2eResult<()> {
        self.check_transition(ScenarioState::Deleted)?;
        self.page().delete_at(point).await?;
        self.enter(ScenarioState::Deleted);
        Ok(())
    }

    pub async fn undo(&mut self) -> E2eResult<()> {
        self.check_transition(ScenarioState::Undone)?;
        self.page().undo().await?;
        self.enter(ScenarioState::Undone);
        Ok(())
    }

    pub async fn read_area(&self) -> E2eResult<AreaReading> {
        self.require("read area", ScenarioState::has_surface)?;
        self.page().read_area().await
    }

    pub async fn expect_property_visible(&self, field: PropertyField) -> E2eResult<()> {
        self.require("inspect property", ScenarioState::has_selection)?;
        self.page().expect_property_visible(field).await
    }

    pub async fn property_value(&self, field: PropertyField) -> E2eResult<String> {
        self.require("read property", ScenarioState::has_selection)?;
        self.page().property_value(field).await
    }

    pub async fn property_number(&self, field: PropertyField) -> E2eResult<f64> {
        self.require("read property", ScenarioState::has_selection)?;
        self.page().property_number(field).await
    }

    pub async fn expect_property(&self, field: PropertyField, expected: &str) -> E2eResult<()> {
        self.require("inspect property", ScenarioState::has_selection)?;
        self.page().expect_property(field, expected).await
    }

    pub async fn expect_property_absent(&self, field: PropertyField) -> E2eResult<()> {
        self.require("inspect property", ScenarioState::has_surface)?;
        self.page().expect_property_absent(field).await
    }

    pub async fn set_property(&mut self, field: PropertyField, value: &str) -> E2eResult<()> {
        self.check_transition(ScenarioState::Edited)?;
        self.page().set_property(field, value).await?;
        self.enter(ScenarioState::Edited);
        Ok(())
    }

    pub async fn enter_design_edit(&self) -> E2eResult<()> {
        self.require("enter design edit", |state| state == ScenarioState::ShapeSelected)?;
        self.page().enter_design_edit().await
    }

    /// Drag a resize handle of the selected shape
    pub async fn drag_handle(&mut self, handle: Point, dx: f64, dy: f64) -> E2eResult<()> {
        self.check_transition(ScenarioState::Resized)?;
        self.page().drag(handle, dx, dy).await?;
        self.enter(ScenarioState::Resized);
        Ok(())
    }

    /// Release the browser. Safe to call more than once.
    pub async fn close(&mut self) -> E2eResult<()> {
        if self.state == ScenarioState::Closed {
            return Ok(());
        }
        let result = self.driver.close().await;
        if let Err(e) = &result {
            warn!("Closing session failed: {}", e);
        }
        info!("Session closed in state {}", self.state);
        self.enter(ScenarioState::Closed);
        result
    }
}
