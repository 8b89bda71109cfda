//! Rectangle feature scenarios
//!
//! Each scenario starts from a signed-in session with an empty surface and
//! runs one user journey against it. The runner owns setup and teardown.

use futures::future::BoxFuture;
use tracing::info;

use crate::automation::Point;
use crate::error::{E2eError, E2eResult};
use crate::format::format_property_value;
use crate::locators::PropertyField;
use crate::session::Session;

/// Half the side of the square every scenario draws, in pixels
pub const HALF_SIZE: f64 = 50.0;

/// How far resize handles are dragged, in pixels
pub const HANDLE_DRAG: f64 = 20.0;

/// Value typed into property fields
pub const EDITED_VALUE: f64 = 500_000.0;

pub type ScenarioFn = for<'a> fn(&'a mut Session) -> BoxFuture<'a, E2eResult<()>>;

pub struct Scenario {
    pub id: &'static str,
    pub name: &'static str,
    pub tags: &'static [&'static str],
    pub run: ScenarioFn,
}

impl Scenario {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Match on id (`TC004`) or full name
    pub fn matches(&self, id_or_name: &str) -> bool {
        self.id.eq_ignore_ascii_case(id_or_name) || self.name == id_or_name
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("tags", &self.tags)
            .finish()
    }
}

static SCENARIOS: [Scenario; 8] = [
    Scenario {
        id: "TC001",
        name: "Draw Basic Rectangle",
        tags: &["draw", "smoke"],
        run: draw_basic_rectangle,
    },
    Scenario {
        id: "TC002",
        name: "Modify Rectangle Width via Property Panel",
        tags: &["property"],
        run: modify_width,
    },
    Scenario {
        id: "TC003",
        name: "Modify Rectangle Length via Property Panel",
        tags: &["property"],
        run: modify_length,
    },
    Scenario {
        id: "TC004",
        name: "Resize Rectangle Length via Top Handle Drag (Design Mode)",
        tags: &["resize"],
        run: resize_length_with_top_handle,
    },
    Scenario {
        id: "TC005",
        name: "Resize Rectangle Width via Side Handle Drag (Design Mode)",
        tags: &["resize"],
        run: resize_width_with_side_handle,
    },
    Scenario {
        id: "TC006",
        name: "Delete Rectangle and Verify Area Is Zero",
        tags: &["delete"],
        run: delete_clears_area,
    },
    Scenario {
        id: "TC007",
        name: "Undo Rectangle Deletion and Validate Restoration",
        tags: &["delete", "undo"],
        run: undo_restores_deleted,
    },
    Scenario {
        id: "TC008",
        name: "Resize Rectangle via Corner Handle Drag",
        tags: &["resize"],
        run: resize_with_corner_handle,
    },
];

/// Every registered scenario, in suite order
pub fn all() -> &'static [Scenario] {
    &SCENARIOS
}

pub fn find(id_or_name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.matches(id_or_name))
}

pub fn tagged(tag: &str) -> Vec<&'static Scenario> {
    SCENARIOS.iter().filter(|s| s.has_tag(tag)).collect()
}

/// The square drawn at the middle of the surface
#[derive(Debug, Clone, Copy)]
pub struct Square {
    pub center: Point,
    pub half: f64,
}

impl Square {
    pub fn top_left(&self) -> Point {
        self.center.offset(-self.half, -self.half)
    }

    pub fn bottom_right(&self) -> Point {
        self.center.offset(self.half, self.half)
    }

    pub fn top_middle(&self) -> Point {
        self.center.offset(0.0, -self.half)
    }

    pub fn right_middle(&self) -> Point {
        self.center.offset(self.half, 0.0)
    }
}

async fn draw_centered_square(session: &mut Session) -> E2eResult<Square> {
    let surface = session.surface().await?;
    let square = Square {
        center: surface.center(),
        half: HALF_SIZE,
    };
    session.draw(square.top_left(), square.bottom_right()).await?;
    Ok(square)
}

async fn draw_and_select(session: &mut Session) -> E2eResult<Square> {
    let square = draw_centered_square(session).await?;
    session.select_at(square.center).await?;
    Ok(square)
}

fn ensure(condition: bool, failure: impl FnOnce() -> E2eError) -> E2eResult<()> {
    if condition {
        Ok(())
    } else {
        Err(failure())
    }
}

fn draw_basic_rectangle(session: &mut Session) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        draw_centered_square(session).await?;

        let area = session.read_area().await?;
        info!("Area after drawing: {}", area);
        ensure(area.is_positive(), || E2eError::assertion("area after drawing", "> 0", &area))
    })
}

async fn modify_property(session: &mut Session, field: PropertyField) -> E2eResult<()> {
    draw_and_select(session).await?;
    session.expect_property_visible(field).await?;

    session
        .set_property(field, &format!("{}", EDITED_VALUE))
        .await?;
    session
        .expect_property(field, &format_property_value(EDITED_VALUE))
        .await
}

fn modify_width(session: &mut Session) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(modify_property(session, PropertyField::Width))
}

fn modify_length(session: &mut Session) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(modify_property(session, PropertyField::Length))
}

/// Drag one handle in design-edit mode, reselect beyond the old edge and
/// check the dimension grew
async fn resize_in_design_mode(
    session: &mut Session,
    field: PropertyField,
    handle: fn(&Square) -> Point,
    (dx, dy): (f64, f64),
) -> E2eResult<()> {
    let square = draw_and_select(session).await?;
    session.expect_property_visible(field).await?;
    let before = session.property_number(field).await?;

    session.enter_design_edit().await?;
    session.drag_handle(handle(&square), dx, dy).await?;

    // Just past the original edge, inside the grown shape
    let reselect = handle(&square).offset(nudge(dx), nudge(dy));
    session.select_at(reselect).await?;
    let after = session.property_number(field).await?;
    info!("{}: {} -> {}", field, before, after);

    ensure(after > before, || {
        E2eError::assertion(format!("{} after handle drag", field), format!("> {}", before), after)
    })
}

/// Ten pixels in the direction of a drag, or none across the drag
fn nudge(delta: f64) -> f64 {
    if delta > 0.0 {
        10.0
    } else if delta < 0.0 {
        -10.0
    } else {
        0.0
    }
}

fn resize_length_with_top_handle(session: &mut Session) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(resize_in_design_mode(
        session,
        PropertyField::Length,
        Square::top_middle,
        (0.0, -HANDLE_DRAG),
    ))
}

fn resize_width_with_side_handle(session: &mut Session) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(resize_in_design_mode(
        session,
        PropertyField::Width,
        Square::right_middle,
        (HANDLE_DRAG, 0.0),
    ))
}

fn delete_clears_area(session: &mut Session) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let square = draw_and_select(session).await?;
        session.delete_at(square.center).await?;

        session.select_at(square.center).await?;
        let area = session.read_area().await?;
        ensure(area.value() == 0.0, || {
            E2eError::assertion("area after delete", 0, &area)
        })
    })
}

fn undo_restores_deleted(session: &mut Session) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let field = PropertyField::Width;
        let square = draw_and_select(session).await?;
        session.expect_property_visible(field).await?;

        let before = session.property_value(field).await?;
        ensure(!before.is_empty(), || {
            E2eError::assertion("width before delete", "a value", "empty")
        })?;

        session.delete_at(square.center).await?;
        session.select_at(square.center).await?;
        session.expect_property_absent(field).await?;

        session.undo().await?;
        session.select_at(square.center).await?;
        session.expect_property(field, &before).await
    })
}

fn resize_with_corner_handle(session: &mut Session) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let square = draw_and_select(session).await?;
        session.expect_property_visible(PropertyField::Width).await?;
        let width_before = session.property_number(PropertyField::Width).await?;
        let length_before = session.property_number(PropertyField::Length).await?;

        session
            .drag_handle(square.bottom_right(), HANDLE_DRAG, HANDLE_DRAG)
            .await?;

        // Past the old corner, inside the grown shape
        session
            .select_at(square.bottom_right().offset(nudge(HANDLE_DRAG), nudge(HANDLE_DRAG)))
            .await?;
        let width_after = session.property_number(PropertyField::Width).await?;
        let length_after = session.property_number(PropertyField::Length).await?;
        info!(
            "Corner drag: width {} -> {}, length {} -> {}",
            width_before, width_after, length_before, length_after
        );

        ensure(width_after > width_before, || {
            E2eError::assertion(
                "width after corner drag",
                format!("> {}", width_before),
                width_after,
            )
        })?;
        ensure(length_after > length_before, || {
            E2eError::assertion(
                "length after corner drag",
                format!("> {}", length_before),
                length_after,
            )
        })
    })
}
